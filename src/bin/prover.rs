use anyhow::{Context, Result};
use clap::Parser;
use ethers::signers::Signer;
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zkp_anon_signal::{
    config::Config,
    ethereum::{identity_from_wallet, wallet_from_private_key},
    field_to_hex, generate_proof_cancellable,
    types::load_group_file,
    ExternalNullifier, Halo2ProofSystem, Identity, MembershipTree, Signal, SignalSubmission,
    Submission, Witness,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Prove group membership and produce an anonymous signal", long_about = None)]
struct Args {
    /// JSON array of member commitments (overrides `[group] file`)
    #[arg(short, long)]
    group_file: Option<PathBuf>,

    /// Wallet key; the identity is derived from its signature
    #[arg(short, long, env = "ZKP_PRIVATE_KEY", conflicts_with = "secret")]
    private_key: Option<String>,

    /// Raw identity secret, used instead of a wallet key
    #[arg(long, env = "ZKP_IDENTITY_SECRET")]
    secret: Option<String>,

    /// Message to publish (at most 31 bytes)
    #[arg(long)]
    signal: String,

    /// Scope in which the signal counts once (overrides `[signal] scope`)
    #[arg(long)]
    scope: Option<String>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn derive_identity(args: &Args) -> Result<Identity> {
    match (&args.private_key, &args.secret) {
        (Some(private_key), _) => {
            let wallet = wallet_from_private_key(private_key)?;
            println!("Wallet address: {:?}", wallet.address());
            identity_from_wallet(&wallet).await
        }
        (None, Some(secret)) => {
            Identity::from_secret(secret).context("Failed to derive identity from secret")
        }
        (None, None) => Err(anyhow::anyhow!(
            "No identity given. Pass --private-key (or ZKP_PRIVATE_KEY) or --secret."
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_optional(args.config.as_deref())?;

    let group_file = args
        .group_file
        .clone()
        .or_else(|| config.group.file.clone())
        .context("No group file given. Pass --group-file or set [group] file in the config.")?;
    let scope = args
        .scope
        .clone()
        .or_else(|| config.signal.scope.clone())
        .context("No scope given. Pass --scope or set [signal] scope in the config.")?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.proof.output_file.clone());

    let identity = derive_identity(&args).await?;
    println!("Identity commitment: {}", field_to_hex(identity.commitment()));

    println!("Loading group from: {}", group_file.display());
    let leaves = load_group_file(&group_file, config.group.max_file_size)?;
    println!("Loaded {} members", leaves.len());

    let tree = MembershipTree::build(leaves).context("Failed to build membership tree")?;
    println!("Group root: {}", field_to_hex(tree.root()));

    let merkle_proof = tree.prove_membership(identity.commitment()).with_context(|| {
        format!(
            "Identity commitment not found in group file '{}'. Make sure your key or secret was registered.",
            group_file.display()
        )
    })?;
    debug!("Member at leaf index {}", merkle_proof.leaf_index);

    let external_nullifier = ExternalNullifier::from_scope(&scope)?;
    let signal = Signal::from(args.signal.as_str());
    let witness = Witness::build(&identity, &merkle_proof, &signal, &external_nullifier)?;
    println!(
        "Nullifier hash: {}",
        field_to_hex(witness.public_inputs().nullifier_hash)
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning proof generation");
            on_ctrl_c.cancel();
        }
    });

    println!("Generating proving keys...");
    let system = tokio::task::spawn_blocking(Halo2ProofSystem::setup)
        .await
        .context("Key generation task failed")??;

    println!("Generating ZK proof (this may take a while)...");
    let proof = generate_proof_cancellable(Arc::new(system), witness, cancel).await?;
    println!("ZK proof generated, size: {} bytes", proof.bytes.len());

    let submission = Submission::from_proof(signal, external_nullifier, proof);
    let payload = SignalSubmission::encode(&submission)?;
    let json_output =
        serde_json::to_string_pretty(&payload).context("Failed to serialize signal to JSON")?;

    fs::write(&output, json_output)
        .with_context(|| format!("Failed to write signal file: {}", output.display()))?;
    info!("Signal written to {}", output.display());

    println!("Signal successfully generated and saved to {}", output.display());
    println!("Scope: {}", payload.external_nullifier);
    println!("Merkle Root: {}", payload.merkle_root);
    println!("Nullifier Hash: {}", payload.nullifier_hash);

    Ok(())
}
