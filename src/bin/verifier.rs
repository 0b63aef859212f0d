use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use zkp_anon_signal::{
    config::Config, field_to_hex, types::load_group_file, FileNullifierRegistry,
    Halo2ProofSystem, MembershipTree, SignalSubmission, SignalVerifier,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Verify a signal file and record its nullifier", long_about = None)]
struct Args {
    #[arg(short, long)]
    proof_file: PathBuf,

    /// Group the signal must have been proven against (overrides `[group] file`)
    #[arg(short, long)]
    group_file: Option<PathBuf>,

    /// Nullifier registry; defaults to `[registry] path`, then
    /// `<proof_file>.nullifiers.txt`
    #[arg(short, long)]
    nullifier_file: Option<PathBuf>,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_optional(args.config.as_deref())?;

    if !args.proof_file.exists() {
        return Err(anyhow::anyhow!(
            "Proof file does not exist: {}",
            args.proof_file.display()
        ));
    }

    println!("Loading signal from: {}", args.proof_file.display());
    let metadata = fs::metadata(&args.proof_file).context("Failed to read proof file metadata")?;
    debug!("Proof file size: {} bytes", metadata.len());
    if metadata.len() > config.proof.max_file_size {
        return Err(anyhow::anyhow!(
            "Proof file too large: {} bytes (max {} bytes). Raise [proof] max_file_size if this is expected.",
            metadata.len(),
            config.proof.max_file_size
        ));
    }

    let content = fs::read_to_string(&args.proof_file).context("Failed to read proof file")?;
    let payload: SignalSubmission =
        serde_json::from_str(&content).context("Failed to parse signal JSON")?;
    let submission = payload
        .decode(config.proof.max_zk_proof_size)
        .context("Signal file is malformed")?;
    info!("Signal file decoded");

    println!("Signal details:");
    println!("  Signal: {}", payload.signal);
    println!("  Scope: {}", payload.external_nullifier);
    println!("  Merkle Root: {}", payload.merkle_root);
    println!("  Nullifier Hash: {}", payload.nullifier_hash);
    println!("  ZK Proof Size: {} bytes", submission.proof.len());

    let group_file = args
        .group_file
        .or_else(|| config.group.file.clone())
        .context("No group file given. Pass --group-file or set [group] file in the config.")?;
    let tree = MembershipTree::build(load_group_file(&group_file, config.group.max_file_size)?)
        .context("Failed to build membership tree")?;
    println!("Group root: {}", field_to_hex(tree.root()));

    let nullifier_path = args
        .nullifier_file
        .or_else(|| config.registry.path.clone())
        .unwrap_or_else(|| args.proof_file.with_extension("nullifiers.txt"));
    debug!("Nullifier file: {}", nullifier_path.display());
    let registry = FileNullifierRegistry::open(&nullifier_path)?;

    println!("Generating verification keys...");
    let system = Halo2ProofSystem::setup().context("Failed to generate verification keys")?;

    let verifier = SignalVerifier::new(
        Arc::new(system),
        Arc::new(registry),
        config.registry.root_history_size,
    )
    .with_allowed_scopes(config.signal.allowed_scopes.clone());
    verifier.publish_group(&tree);

    println!("Verifying ZK proof...");
    match verifier.submit(&submission) {
        Ok(accepted) => {
            info!("Signal verification PASSED");
            println!("\n✓ Signal verification PASSED!");
            println!("A member of the group published this signal in scope '{}'.", accepted.scope);
            println!("\nNullifier recorded to: {}", nullifier_path.display());
            Ok(())
        }
        Err(rejection) => {
            error!("Signal verification FAILED: {rejection}");
            println!("\n✗ Signal verification FAILED!");
            println!("Reason: {} ({})", rejection, rejection.code());
            Err(anyhow::anyhow!("Signal verification failed: {}", rejection.code()))
        }
    }
}
