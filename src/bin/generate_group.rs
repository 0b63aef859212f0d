use anyhow::{Context, Result};
use clap::Parser;
use ethers::signers::LocalWallet;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use zkp_anon_signal::{ethereum::identity_from_wallet, field_to_hex, types::group_to_json};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate random test members and their group file", long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 100)]
    count: usize,

    /// Group file of commitments
    #[arg(short, long, default_value = "group.json")]
    output: PathBuf,

    /// Private keys of the generated members, one per line
    #[arg(short, long, default_value = "group_keys.txt")]
    keys_output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    println!("Generating {} random members...", args.count);
    let mut keys = Vec::with_capacity(args.count);
    let mut commitments = Vec::with_capacity(args.count);

    for _ in 0..args.count {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let identity = identity_from_wallet(&wallet).await?;
        keys.push(hex::encode(wallet.signer().to_bytes()));
        commitments.push(identity.commitment());
    }

    let unique: HashSet<String> = commitments.iter().copied().map(field_to_hex).collect();
    if unique.len() != commitments.len() {
        return Err(anyhow::anyhow!("Generated duplicate commitments"));
    }

    println!("Writing group to {}...", args.output.display());
    std::fs::write(&args.output, group_to_json(&commitments)?)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("Writing private keys to {}...", args.keys_output.display());
    let mut file = File::create(&args.keys_output)
        .with_context(|| format!("Failed to create {}", args.keys_output.display()))?;
    for key in &keys {
        writeln!(file, "{key}")?;
    }

    println!("Successfully generated {} members", args.count);
    println!("First 5 commitments:");
    for (i, commitment) in commitments.iter().take(5).enumerate() {
        println!("  {}: {}", i + 1, field_to_hex(*commitment));
    }

    Ok(())
}
