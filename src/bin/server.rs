use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use zkp_anon_signal::{
    config::Config, field_to_hex, server, types::load_group_file, FileNullifierRegistry,
    Halo2ProofSystem, MembershipTree, MemoryNullifierRegistry, NullifierRegistry, SignalBus,
    SignalVerifier,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Accept anonymous signals over HTTP", long_about = None)]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `[group] file`
    #[arg(short, long)]
    group_file: Option<PathBuf>,

    /// Overrides `[server] bind`
    #[arg(short, long)]
    bind: Option<String>,

    /// Overrides `[registry] path`
    #[arg(short, long)]
    registry: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_optional(args.config.as_deref())?;

    let group_file = args
        .group_file
        .or_else(|| config.group.file.clone())
        .context("No group file given. Pass --group-file or set [group] file in the config.")?;
    let tree = MembershipTree::build(load_group_file(&group_file, config.group.max_file_size)?)
        .context("Failed to build membership tree")?;
    info!(
        "Group of {} members, root {}",
        tree.len(),
        field_to_hex(tree.root())
    );

    let registry: Arc<dyn NullifierRegistry> =
        match args.registry.or_else(|| config.registry.path.clone()) {
            Some(path) => Arc::new(FileNullifierRegistry::open(path)?),
            None => {
                warn!("No registry path configured, nullifiers are kept in memory only");
                Arc::new(MemoryNullifierRegistry::new())
            }
        };

    info!("Generating verification keys");
    let system = tokio::task::spawn_blocking(Halo2ProofSystem::setup)
        .await
        .context("Key generation task failed")??;

    let bus = Arc::new(SignalBus::new());
    let mut events = bus.subscribe();

    let verifier = Arc::new(
        SignalVerifier::new(Arc::new(system), registry, config.registry.root_history_size)
            .with_allowed_scopes(config.signal.allowed_scopes.clone())
            .with_bus(Arc::clone(&bus)),
    );
    verifier.publish_group(&tree);

    let shutdown = CancellationToken::new();

    let events_shutdown = shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = events_shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => info!(
                        "[{}] {}",
                        event.scope,
                        String::from_utf8_lossy(event.signal.as_bytes())
                    ),
                    None => break,
                },
            }
        }
    });

    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            on_ctrl_c.cancel();
        }
    });

    let bind = args.bind.unwrap_or(config.server.bind);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    server::serve(listener, verifier, config.proof.max_zk_proof_size, shutdown)
        .await
        .context("Server failed")
}
