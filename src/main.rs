//! Amnesia Sync
//!
//! Reconciles a local and a remote batch of highlight sync events and
//! prints the resulting report as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amnesia_sync::events::load_batch;
use amnesia_sync::notify::NoopChannel;
use amnesia_sync::{ResolutionStrategy, SyncConfig, SyncSession};

#[derive(Parser, Debug)]
#[command(name = "amnesia-sync", version, about = "Reconcile two highlight event batches")]
struct Cli {
    /// JSON array of events produced on this device
    local: PathBuf,

    /// JSON array of events received from the server
    remote: PathBuf,

    /// Strategy applied to every conflict it is valid for
    #[arg(short, long, env = "SYNC_STRATEGY")]
    strategy: Option<ResolutionStrategy>,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amnesia_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = SyncConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        SyncConfig::default()
    });

    let local = load_batch(&cli.local)
        .await
        .with_context(|| format!("Failed to load local batch {}", cli.local.display()))?;
    let remote = load_batch(&cli.remote)
        .await
        .with_context(|| format!("Failed to load remote batch {}", cli.remote.display()))?;

    tracing::info!(
        local = local.len(),
        remote = remote.len(),
        "Starting Amnesia Sync v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut session = SyncSession::new(&config, Arc::new(NoopChannel));
    session.set_strategy_override(cli.strategy);

    let report = session
        .reconcile(&local, &remote)
        .await
        .context("Reconcile failed")?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", output);

    Ok(())
}
