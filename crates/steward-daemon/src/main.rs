//! Steward Daemon entry point.

use anyhow::Result;
use steward_core::StewardConfig;
use steward_daemon::Daemon;
use tracing_subscriber::EnvFilter;

/// Run the daemon
async fn run(config: StewardConfig) -> Result<()> {
    let daemon = Daemon::new(config)?;
    daemon.run().await
}

fn main() -> Result<()> {
    let config = StewardConfig::load();

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting Steward daemon v{}", env!("CARGO_PKG_VERSION"));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}
