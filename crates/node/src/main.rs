//! Air-Quality Node - Main Entry Point
//!
//! Usage: `aqm-node [config.toml]`

use anyhow::Context;
use node::{init_logging, load_config, NodeRunner};
use tracing::{info, warn};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1);
    let config = load_config(path.as_deref()).context("failed to load node configuration")?;
    init_logging(&config.log_level, config.log_json)?;

    info!("=== Air Quality Node v{} ===", env!("CARGO_PKG_VERSION"));
    info!("{} sensors configured", config.sensors.len());

    let mut runner = NodeRunner::start(config).await?;
    let mut stdout = std::io::stdout();
    runner.run_until(&mut stdout, shutdown_signal()).await?;

    Ok(())
}
