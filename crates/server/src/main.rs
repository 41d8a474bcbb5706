mod api;
mod bootstrap;

use anyhow::Result;
use tipjar_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tipjar_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    api::spawn(
        &app.config.server.bind_address,
        app.config.server.port,
        api::ApiState { ledger: app.ledger.clone(), notifier: app.notifier.clone() },
    )
    .await?;

    app.runner.start().await?;

    tracing::info!(event_name = "system.server.started", "tipjar-server started");
    wait_for_shutdown().await?;
    tracing::info!(event_name = "system.server.stopping", "tipjar-server stopping");

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
