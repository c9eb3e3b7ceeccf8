//! Compute Service Handler binary - reads a Sensu event on stdin and applies it

use anyhow::Context;
use compute_service_handler::{execute, Config, HealthEvent};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse_config();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let event = HealthEvent::from_reader(std::io::stdin().lock())
        .context("Failed to read Sensu event from stdin")?;

    info!(
        entity = %event.entity_name,
        status = ?event.check_status,
        cloud = %config.cloud,
        service = %config.service,
        binary = %config.binary,
        "Handling event"
    );

    if let Err(e) = execute(&config, &event).await {
        error!("Compute service handler failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
