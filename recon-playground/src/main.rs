//! RECON playground entry point.

use recon_playground::config::PlaygroundConfig;
use recon_playground::error::PlaygroundError;
use recon_playground::{session, telemetry};

#[tokio::main]
async fn main() -> Result<(), PlaygroundError> {
    let config = PlaygroundConfig::load()?;
    telemetry::init(&config)?;

    let report = session::run(&config).await?;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(error = %err, "Failed to render session report"),
    }
    Ok(())
}
