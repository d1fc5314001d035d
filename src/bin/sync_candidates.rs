use anyhow::{Context, Result};
use tracing::info;

use intervue::settings::Settings;
use intervue::sync;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env().context("failed to load settings")?;

    let report = sync::run_sync(&settings).await?;
    info!(
        primary = report.primary,
        secondary = report.secondary,
        merged = report.merged,
        "candidate sync complete"
    );

    Ok(())
}
