//! Reset command - clear a partition's rotation tags

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::args::ResetArgs;
use crate::commands::post::build_selector;
use crate::config::AppConfig;

pub async fn execute(args: ResetArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let selector = build_selector(&config).await?;

    let cleared = selector
        .reset(&args.partition)
        .await
        .with_context(|| format!("Failed to reset partition {}", args.partition))?;

    println!(
        "Reset partition {}: {} items back to round 1",
        args.partition, cleared
    );
    Ok(())
}
