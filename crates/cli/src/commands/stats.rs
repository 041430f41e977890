//! Stats command - rotation progress per partition

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::args::StatsArgs;
use crate::commands::post::build_selector;
use crate::config::AppConfig;

pub async fn execute(args: StatsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let selector = build_selector(&config).await?;

    let stats = selector
        .stats()
        .await
        .context("Failed to read rotation stats")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "{:<20} {:>6} {:>7} {:>7} {:>10}",
        "PARTITION", "ROUND", "TOTAL", "POSTED", "REMAINING"
    );
    for s in &stats {
        println!(
            "{:<20} {:>6} {:>7} {:>7} {:>10}",
            s.partition, s.round, s.total, s.posted_this_round, s.remaining
        );
    }

    Ok(())
}
