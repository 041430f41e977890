//! Collections command - list catalog collections for partition setup

use anyhow::{Context, Result};
use serde::Serialize;
use shopcast_domain::CollectionInfo;
use std::path::PathBuf;

use crate::args::CollectionsArgs;
use crate::commands::post::build_catalog;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct CollectionRow {
    #[serde(flatten)]
    collection: CollectionInfo,
    /// Partitions whose `collections` name this collection
    partitions: Vec<String>,
}

pub async fn execute(args: CollectionsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let catalog = build_catalog(&config).await?;

    let collections = catalog
        .list_collections()
        .await
        .context("Failed to list collections")?;
    tracing::debug!(count = collections.len(), "Listed collections");

    let rows: Vec<CollectionRow> = collections
        .into_iter()
        .map(|collection| CollectionRow {
            partitions: partitions_using(&config, &collection),
            collection,
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No collections found");
        return Ok(());
    }

    println!("{:<32} {:<32} {}", "TITLE", "HANDLE", "PARTITIONS");
    for row in &rows {
        println!(
            "{:<32} {:<32} {}",
            row.collection.title,
            row.collection.handle,
            row.partitions.join(", ")
        );
    }

    Ok(())
}

/// A partition entry matches by handle, alias or case-insensitive title
fn partitions_using(config: &AppConfig, collection: &CollectionInfo) -> Vec<String> {
    let aliases = &config.catalog.collection_aliases;
    config
        .partitions
        .iter()
        .filter(|p| {
            p.collections.iter().any(|name| {
                name == &collection.handle
                    || name.eq_ignore_ascii_case(&collection.title)
                    || aliases.get(name) == Some(&collection.handle)
            })
        })
        .map(|p| p.name.clone())
        .collect()
}
