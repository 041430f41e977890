//! Round-based rotation over one partition, persisted only as item labels

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    model::{CatalogItem, Partition, RotationStats},
    ports::{CatalogError, CatalogStore},
};

/// Errors from rotation bookkeeping
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Reset of partition '{partition}' failed for {failed} of {total} items")]
    PartialReset {
        partition: String,
        failed: usize,
        total: usize,
    },
}

/// What `mark_posted` wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkOutcome {
    /// Label added to the item
    pub tag: String,
    /// Round encoded in `tag`
    pub round: u32,
    /// Whether this mark opened a new round
    pub advanced: bool,
}

/// Tracks which items of a partition have been posted in the current round.
///
/// All state lives in the remote catalog's labels. Writes within one process
/// are serialized per partition; nothing guards against a second process
/// marking the same partition concurrently.
pub struct CatalogRotationStore<C: CatalogStore + ?Sized> {
    catalog: Arc<C>,
    partition: Partition,
    write_lock: Mutex<()>,
}

impl<C: CatalogStore + ?Sized> CatalogRotationStore<C> {
    pub fn new(catalog: Arc<C>, partition: Partition) -> Self {
        Self {
            catalog,
            partition,
            write_lock: Mutex::new(()),
        }
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Any catalog item, whether or not it belongs to this partition
    pub async fn item(&self, id: &str) -> Result<CatalogItem, RotationError> {
        Ok(self.catalog.get_item(id).await?)
    }

    /// All items of the partition, newest first
    pub async fn items(&self) -> Result<Vec<CatalogItem>, RotationError> {
        Ok(self.catalog.list_items(&self.partition.collections).await?)
    }

    /// Highest round number found on any item, defaulting to 1
    pub fn round_of(&self, items: &[CatalogItem]) -> u32 {
        items
            .iter()
            .flat_map(|item| item.labels.iter())
            .filter_map(|label| self.partition.parse_round(label))
            .max()
            .unwrap_or(1)
    }

    pub async fn current_round(&self) -> Result<u32, RotationError> {
        let items = self.items().await?;
        Ok(self.round_of(&items))
    }

    /// Newest item not yet tagged for the current round.
    ///
    /// When every item already carries the current tag the newest item is
    /// offered again; the round itself only advances in `mark_posted`.
    /// Returns `None` only for an empty partition.
    pub async fn next_unposted(&self) -> Result<Option<CatalogItem>, RotationError> {
        let mut items = self.items().await?;

        if items.is_empty() {
            tracing::warn!(partition = %self.partition.name, "Partition has no items");
            return Ok(None);
        }

        let round = self.round_of(&items);
        let current_tag = self.partition.round_tag(round);

        tracing::debug!(partition = %self.partition.name, round, "Current round");

        if let Some(position) = items.iter().position(|item| !item.has_label(&current_tag)) {
            let item = items.swap_remove(position);
            tracing::info!(
                partition = %self.partition.name,
                round,
                item_id = %item.id,
                "Found unposted item"
            );
            return Ok(Some(item));
        }

        tracing::info!(
            partition = %self.partition.name,
            round,
            "Round fully covered, offering newest item until the next mark opens round {}",
            round + 1
        );
        Ok(Some(items.swap_remove(0)))
    }

    /// Record that `item_id` was posted.
    ///
    /// If every other item already carries the current-round tag, the item is
    /// tagged with the next round instead, which opens that round.
    pub async fn mark_posted(&self, item_id: &str) -> Result<MarkOutcome, RotationError> {
        let _guard = self.write_lock.lock().await;

        let items = self.items().await?;
        let round = self.round_of(&items);
        let current_tag = self.partition.round_tag(round);

        if !items.iter().any(|item| item.id == item_id) {
            tracing::warn!(
                partition = %self.partition.name,
                item_id = %item_id,
                "Marking an item that is not listed in its partition"
            );
        }

        let others_covered = items
            .iter()
            .filter(|item| item.id != item_id)
            .all(|item| item.has_label(&current_tag));

        let outcome = if others_covered {
            MarkOutcome {
                tag: self.partition.round_tag(round + 1),
                round: round + 1,
                advanced: true,
            }
        } else {
            MarkOutcome {
                tag: current_tag,
                round,
                advanced: false,
            }
        };

        self.catalog.add_label(item_id, &outcome.tag).await?;

        tracing::info!(
            partition = %self.partition.name,
            item_id = %item_id,
            tag = %outcome.tag,
            advanced = outcome.advanced,
            "Marked item as posted"
        );

        Ok(outcome)
    }

    /// Strip every rotation label of this partition, returning it to round 1.
    ///
    /// Keeps going past individual failures and reports them at the end.
    pub async fn reset(&self) -> Result<usize, RotationError> {
        let _guard = self.write_lock.lock().await;

        let items = self.items().await?;
        let mut failed = 0;

        for item in &items {
            if let Err(error) = self
                .catalog
                .remove_labels_with_prefix(&item.id, &self.partition.tag_prefix)
                .await
            {
                tracing::warn!(
                    partition = %self.partition.name,
                    item_id = %item.id,
                    error = %error,
                    "Failed to clear rotation labels"
                );
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(RotationError::PartialReset {
                partition: self.partition.name.clone(),
                failed,
                total: items.len(),
            });
        }

        tracing::info!(partition = %self.partition.name, items = items.len(), "Rotation reset");
        Ok(items.len())
    }

    pub async fn stats(&self) -> Result<RotationStats, RotationError> {
        let items = self.items().await?;
        let round = self.round_of(&items);
        let current_tag = self.partition.round_tag(round);
        let posted_this_round = items
            .iter()
            .filter(|item| item.has_label(&current_tag))
            .count();

        Ok(RotationStats {
            partition: self.partition.name.clone(),
            total: items.len(),
            round,
            posted_this_round,
            remaining: items.len() - posted_this_round,
        })
    }
}
