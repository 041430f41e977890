//! Interleaving selection across partitions

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::{
    model::{CatalogItem, Partition, RotationStats, Selection},
    ports::CatalogStore,
    usecases::rotation::{CatalogRotationStore, MarkOutcome, RotationError},
};

/// Errors from the product selector
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("No partitions configured")]
    NoPartitions,
    #[error("Unknown partition '{0}'")]
    UnknownPartition(String),
    #[error(transparent)]
    Rotation(#[from] RotationError),
}

/// Hands out the next item to post, alternating partitions 1:1.
///
/// Only the last served partition is remembered, in memory; a restart begins
/// again with the configured first partition.
pub struct ProductSelector<C: CatalogStore + ?Sized> {
    stores: Vec<CatalogRotationStore<C>>,
    last_served: Mutex<usize>,
}

impl<C: CatalogStore + ?Sized> ProductSelector<C> {
    /// `first` names the partition served by the first unpinned call;
    /// defaults to the first configured partition.
    pub fn new(
        catalog: Arc<C>,
        partitions: Vec<Partition>,
        first: Option<&str>,
    ) -> Result<Self, SelectorError> {
        if partitions.is_empty() {
            return Err(SelectorError::NoPartitions);
        }

        let first_index = match first {
            Some(name) => partitions
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| SelectorError::UnknownPartition(name.to_string()))?,
            None => 0,
        };

        let count = partitions.len();
        let stores = partitions
            .into_iter()
            .map(|partition| CatalogRotationStore::new(Arc::clone(&catalog), partition))
            .collect();

        Ok(Self {
            stores,
            // Pretend the partition before `first` was served last
            last_served: Mutex::new((first_index + count - 1) % count),
        })
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.stores.iter().map(|s| s.partition())
    }

    pub fn store(&self, partition: &str) -> Result<&CatalogRotationStore<C>, SelectorError> {
        self.stores
            .iter()
            .find(|s| s.partition().name == partition)
            .ok_or_else(|| SelectorError::UnknownPartition(partition.to_string()))
    }

    /// Next item to post.
    ///
    /// With a target partition, delegates to that partition alone. Otherwise
    /// prefers the partition after the last one served and falls back to the
    /// others in order when it is empty.
    pub async fn next(&self, target: Option<&str>) -> Result<Selection, SelectorError> {
        self.next_skipping(target, &HashSet::new()).await
    }

    /// Like [`next`](Self::next), treating the `skip` partitions as empty
    pub async fn next_skipping(
        &self,
        target: Option<&str>,
        skip: &HashSet<String>,
    ) -> Result<Selection, SelectorError> {
        if let Some(name) = target {
            let store = self.store(name)?;
            if skip.contains(name) {
                return Ok(Selection::Empty);
            }
            return Ok(match store.next_unposted().await? {
                Some(item) => Selection::Selected {
                    item,
                    partition: name.to_string(),
                },
                None => Selection::Empty,
            });
        }

        let count = self.stores.len();
        let preferred = (self.last_index() + 1) % count;

        for offset in 0..count {
            let index = (preferred + offset) % count;
            let store = &self.stores[index];
            if skip.contains(&store.partition().name) {
                continue;
            }

            if let Some(item) = store.next_unposted().await? {
                if offset > 0 {
                    tracing::info!(
                        preferred = %self.stores[preferred].partition().name,
                        fallback = %store.partition().name,
                        "Preferred partition empty, falling back"
                    );
                }
                self.set_last_index(index);
                return Ok(Selection::Selected {
                    item,
                    partition: store.partition().name.clone(),
                });
            }
        }

        tracing::warn!("No items available in any partition");
        Ok(Selection::Empty)
    }

    /// Fetch any catalog item by id
    pub async fn item(&self, id: &str) -> Result<CatalogItem, SelectorError> {
        // `new` rejects an empty partition list
        Ok(self.stores[0].item(id).await?)
    }

    pub async fn mark_posted(
        &self,
        item_id: &str,
        partition: &str,
    ) -> Result<MarkOutcome, SelectorError> {
        Ok(self.store(partition)?.mark_posted(item_id).await?)
    }

    pub async fn reset(&self, partition: &str) -> Result<usize, SelectorError> {
        Ok(self.store(partition)?.reset().await?)
    }

    pub async fn stats(&self) -> Result<Vec<RotationStats>, SelectorError> {
        let mut stats = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            stats.push(store.stats().await?);
        }
        Ok(stats)
    }

    fn last_index(&self) -> usize {
        *self.last_served.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_last_index(&self, index: usize) {
        *self.last_served.lock().unwrap_or_else(|e| e.into_inner()) = index;
    }
}
