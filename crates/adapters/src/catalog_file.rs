//! JSON-file catalog for offline runs and testing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shopcast_domain::{CatalogError, CatalogItem, CatalogStore, CollectionInfo};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;

/// A catalog item plus the collections it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub item: CatalogItem,
    #[serde(default)]
    pub collections: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    items: Vec<CatalogEntry>,
}

/// Catalog held in memory, optionally persisted to a JSON file after every
/// label write
pub struct LocalCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
    path: Option<PathBuf>,
    /// Held from mutation until the file write completes, so snapshots
    /// reach disk in the order they were taken
    persist: Mutex<()>,
}

impl LocalCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
            path: None,
            persist: Mutex::new(()),
        }
    }

    /// Load a catalog file; label writes are saved back to it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CatalogError::Api(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file: CatalogFile =
            serde_json::from_str(&raw).map_err(|e| CatalogError::Parse(e.to_string()))?;

        tracing::debug!(path = %path.display(), items = file.items.len(), "Loaded catalog file");

        Ok(Self {
            entries: RwLock::new(file.items),
            path: Some(path),
            persist: Mutex::new(()),
        })
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<CatalogEntry>>, CatalogError> {
        self.entries
            .read()
            .map_err(|e| CatalogError::Api(e.to_string()))
    }

    /// Apply `edit` to an item's labels; persist if it reports a change
    async fn update_labels(
        &self,
        id: &str,
        edit: impl FnOnce(&mut Vec<String>) -> bool,
    ) -> Result<(), CatalogError> {
        let _persist = self.persist.lock().await;

        let snapshot = {
            let mut entries = self
                .entries
                .write()
                .map_err(|e| CatalogError::Api(e.to_string()))?;
            let entry = entries
                .iter_mut()
                .find(|e| e.item.id == id)
                .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

            if !edit(&mut entry.item.labels) {
                return Ok(());
            }

            match &self.path {
                Some(_) => Some(
                    serde_json::to_string_pretty(&CatalogFile {
                        items: entries.clone(),
                    })
                    .map_err(|e| CatalogError::Parse(e.to_string()))?,
                ),
                None => None,
            }
        };

        if let (Some(path), Some(json)) = (&self.path, snapshot) {
            tokio::fs::write(path, json).await.map_err(|e| {
                CatalogError::Api(format!("Failed to write {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for LocalCatalog {
    async fn list_items(&self, collections: &[String]) -> Result<Vec<CatalogItem>, CatalogError> {
        let mut items: Vec<CatalogItem> = self
            .read()?
            .iter()
            .filter(|e| e.collections.iter().any(|c| collections.contains(c)))
            .map(|e| e.item.clone())
            .collect();

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, CatalogError> {
        let mut names: Vec<String> = self
            .read()?
            .iter()
            .flat_map(|e| e.collections.iter().cloned())
            .collect();
        names.sort();
        names.dedup();

        // File catalogs only know handles
        Ok(names
            .into_iter()
            .map(|name| CollectionInfo {
                id: name.clone(),
                title: name.clone(),
                handle: name,
            })
            .collect())
    }

    async fn get_item(&self, id: &str) -> Result<CatalogItem, CatalogError> {
        self.read()?
            .iter()
            .find(|e| e.item.id == id)
            .map(|e| e.item.clone())
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    async fn add_label(&self, id: &str, label: &str) -> Result<(), CatalogError> {
        self.update_labels(id, |labels| {
            if labels.iter().any(|l| l == label) {
                return false;
            }
            labels.push(label.to_string());
            true
        })
        .await
    }

    async fn remove_labels_with_prefix(&self, id: &str, prefix: &str) -> Result<(), CatalogError> {
        self.update_labels(id, |labels| {
            let before = labels.len();
            labels.retain(|l| !l.starts_with(prefix));
            labels.len() != before
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn entry(id: &str, collection: &str, days: i64) -> CatalogEntry {
        CatalogEntry {
            item: CatalogItem {
                id: id.to_string(),
                title: format!("Item {}", id),
                handle: id.to_string(),
                description: None,
                price: None,
                image_urls: vec![],
                labels: vec![],
                created_at: OffsetDateTime::UNIX_EPOCH + time::Duration::days(days),
            },
            collections: vec![collection.to_string()],
        }
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let catalog = LocalCatalog::new(vec![
            entry("old", "sweets", 1),
            entry("new", "sweets", 5),
            entry("shirt", "apparel", 9),
        ]);

        let items = catalog.list_items(&["sweets".to_string()]).await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_collections_are_distinct_and_sorted() {
        let mut both = entry("both", "sweets", 2);
        both.collections.push("gifts".to_string());
        let catalog = LocalCatalog::new(vec![
            entry("a", "sweets", 1),
            both,
            entry("shirt", "apparel", 9),
        ]);

        let handles: Vec<String> = catalog
            .list_collections()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.handle)
            .collect();
        assert_eq!(handles, vec!["apparel", "gifts", "sweets"]);
    }

    #[tokio::test]
    async fn test_label_writes() {
        let catalog = LocalCatalog::new(vec![entry("a", "sweets", 1)]);

        catalog.add_label("a", "r-1").await.unwrap();
        catalog.add_label("a", "r-1").await.unwrap();
        catalog.add_label("a", "keep").await.unwrap();
        assert_eq!(catalog.get_item("a").await.unwrap().labels, vec!["r-1", "keep"]);

        catalog.remove_labels_with_prefix("a", "r-").await.unwrap();
        assert_eq!(catalog.get_item("a").await.unwrap().labels, vec!["keep"]);

        assert!(matches!(
            catalog.add_label("missing", "x").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_writes_persist_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let json = serde_json::to_string(&CatalogFile {
            items: vec![entry("a", "sweets", 1)],
        })
        .unwrap();
        std::fs::write(&path, json).unwrap();

        let catalog = LocalCatalog::open(&path).await.unwrap();
        catalog.add_label("a", "souvenir-round-1").await.unwrap();

        let reopened = LocalCatalog::open(&path).await.unwrap();
        assert_eq!(
            reopened.get_item("a").await.unwrap().labels,
            vec!["souvenir-round-1"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_all_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let json = serde_json::to_string(&CatalogFile {
            items: vec![
                entry("a", "sweets", 1),
                entry("b", "sweets", 2),
                entry("c", "apparel", 3),
                entry("d", "apparel", 4),
            ],
        })
        .unwrap();
        std::fs::write(&path, json).unwrap();

        let catalog = std::sync::Arc::new(LocalCatalog::open(&path).await.unwrap());
        let writes = ["a", "b", "c", "d"].map(|id| {
            let catalog = std::sync::Arc::clone(&catalog);
            tokio::spawn(async move { catalog.add_label(id, "round-1").await })
        });
        for write in writes {
            write.await.unwrap().unwrap();
        }

        let reopened = LocalCatalog::open(&path).await.unwrap();
        for id in ["a", "b", "c", "d"] {
            assert_eq!(reopened.get_item(id).await.unwrap().labels, vec!["round-1"]);
        }
    }
}
