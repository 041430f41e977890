//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    CatalogItem, CollectionInfo, ContainerSpec, ContainerStatus, Partition, Platform,
    PublishProtocol, PublishRequest,
};

/// Error type for catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog API error: {0}")]
    Api(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid catalog data: {0}")]
    Parse(String),
}

/// Port for the remote catalog that owns items and their labels.
///
/// Label writes are read-modify-write on the remote side without any
/// concurrency token; callers must not mutate the same item concurrently.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All items belonging to any of the given collections, newest first,
    /// de-duplicated by id
    async fn list_items(&self, collections: &[String]) -> Result<Vec<CatalogItem>, CatalogError>;

    /// Every collection the catalog knows about
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, CatalogError>;

    /// Fetch a single item
    async fn get_item(&self, id: &str) -> Result<CatalogItem, CatalogError>;

    /// Append a label; a no-op if the item already carries it
    async fn add_label(&self, id: &str, label: &str) -> Result<(), CatalogError>;

    /// Remove every label starting with `prefix`; a no-op if none match
    async fn remove_labels_with_prefix(&self, id: &str, prefix: &str) -> Result<(), CatalogError>;
}

/// Error type for publisher operations
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// Network failure or non-success HTTP status at any step
    #[error("{platform} API error{}: {detail}", status_suffix(.status))]
    Transport {
        platform: Platform,
        status: Option<u16>,
        detail: String,
    },
    /// The platform reported a terminal error while processing a container
    #[error("{platform} media processing failed: {detail}")]
    Processing { platform: Platform, detail: String },
    /// Polling exceeded its wall-clock budget
    #[error("{platform} media processing timed out after {waited:?}")]
    Timeout { platform: Platform, waited: Duration },
    #[error("{platform} requires at least one image")]
    MissingMedia { platform: Platform },
    #[error("{platform} does not support {what}")]
    Unsupported {
        platform: Platform,
        what: &'static str,
    },
    #[error("{platform} publisher is disabled")]
    Disabled { platform: Platform },
    #[error("{platform} returned an unexpected response: {detail}")]
    InvalidResponse { platform: Platform, detail: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// A live post on a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    /// Permanent platform post ID
    pub id: String,
}

/// Port for publishing one logical post to one platform
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a request, returns the permanent post ID
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPost, PublishError>;

    /// Publish an ephemeral story image
    async fn publish_story(&self, _image_url: &str) -> Result<PublishedPost, PublishError> {
        Err(PublishError::Unsupported {
            platform: self.platform(),
            what: "stories",
        })
    }

    /// Whether `publish_story` is implemented
    fn supports_stories(&self) -> bool {
        false
    }

    /// Whether the platform can post this content at all. Declined requests
    /// are skipped, not reported as failures.
    fn accepts(&self, _request: &PublishRequest) -> bool {
        true
    }

    /// Whether credentials are complete; disabled publishers are skipped
    fn is_enabled(&self) -> bool;

    fn platform(&self) -> Platform;

    fn protocol(&self) -> PublishProtocol;
}

/// Port for a platform speaking the create / poll / publish container protocol
#[async_trait]
pub trait ContainerApi: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether credentials are complete
    fn is_configured(&self) -> bool;

    /// Whether `ContainerSpec::Story` is accepted
    fn supports_stories(&self) -> bool {
        false
    }

    /// Whether `ContainerSpec::Text` is accepted
    fn supports_text(&self) -> bool {
        true
    }

    /// Create a container, returning its identifier
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, PublishError>;

    /// Read the processing status of a container
    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus, PublishError>;

    /// Commit a finished container as a live post
    async fn publish_container(&self, container_id: &str) -> Result<String, PublishError>;
}

/// Error type for story image preparation
#[derive(Debug, Error)]
pub enum StoryImageError {
    #[error("Failed to fetch source image: {0}")]
    Fetch(String),
    #[error("Failed to upload story image: {0}")]
    Upload(String),
}

/// Port producing an aspect-ratio-normalized story image from a post image
#[async_trait]
pub trait StoryImageSource: Send + Sync {
    /// Returns a public URL of the story-ready image
    async fn prepare(&self, image_url: &str) -> Result<String, StoryImageError>;
}

/// Port turning a catalog item into publishable content
pub trait ContentGenerator: Send + Sync {
    fn generate(&self, item: &CatalogItem, partition: &Partition) -> PublishRequest;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
