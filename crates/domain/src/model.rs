//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// A product record owned by the remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable catalog identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// URL handle used to build the canonical product link
    #[serde(default)]
    pub handle: String,
    /// Raw description (may contain HTML)
    #[serde(default)]
    pub description: Option<String>,
    /// Price of the first variant, as reported by the catalog
    #[serde(default)]
    pub price: Option<String>,
    /// Ordered image URLs
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Free-text labels; the only state this system writes
    #[serde(default)]
    pub labels: Vec<String>,
    /// Creation time, used for newest-first ordering
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl CatalogItem {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A named rotation domain backed by a set of catalog collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Partition name (e.g. "souvenir", "fashion")
    pub name: String,
    /// Label prefix; a rotation tag is `<tag_prefix><round>`
    pub tag_prefix: String,
    /// Collection names or handles whose products belong to this partition
    pub collections: Vec<String>,
}

impl Partition {
    pub fn new(
        name: impl Into<String>,
        tag_prefix: impl Into<String>,
        collections: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tag_prefix: tag_prefix.into(),
            collections,
        }
    }

    /// Rotation tag for the given round
    pub fn round_tag(&self, round: u32) -> String {
        format!("{}{}", self.tag_prefix, round)
    }

    /// Parse the round number out of a label, if it is a well-formed rotation tag
    /// for this partition. Malformed or non-positive suffixes yield `None`.
    pub fn parse_round(&self, label: &str) -> Option<u32> {
        label
            .strip_prefix(&self.tag_prefix)?
            .parse::<u32>()
            .ok()
            .filter(|round| *round > 0)
    }
}

/// A catalog collection, as listed for operators choosing partition members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub title: String,
    pub handle: String,
}

/// Target social platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    Instagram,
    Threads,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Facebook, Platform::Instagram, Platform::Threads];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Threads => "threads",
        }
    }

    /// Maximum number of images in a single multi-image post
    pub fn max_carousel_items(&self) -> usize {
        match self {
            Platform::Facebook => 10,
            Platform::Instagram => 10,
            Platform::Threads => 20,
        }
    }

    /// Whether captions for this platform carry discovery hashtags
    pub fn uses_discovery_tags(&self) -> bool {
        !matches!(self, Platform::Threads)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown platform '{0}' (expected fb, ig or threads)")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fb" | "facebook" => Ok(Platform::Facebook),
            "ig" | "instagram" => Ok(Platform::Instagram),
            "threads" => Ok(Platform::Threads),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// How a platform turns a request into a live post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishProtocol {
    /// One call (or one upload batch plus one call) produces the post
    Synchronous,
    /// Create container, poll until processed, then publish
    AsyncContainer,
}

/// Content ready to be published to one or more platforms
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishRequest {
    /// Caption including discovery hashtags
    pub caption: String,
    /// Caption without discovery hashtags
    pub caption_plain: String,
    /// Ordered image URLs
    pub image_urls: Vec<String>,
    /// Canonical product link
    pub link: Option<String>,
}

impl PublishRequest {
    /// Pick the caption variant the platform expects
    pub fn caption_for(&self, platform: Platform) -> &str {
        if platform.uses_discovery_tags() {
            &self.caption
        } else {
            &self.caption_plain
        }
    }
}

/// Payload for creating a remote media container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerSpec {
    /// Text-only post with optional link attachment
    Text { caption: String, link: Option<String> },
    /// Standalone single image
    Image { image_url: String, caption: String },
    /// Non-standalone child of a carousel
    CarouselItem { image_url: String },
    /// Parent container wrapping previously created children
    Carousel { children: Vec<String>, caption: String },
    /// Ephemeral story image
    Story { image_url: String },
}

/// Processing status reported while polling a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    InProgress,
    Finished,
    Failed { detail: String },
}

/// Per-platform outcome of one publish attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published { post_id: String },
    Failed { error: String },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// Aggregated outcomes of one logical post, keyed by platform (or `<platform>_story`)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PublishReport {
    outcomes: BTreeMap<String, PublishOutcome>,
}

impl PublishReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: impl Into<String>, outcome: PublishOutcome) {
        self.outcomes.insert(key.into(), outcome);
    }

    pub fn get(&self, key: &str) -> Option<&PublishOutcome> {
        self.outcomes.get(key)
    }

    pub fn outcomes(&self) -> &BTreeMap<String, PublishOutcome> {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True only if at least one platform was attempted and every attempt succeeded
    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.values().all(PublishOutcome::is_success)
    }
}

/// Result of asking the selector for the next item
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Selected { item: CatalogItem, partition: String },
    Empty,
}

/// Rotation progress for one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationStats {
    pub partition: String,
    pub total: usize,
    pub round: u32,
    pub posted_this_round: usize,
    pub remaining: usize,
}
