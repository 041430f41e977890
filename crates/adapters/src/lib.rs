//! shopcast adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `shopify`: Shopify Admin API catalog
//! - `catalog`: JSON-file catalog for offline runs
//! - `meta`: Facebook, Instagram and Threads publishing
//! - `stub`: Recording publisher for offline runs
//! - `story`: Story image sources

mod catalog_file;
mod shopify;
mod story;
mod stub;

pub mod meta;

/// Re-exports for catalog adapters
pub mod catalog {
    pub use crate::catalog_file::{CatalogEntry, LocalCatalog};
    pub use crate::shopify::ShopifyCatalog;
}

pub use story::OriginalImageStory;
pub use stub::StubPublisher;
