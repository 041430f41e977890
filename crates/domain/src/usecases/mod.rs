//! Application use cases / business logic

pub mod container;
pub mod orchestrator;
pub mod posting_run;
pub mod render;
pub mod rotation;
pub mod selector;

pub use container::{ContainerPublisher, PollConfig};
pub use orchestrator::PublishOrchestrator;
pub use posting_run::{PostedItem, PostingRun, PostingRunError, RunConfig, RunReport, RunRequest};
pub use render::{CaptionRenderer, KeywordTag, RenderConfig};
pub use rotation::{CatalogRotationStore, MarkOutcome, RotationError};
pub use selector::{ProductSelector, SelectorError};
