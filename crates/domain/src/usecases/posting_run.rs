//! Posting run use case - selects, renders, publishes and marks items

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    model::{CatalogItem, Platform, PublishReport, PublishRequest, Selection},
    ports::{CatalogStore, Clock, ContentGenerator},
    usecases::{
        orchestrator::PublishOrchestrator,
        selector::{ProductSelector, SelectorError},
    },
};

/// Configuration for a posting run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Upper bound on posts per run; larger requests are clamped
    pub max_posts_per_run: usize,
    /// Render and log without publishing or marking
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_posts_per_run: 10,
            dry_run: true,
        }
    }
}

/// What the caller asks one run to do
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub count: usize,
    /// Restrict selection to one partition
    pub partition: Option<String>,
    pub platforms: Vec<Platform>,
}

/// One item handled during a run
#[derive(Debug, Clone, Serialize)]
pub struct PostedItem {
    pub item_id: String,
    pub title: String,
    pub partition: String,
    pub outcomes: PublishReport,
    /// Whether the item received its rotation tag
    pub marked: bool,
    /// Rendered content, kept for dry runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PublishRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub posts: Vec<PostedItem>,
}

impl RunReport {
    /// Items whose every platform attempt succeeded
    pub fn succeeded(&self) -> usize {
        self.posts
            .iter()
            .filter(|p| p.outcomes.all_succeeded())
            .count()
    }
}

/// Errors from a posting run
#[derive(Debug, thiserror::Error)]
pub enum PostingRunError {
    #[error("None of the requested platforms ({requested}) is configured")]
    NoPlatforms { requested: String },
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Posting run orchestrator
pub struct PostingRun<C, G, Cl>
where
    C: CatalogStore + ?Sized,
    G: ContentGenerator + ?Sized,
    Cl: Clock + ?Sized,
{
    selector: Arc<ProductSelector<C>>,
    generator: Arc<G>,
    orchestrator: Arc<PublishOrchestrator>,
    clock: Arc<Cl>,
    config: RunConfig,
}

impl<C, G, Cl> PostingRun<C, G, Cl>
where
    C: CatalogStore + ?Sized,
    G: ContentGenerator + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        selector: Arc<ProductSelector<C>>,
        generator: Arc<G>,
        orchestrator: Arc<PublishOrchestrator>,
        clock: Arc<Cl>,
        config: RunConfig,
    ) -> Self {
        Self {
            selector,
            generator,
            orchestrator,
            clock,
            config,
        }
    }

    /// Execute one run of up to `request.count` posts
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, PostingRunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("posting_run", run_id = %run_id);
        self.run_inner(run_id, request).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        request: &RunRequest,
    ) -> Result<RunReport, PostingRunError> {
        let started_at = self.clock.now();
        let platforms = self.target_platforms(&request.platforms)?;

        let count = request.count.min(self.config.max_posts_per_run);
        if count < request.count {
            tracing::warn!(
                requested = request.count,
                max = self.config.max_posts_per_run,
                "Clamping post count"
            );
        }

        tracing::info!(
            count,
            partition = ?request.partition,
            platforms = ?platforms,
            dry_run = self.config.dry_run,
            "Starting posting run"
        );

        let mut posts = Vec::with_capacity(count);
        // An unmarked item is offered again; it waits for the next run
        let mut attempted: HashSet<String> = HashSet::new();
        let mut exhausted: HashSet<String> = HashSet::new();

        while posts.len() < count {
            let selection = self
                .selector
                .next_skipping(request.partition.as_deref(), &exhausted)
                .await?;
            let (item, partition) = match selection {
                Selection::Selected { item, partition } => (item, partition),
                Selection::Empty => {
                    tracing::info!(posted = posts.len(), "No more items to post");
                    break;
                }
            };

            if !attempted.insert(item.id.clone()) {
                tracing::info!(
                    item_id = %item.id,
                    partition = %partition,
                    "Item already handled in this run, skipping partition"
                );
                exhausted.insert(partition);
                continue;
            }

            tracing::info!(
                item_id = %item.id,
                title = %item.title,
                partition = %partition,
                position = posts.len() + 1,
                "Selected item"
            );

            posts.push(self.deliver(item, partition, &platforms, true).await?);
        }

        Ok(self.finish(run_id, started_at, posts))
    }

    /// Publish one specific item outside the rotation. The item is never
    /// marked, so it keeps its place in the current round.
    ///
    /// `partition` picks the caption context; defaults to the first partition.
    pub async fn post_item(
        &self,
        item_id: &str,
        partition: Option<&str>,
        platforms: &[Platform],
    ) -> Result<RunReport, PostingRunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("posting_run", run_id = %run_id, item_id = %item_id);
        self.post_item_inner(run_id, item_id, partition, platforms)
            .instrument(span)
            .await
    }

    async fn post_item_inner(
        &self,
        run_id: Uuid,
        item_id: &str,
        partition: Option<&str>,
        platforms: &[Platform],
    ) -> Result<RunReport, PostingRunError> {
        let started_at = self.clock.now();
        let platforms = self.target_platforms(platforms)?;

        let partition = match partition {
            Some(name) => self.selector.store(name)?.partition().name.clone(),
            None => self
                .selector
                .partitions()
                .next()
                .map(|p| p.name.clone())
                .ok_or(SelectorError::NoPartitions)?,
        };
        let item = self.selector.item(item_id).await?;

        tracing::info!(
            item_id = %item.id,
            title = %item.title,
            partition = %partition,
            "Posting requested item"
        );

        let posted = self.deliver(item, partition, &platforms, false).await?;
        Ok(self.finish(run_id, started_at, vec![posted]))
    }

    /// Render and publish one item; `mark` tags it after full success
    async fn deliver(
        &self,
        item: CatalogItem,
        partition: String,
        platforms: &[Platform],
        mark: bool,
    ) -> Result<PostedItem, PostingRunError> {
        let partition_def = self.selector.store(&partition)?.partition().clone();
        let content = self.generator.generate(&item, &partition_def);

        if self.config.dry_run {
            tracing::info!(
                item_id = %item.id,
                caption = %content.caption,
                "[DRY RUN] Would publish"
            );
            return Ok(PostedItem {
                item_id: item.id,
                title: item.title,
                partition,
                outcomes: PublishReport::new(),
                marked: false,
                preview: Some(content),
            });
        }

        let outcomes = self.orchestrator.publish(&content, platforms).await;
        let marked = if !outcomes.all_succeeded() {
            tracing::warn!(
                item_id = %item.id,
                partition = %partition,
                "Not every platform succeeded, leaving item unmarked"
            );
            false
        } else if mark {
            self.mark(&item.id, &partition).await
        } else {
            false
        };

        Ok(PostedItem {
            item_id: item.id,
            title: item.title,
            partition,
            outcomes,
            marked,
            preview: None,
        })
    }

    fn finish(
        &self,
        run_id: Uuid,
        started_at: OffsetDateTime,
        posts: Vec<PostedItem>,
    ) -> RunReport {
        let report = RunReport {
            run_id,
            dry_run: self.config.dry_run,
            started_at,
            finished_at: self.clock.now(),
            posts,
        };

        tracing::info!(
            processed = report.posts.len(),
            succeeded = report.succeeded(),
            "Posting run finished"
        );

        report
    }

    /// Requested platforms narrowed to those with credentials
    fn target_platforms(&self, requested: &[Platform]) -> Result<Vec<Platform>, PostingRunError> {
        if self.config.dry_run {
            return Ok(requested.to_vec());
        }

        let enabled = self.orchestrator.enabled_platforms();
        let platforms: Vec<Platform> = requested
            .iter()
            .copied()
            .filter(|p| enabled.contains(p))
            .collect();

        if platforms.is_empty() {
            return Err(PostingRunError::NoPlatforms {
                requested: requested
                    .iter()
                    .map(Platform::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(platforms)
    }

    async fn mark(&self, item_id: &str, partition: &str) -> bool {
        match self.selector.mark_posted(item_id, partition).await {
            Ok(outcome) => {
                tracing::info!(
                    item_id = %item_id,
                    partition = %partition,
                    tag = %outcome.tag,
                    round = outcome.round,
                    advanced = outcome.advanced,
                    "Marked item as posted"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    item_id = %item_id,
                    partition = %partition,
                    error = %e,
                    "Failed to mark item as posted"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Partition, PublishProtocol};
    use crate::ports::{PublishError, PublishedPost, Publisher};
    use crate::usecases::render::{CaptionRenderer, RenderConfig};
    use crate::usecases::rotation::tests::{FakeCatalog, item};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakePublisher {
        platform: Platform,
        fail: bool,
        needs_images: bool,
        published: Mutex<Vec<String>>,
    }

    impl FakePublisher {
        fn new(platform: Platform, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                platform,
                fail,
                needs_images: false,
                published: Mutex::new(vec![]),
            })
        }

        fn image_only(platform: Platform) -> Arc<Self> {
            Arc::new(Self {
                platform,
                fail: false,
                needs_images: true,
                published: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(&self, request: &PublishRequest) -> Result<PublishedPost, PublishError> {
            self.published
                .lock()
                .unwrap()
                .push(request.caption_plain.clone());
            if self.fail {
                return Err(PublishError::Processing {
                    platform: self.platform,
                    detail: "ERROR".to_string(),
                });
            }
            Ok(PublishedPost {
                id: "p1".to_string(),
            })
        }

        fn accepts(&self, request: &PublishRequest) -> bool {
            !self.needs_images || !request.image_urls.is_empty()
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn platform(&self) -> Platform {
            self.platform
        }

        fn protocol(&self) -> PublishProtocol {
            PublishProtocol::AsyncContainer
        }
    }

    struct FakeClock;

    impl Clock for FakeClock {
        fn now(&self) -> OffsetDateTime {
            OffsetDateTime::UNIX_EPOCH
        }
    }

    fn partitions() -> Vec<Partition> {
        vec![
            Partition::new("souvenir", "souvenir-round-", vec!["sweets".to_string()]),
            Partition::new("fashion", "fashion-round-", vec!["apparel".to_string()]),
        ]
    }

    fn posting_run(
        catalog: &Arc<FakeCatalog>,
        publishers: Vec<Arc<dyn Publisher>>,
        config: RunConfig,
    ) -> PostingRun<FakeCatalog, CaptionRenderer, FakeClock> {
        let selector =
            ProductSelector::new(Arc::clone(catalog), partitions(), None).unwrap();
        PostingRun::new(
            Arc::new(selector),
            Arc::new(CaptionRenderer::new(RenderConfig::default())),
            Arc::new(PublishOrchestrator::new(publishers)),
            Arc::new(FakeClock),
            config,
        )
    }

    fn live() -> RunConfig {
        RunConfig {
            max_posts_per_run: 10,
            dry_run: false,
        }
    }

    fn request(count: usize) -> RunRequest {
        RunRequest {
            count,
            partition: None,
            platforms: Platform::ALL.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_marks_items_after_full_success() {
        let catalog = Arc::new(FakeCatalog::new(vec![
            item("s1", "sweets", 0, &[]),
            item("f1", "apparel", 0, &[]),
        ]));
        let threads = FakePublisher::new(Platform::Threads, false);
        let run = posting_run(&catalog, vec![threads.clone() as Arc<dyn Publisher>], live());

        let report = run.run(&request(2)).await.unwrap();

        assert_eq!(report.posts.len(), 2);
        assert_eq!(report.posts[0].partition, "souvenir");
        assert_eq!(report.posts[1].partition, "fashion");
        assert!(report.posts.iter().all(|p| p.marked));
        assert_eq!(report.succeeded(), 2);
        assert_eq!(catalog.labels_of("s1"), vec!["souvenir-round-2"]);
        assert_eq!(catalog.labels_of("f1"), vec!["fashion-round-2"]);
        assert_eq!(threads.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_leaves_item_unmarked() {
        let catalog = Arc::new(FakeCatalog::new(vec![
            item("s1", "sweets", 0, &[]),
            item("s2", "sweets", 1, &[]),
        ]));
        let run = posting_run(
            &catalog,
            vec![
                FakePublisher::new(Platform::Threads, false) as Arc<dyn Publisher>,
                FakePublisher::new(Platform::Instagram, true),
            ],
            live(),
        );

        let mut req = request(1);
        req.partition = Some("souvenir".to_string());
        let report = run.run(&req).await.unwrap();

        assert_eq!(report.posts.len(), 1);
        assert!(!report.posts[0].marked);
        assert!(catalog.labels_of("s1").is_empty());

        // The same item is offered again on the next run
        let again = run.run(&req).await.unwrap();
        assert_eq!(again.posts[0].item_id, "s1");
    }

    #[tokio::test]
    async fn test_dry_run_neither_publishes_nor_marks() {
        let catalog = Arc::new(FakeCatalog::new(vec![item("s1", "sweets", 0, &[])]));
        let threads = FakePublisher::new(Platform::Threads, false);
        let run = posting_run(
            &catalog,
            vec![threads.clone() as Arc<dyn Publisher>],
            RunConfig::default(),
        );

        let report = run.run(&request(1)).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.posts.len(), 1);
        assert!(!report.posts[0].marked);
        assert!(report.posts[0].preview.is_some());
        assert!(threads.published.lock().unwrap().is_empty());
        assert!(catalog.labels_of("s1").is_empty());
    }

    #[tokio::test]
    async fn test_stops_when_catalog_is_empty() {
        let catalog = Arc::new(FakeCatalog::new(vec![]));
        let run = posting_run(
            &catalog,
            vec![FakePublisher::new(Platform::Threads, false) as Arc<dyn Publisher>],
            live(),
        );

        let report = run.run(&request(5)).await.unwrap();
        assert!(report.posts.is_empty());
    }

    #[tokio::test]
    async fn test_count_is_clamped() {
        let catalog = Arc::new(FakeCatalog::new(vec![
            item("s1", "sweets", 0, &[]),
            item("s2", "sweets", 1, &[]),
            item("s3", "sweets", 2, &[]),
            item("f1", "apparel", 0, &[]),
            item("f2", "apparel", 1, &[]),
        ]));
        let run = posting_run(
            &catalog,
            vec![FakePublisher::new(Platform::Threads, false) as Arc<dyn Publisher>],
            RunConfig {
                max_posts_per_run: 3,
                dry_run: false,
            },
        );

        let report = run.run(&request(50)).await.unwrap();
        assert_eq!(report.posts.len(), 3);
        assert!(report.posts.iter().all(|p| p.marked));
    }

    #[tokio::test]
    async fn test_unmarked_item_is_not_reposted_in_the_same_run() {
        let catalog = Arc::new(FakeCatalog::new(vec![
            item("s1", "sweets", 0, &[]),
            item("s2", "sweets", 1, &[]),
            item("f1", "apparel", 0, &[]),
        ]));
        let threads = FakePublisher::new(Platform::Threads, false);
        let run = posting_run(
            &catalog,
            vec![
                threads.clone() as Arc<dyn Publisher>,
                FakePublisher::new(Platform::Instagram, true),
            ],
            live(),
        );

        let report = run.run(&request(5)).await.unwrap();

        let ids: Vec<&str> = report.posts.iter().map(|p| p.item_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "f1"]);
        assert!(report.posts.iter().all(|p| !p.marked));
        assert_eq!(threads.published.lock().unwrap().len(), 2);
        assert!(catalog.labels_of("s1").is_empty());
        assert!(catalog.labels_of("f1").is_empty());
    }

    #[tokio::test]
    async fn test_imageless_item_is_marked_when_remaining_platforms_succeed() {
        let mut imageless = item("s1", "sweets", 0, &[]);
        imageless.image_urls.clear();
        let catalog = Arc::new(FakeCatalog::new(vec![imageless]));
        let instagram = FakePublisher::image_only(Platform::Instagram);
        let threads = FakePublisher::new(Platform::Threads, false);
        let run = posting_run(
            &catalog,
            vec![
                instagram.clone() as Arc<dyn Publisher>,
                threads.clone(),
            ],
            live(),
        );

        let report = run.run(&request(1)).await.unwrap();

        assert_eq!(report.posts.len(), 1);
        assert!(report.posts[0].marked);
        assert!(report.posts[0].outcomes.get("instagram").is_none());
        assert!(instagram.published.lock().unwrap().is_empty());
        assert_eq!(threads.published.lock().unwrap().len(), 1);
        assert_eq!(catalog.labels_of("s1"), vec!["souvenir-round-2"]);
    }

    #[tokio::test]
    async fn test_post_item_publishes_without_marking() {
        let catalog = Arc::new(FakeCatalog::new(vec![
            item("s1", "sweets", 0, &[]),
            item("f1", "apparel", 3, &[]),
        ]));
        let threads = FakePublisher::new(Platform::Threads, false);
        let run = posting_run(&catalog, vec![threads.clone() as Arc<dyn Publisher>], live());

        let report = run
            .post_item("f1", Some("fashion"), &Platform::ALL)
            .await
            .unwrap();

        assert_eq!(report.posts.len(), 1);
        assert_eq!(report.posts[0].item_id, "f1");
        assert_eq!(report.posts[0].partition, "fashion");
        assert!(report.posts[0].outcomes.all_succeeded());
        assert!(!report.posts[0].marked);
        assert_eq!(threads.published.lock().unwrap().len(), 1);
        assert!(catalog.labels_of("f1").is_empty());
    }

    #[tokio::test]
    async fn test_post_item_unknown_id_fails() {
        let catalog = Arc::new(FakeCatalog::new(vec![item("s1", "sweets", 0, &[])]));
        let threads = FakePublisher::new(Platform::Threads, false);
        let run = posting_run(&catalog, vec![threads.clone() as Arc<dyn Publisher>], live());

        let result = run.post_item("nope", None, &Platform::ALL).await;

        assert!(matches!(result, Err(PostingRunError::Selector(_))));
        assert!(threads.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requires_a_configured_platform() {
        let catalog = Arc::new(FakeCatalog::new(vec![item("s1", "sweets", 0, &[])]));
        let run = posting_run(
            &catalog,
            vec![FakePublisher::new(Platform::Threads, false) as Arc<dyn Publisher>],
            live(),
        );

        let mut req = request(1);
        req.platforms = vec![Platform::Facebook];
        let result = run.run(&req).await;

        assert!(matches!(result, Err(PostingRunError::NoPlatforms { .. })));
        assert!(catalog.labels_of("s1").is_empty());
    }
}
