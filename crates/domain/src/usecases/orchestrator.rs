//! Fan-out of one logical post across platform publishers

use futures::future::join_all;
use std::sync::Arc;

use crate::{
    model::{Platform, PublishOutcome, PublishReport, PublishRequest},
    ports::{PublishError, PublishedPost, Publisher, StoryImageSource},
};

/// Publishes one request to every selected, enabled platform concurrently.
///
/// Failures are isolated per platform and collected into a [`PublishReport`];
/// nothing here retries or aborts siblings.
pub struct PublishOrchestrator {
    publishers: Vec<Arc<dyn Publisher>>,
    story_source: Option<Arc<dyn StoryImageSource>>,
}

impl PublishOrchestrator {
    pub fn new(publishers: Vec<Arc<dyn Publisher>>) -> Self {
        Self {
            publishers,
            story_source: None,
        }
    }

    /// Also publish a story to platforms that support one
    pub fn with_stories(mut self, source: Arc<dyn StoryImageSource>) -> Self {
        self.story_source = Some(source);
        self
    }

    /// Platforms with complete credentials
    pub fn enabled_platforms(&self) -> Vec<Platform> {
        self.publishers
            .iter()
            .filter(|p| p.is_enabled())
            .map(|p| p.platform())
            .collect()
    }

    fn active<'a>(
        &'a self,
        request: &'a PublishRequest,
        platforms: &'a [Platform],
    ) -> impl Iterator<Item = &'a Arc<dyn Publisher>> {
        self.publishers.iter().filter(move |publisher| {
            if !platforms.contains(&publisher.platform()) {
                return false;
            }
            if !publisher.is_enabled() {
                tracing::debug!(
                    platform = %publisher.platform(),
                    "Skipping platform without credentials"
                );
                return false;
            }
            if !publisher.accepts(request) {
                tracing::info!(
                    platform = %publisher.platform(),
                    images = request.image_urls.len(),
                    "Skipping platform that cannot post this content"
                );
                return false;
            }
            true
        })
    }

    /// Publish to the given platforms and report each outcome.
    ///
    /// Keys are platform names, plus `<platform>_story` for story attempts.
    pub async fn publish(
        &self,
        request: &PublishRequest,
        platforms: &[Platform],
    ) -> PublishReport {
        let posts = join_all(self.active(request, platforms).map(|publisher| async move {
            let platform = publisher.platform();
            tracing::info!(
                platform = %platform,
                protocol = ?publisher.protocol(),
                images = request.image_urls.len(),
                "Publishing"
            );
            (platform.as_str().to_string(), publisher.publish(request).await)
        }));

        let (mut results, stories) =
            futures::join!(posts, self.publish_stories(request, platforms));
        results.extend(stories);

        let mut report = PublishReport::new();
        for (key, result) in results {
            report.record(key.clone(), outcome(&key, result));
        }
        report
    }

    async fn publish_stories(
        &self,
        request: &PublishRequest,
        platforms: &[Platform],
    ) -> Vec<(String, Result<PublishedPost, PublishError>)> {
        if self.story_source.is_none() {
            return vec![];
        }
        let Some(source_image) = request.image_urls.first() else {
            return vec![];
        };

        let targets: Vec<_> = self
            .active(request, platforms)
            .filter(|p| p.supports_stories())
            .collect();
        if targets.is_empty() {
            return vec![];
        }

        let story_image = self.prepare_story_image(source_image).await;
        let story_image = story_image.as_str();

        join_all(targets.into_iter().map(|publisher| async move {
            let key = format!("{}_story", publisher.platform());
            (key, publisher.publish_story(story_image).await)
        }))
        .await
    }

    /// Produce the story image once; fall back to the original on failure
    async fn prepare_story_image(&self, image_url: &str) -> String {
        let Some(source) = &self.story_source else {
            return image_url.to_string();
        };

        match source.prepare(image_url).await {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    image_url = %image_url,
                    "Story image preparation failed, using original"
                );
                image_url.to_string()
            }
        }
    }
}

fn outcome(key: &str, result: Result<PublishedPost, PublishError>) -> PublishOutcome {
    match result {
        Ok(post) => {
            tracing::info!(target_key = %key, post_id = %post.id, "Published");
            PublishOutcome::Published { post_id: post.id }
        }
        Err(e) => {
            tracing::error!(target_key = %key, error = %e, "Publish failed");
            PublishOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}
