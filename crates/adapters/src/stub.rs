//! Stub publisher for testing and offline mode

use async_trait::async_trait;
use shopcast_domain::{
    Platform, PublishError, PublishProtocol, PublishRequest, PublishedPost, Publisher,
};
use std::sync::Mutex;

/// Publisher that records requests instead of calling a platform
pub struct StubPublisher {
    platform: Platform,
    error: Option<String>,
    published: Mutex<Vec<PublishRequest>>,
    stories: Mutex<Vec<String>>,
}

impl StubPublisher {
    /// Create a stub that accepts every post
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            error: None,
            published: Mutex::new(Vec::new()),
            stories: Mutex::new(Vec::new()),
        }
    }

    /// Create a stub that rejects every post with a processing error
    pub fn failing(platform: Platform, detail: impl Into<String>) -> Self {
        Self {
            error: Some(detail.into()),
            ..Self::new(platform)
        }
    }

    /// Requests accepted so far
    pub fn published(&self) -> Vec<PublishRequest> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Story images accepted so far
    pub fn stories(&self) -> Vec<String> {
        self.stories.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn check(&self) -> Result<(), PublishError> {
        match &self.error {
            Some(detail) => Err(PublishError::Processing {
                platform: self.platform,
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }

    fn record<T>(&self, log: &Mutex<Vec<T>>, entry: T, prefix: &str) -> PublishedPost {
        let count = match log.lock() {
            Ok(mut log) => {
                log.push(entry);
                log.len()
            }
            Err(_) => 0,
        };
        PublishedPost {
            id: format!("stub-{}-{}-{}", self.platform, prefix, count),
        }
    }
}

#[async_trait]
impl Publisher for StubPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPost, PublishError> {
        self.check()?;
        tracing::info!(
            platform = %self.platform,
            images = request.image_urls.len(),
            "Stub publish"
        );
        Ok(self.record(&self.published, request.clone(), "post"))
    }

    async fn publish_story(&self, image_url: &str) -> Result<PublishedPost, PublishError> {
        if !self.supports_stories() {
            return Err(PublishError::Unsupported {
                platform: self.platform,
                what: "stories",
            });
        }
        self.check()?;
        Ok(self.record(&self.stories, image_url.to_string(), "story"))
    }

    fn supports_stories(&self) -> bool {
        self.platform != Platform::Threads
    }

    fn accepts(&self, request: &PublishRequest) -> bool {
        self.platform != Platform::Instagram || !request.image_urls.is_empty()
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn protocol(&self) -> PublishProtocol {
        match self.platform {
            Platform::Facebook => PublishProtocol::Synchronous,
            Platform::Instagram | Platform::Threads => PublishProtocol::AsyncContainer,
        }
    }
}
