//! Create / poll / publish state machine for container-based platforms

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::{
    model::{ContainerSpec, ContainerStatus, Platform, PublishProtocol, PublishRequest},
    ports::{ContainerApi, PublishError, PublishedPost, Publisher},
};

/// Polling cadence and budget for one container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between status reads
    pub interval: Duration,
    /// Wall-clock budget before giving up
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Publishes through a [`ContainerApi`], hiding the multi-step protocol
/// behind a single call. Errors are never retried here.
pub struct ContainerPublisher<A: ContainerApi + ?Sized> {
    api: Arc<A>,
    poll: PollConfig,
}

impl<A: ContainerApi + ?Sized> ContainerPublisher<A> {
    pub fn new(api: Arc<A>, poll: PollConfig) -> Self {
        Self { api, poll }
    }

    fn platform_name(&self) -> Platform {
        self.api.platform()
    }

    /// Create a container, wait for it to finish processing, then publish it
    async fn run(&self, spec: ContainerSpec) -> Result<PublishedPost, PublishError> {
        let container_id = self.api.create_container(&spec).await?;
        tracing::info!(
            platform = %self.platform_name(),
            container_id = %container_id,
            "Created media container"
        );

        self.wait_until_finished(&container_id).await?;

        let post_id = self.api.publish_container(&container_id).await?;
        tracing::info!(
            platform = %self.platform_name(),
            container_id = %container_id,
            post_id = %post_id,
            "Published container"
        );

        Ok(PublishedPost { id: post_id })
    }

    async fn wait_until_finished(&self, container_id: &str) -> Result<(), PublishError> {
        let started = Instant::now();
        let mut polls = 0u32;

        while started.elapsed() < self.poll.timeout {
            polls += 1;
            match self.api.container_status(container_id).await? {
                ContainerStatus::Finished => {
                    tracing::debug!(
                        platform = %self.platform_name(),
                        container_id = %container_id,
                        polls,
                        "Container finished processing"
                    );
                    return Ok(());
                }
                ContainerStatus::Failed { detail } => {
                    return Err(PublishError::Processing {
                        platform: self.platform_name(),
                        detail,
                    });
                }
                ContainerStatus::InProgress => {}
            }

            sleep(self.poll.interval).await;
        }

        tracing::warn!(
            platform = %self.platform_name(),
            container_id = %container_id,
            polls,
            "Container processing timed out"
        );
        Err(PublishError::Timeout {
            platform: self.platform_name(),
            waited: started.elapsed(),
        })
    }

    async fn publish_carousel(
        &self,
        caption: &str,
        image_urls: &[String],
    ) -> Result<PublishedPost, PublishError> {
        let max = self.platform_name().max_carousel_items();
        if image_urls.len() > max {
            tracing::debug!(
                platform = %self.platform_name(),
                supplied = image_urls.len(),
                max,
                "Truncating carousel"
            );
        }

        let mut children = Vec::with_capacity(image_urls.len().min(max));
        for image_url in image_urls.iter().take(max) {
            let child = self
                .api
                .create_container(&ContainerSpec::CarouselItem {
                    image_url: image_url.clone(),
                })
                .await?;
            children.push(child);
        }

        self.run(ContainerSpec::Carousel {
            children,
            caption: caption.to_string(),
        })
        .await
    }
}

#[async_trait]
impl<A: ContainerApi + ?Sized> Publisher for ContainerPublisher<A> {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPost, PublishError> {
        let caption = request.caption_for(self.platform_name());

        match request.image_urls.as_slice() {
            [] => {
                self.run(ContainerSpec::Text {
                    caption: caption.to_string(),
                    link: request.link.clone(),
                })
                .await
            }
            [image_url] => {
                self.run(ContainerSpec::Image {
                    image_url: image_url.clone(),
                    caption: caption.to_string(),
                })
                .await
            }
            image_urls => self.publish_carousel(caption, image_urls).await,
        }
    }

    async fn publish_story(&self, image_url: &str) -> Result<PublishedPost, PublishError> {
        if !self.api.supports_stories() {
            return Err(PublishError::Unsupported {
                platform: self.platform_name(),
                what: "stories",
            });
        }

        self.run(ContainerSpec::Story {
            image_url: image_url.to_string(),
        })
        .await
    }

    fn supports_stories(&self) -> bool {
        self.api.supports_stories()
    }

    fn accepts(&self, request: &PublishRequest) -> bool {
        !request.image_urls.is_empty() || self.api.supports_text()
    }

    fn is_enabled(&self) -> bool {
        self.api.is_configured()
    }

    fn platform(&self) -> Platform {
        self.platform_name()
    }

    fn protocol(&self) -> PublishProtocol {
        PublishProtocol::AsyncContainer
    }
}
