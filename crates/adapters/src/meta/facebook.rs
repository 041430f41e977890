//! Facebook Page publisher

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use shopcast_domain::{
    Platform, PublishError, PublishProtocol, PublishRequest, PublishedPost, Publisher,
};

use super::{FACEBOOK_GRAPH_URL, GraphClient};

/// Publishes to a Facebook Page. Posts are live as soon as the call returns.
pub struct FacebookPublisher {
    graph: GraphClient,
    page_id: String,
    enabled: bool,
}

impl FacebookPublisher {
    pub fn new(page_id: String, access_token: SecretString) -> Self {
        Self::with_base_url(page_id, access_token, FACEBOOK_GRAPH_URL.to_string())
    }

    pub fn with_base_url(page_id: String, access_token: SecretString, base_url: String) -> Self {
        let graph = GraphClient::new(Platform::Facebook, base_url, access_token);
        let enabled = !page_id.trim().is_empty() && graph.has_token();
        Self {
            graph,
            page_id,
            enabled,
        }
    }

    /// Create a disabled publisher (missing credentials)
    pub fn disabled() -> Self {
        Self {
            graph: GraphClient::new(
                Platform::Facebook,
                String::new(),
                SecretString::new("".into()),
            ),
            page_id: String::new(),
            enabled: false,
        }
    }

    fn post_id(&self, response: &Value) -> Result<String, PublishError> {
        // Photo endpoints return both the photo `id` and the feed `post_id`
        self.graph
            .id_field(response, "post_id")
            .or_else(|_| self.graph.id_field(response, "id"))
    }

    async fn post_text(&self, message: &str, link: Option<&str>) -> Result<String, PublishError> {
        let mut fields = vec![("message", message.to_string())];
        if let Some(link) = link {
            fields.push(("link", link.to_string()));
        }

        let response = self
            .graph
            .post_form(&format!("{}/feed", self.page_id), &fields)
            .await?;
        self.graph.id_field(&response, "id")
    }

    async fn post_photo(&self, caption: &str, image_url: &str) -> Result<String, PublishError> {
        let response = self
            .graph
            .post_form(
                &format!("{}/photos", self.page_id),
                &[
                    ("caption", caption.to_string()),
                    ("url", image_url.to_string()),
                ],
            )
            .await?;
        self.post_id(&response)
    }

    /// Upload a photo without publishing it, returning the photo id
    async fn upload_unpublished(&self, image_url: &str) -> Result<String, PublishError> {
        let response = self
            .graph
            .post_form(
                &format!("{}/photos", self.page_id),
                &[
                    ("url", image_url.to_string()),
                    ("published", "false".to_string()),
                ],
            )
            .await?;
        self.graph.id_field(&response, "id")
    }

    async fn post_multi_photo(
        &self,
        message: &str,
        image_urls: &[String],
    ) -> Result<String, PublishError> {
        let max = Platform::Facebook.max_carousel_items();

        let mut photo_ids = Vec::with_capacity(image_urls.len().min(max));
        for image_url in image_urls.iter().take(max) {
            photo_ids.push(self.upload_unpublished(image_url).await?);
        }

        let keys: Vec<String> = (0..photo_ids.len())
            .map(|i| format!("attached_media[{}]", i))
            .collect();
        let mut fields = vec![("message", message.to_string())];
        for (key, photo_id) in keys.iter().zip(&photo_ids) {
            fields.push((key.as_str(), format!(r#"{{"media_fbid":"{}"}}"#, photo_id)));
        }

        let response = self
            .graph
            .post_form(&format!("{}/feed", self.page_id), &fields)
            .await?;
        self.graph.id_field(&response, "id")
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPost, PublishError> {
        if !self.enabled {
            return Err(PublishError::Disabled {
                platform: Platform::Facebook,
            });
        }

        let caption = request.caption_for(Platform::Facebook);
        let id = match request.image_urls.as_slice() {
            [] => self.post_text(caption, request.link.as_deref()).await?,
            [image_url] => self.post_photo(caption, image_url).await?,
            image_urls => self.post_multi_photo(caption, image_urls).await?,
        };

        tracing::info!(page_id = %self.page_id, post_id = %id, "Posted to Facebook Page");
        Ok(PublishedPost { id })
    }

    async fn publish_story(&self, image_url: &str) -> Result<PublishedPost, PublishError> {
        if !self.enabled {
            return Err(PublishError::Disabled {
                platform: Platform::Facebook,
            });
        }

        let photo_id = self.upload_unpublished(image_url).await?;
        let response = self
            .graph
            .post_form(
                &format!("{}/photo_stories", self.page_id),
                &[("photo_id", photo_id)],
            )
            .await?;

        Ok(PublishedPost {
            id: self.post_id(&response)?,
        })
    }

    fn supports_stories(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn protocol(&self) -> PublishProtocol {
        PublishProtocol::Synchronous
    }
}
