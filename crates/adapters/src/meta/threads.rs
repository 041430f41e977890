//! Threads publishing (media containers)

use async_trait::async_trait;
use secrecy::SecretString;
use shopcast_domain::{ContainerApi, ContainerSpec, ContainerStatus, Platform, PublishError};

use super::{GraphClient, THREADS_GRAPH_URL, parse_container_status};

/// Threads user media API
pub struct ThreadsApi {
    graph: GraphClient,
    user_id: String,
}

impl ThreadsApi {
    pub fn new(user_id: String, access_token: SecretString) -> Self {
        Self::with_base_url(user_id, access_token, THREADS_GRAPH_URL.to_string())
    }

    pub fn with_base_url(user_id: String, access_token: SecretString, base_url: String) -> Self {
        Self {
            graph: GraphClient::new(Platform::Threads, base_url, access_token),
            user_id,
        }
    }

    fn fields(spec: &ContainerSpec) -> Result<Vec<(&'static str, String)>, PublishError> {
        let fields = match spec {
            ContainerSpec::Text { caption, link } => {
                let mut fields = vec![
                    ("media_type", "TEXT".to_string()),
                    ("text", caption.clone()),
                ];
                if let Some(link) = link {
                    fields.push(("link_attachment", link.clone()));
                }
                fields
            }
            ContainerSpec::Image {
                image_url,
                caption,
            } => vec![
                ("media_type", "IMAGE".to_string()),
                ("image_url", image_url.clone()),
                ("text", caption.clone()),
            ],
            ContainerSpec::CarouselItem { image_url } => vec![
                ("media_type", "IMAGE".to_string()),
                ("image_url", image_url.clone()),
                ("is_carousel_item", "true".to_string()),
            ],
            ContainerSpec::Carousel { children, caption } => vec![
                ("media_type", "CAROUSEL".to_string()),
                ("children", children.join(",")),
                ("text", caption.clone()),
            ],
            ContainerSpec::Story { .. } => {
                return Err(PublishError::Unsupported {
                    platform: Platform::Threads,
                    what: "stories",
                });
            }
        };
        Ok(fields)
    }
}

#[async_trait]
impl ContainerApi for ThreadsApi {
    fn platform(&self) -> Platform {
        Platform::Threads
    }

    fn is_configured(&self) -> bool {
        !self.user_id.trim().is_empty() && self.graph.has_token()
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, PublishError> {
        let fields = Self::fields(spec)?;
        let response = self
            .graph
            .post_form(&format!("{}/threads", self.user_id), &fields)
            .await?;
        self.graph.id_field(&response, "id")
    }

    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus, PublishError> {
        let response = self.graph.get_fields(container_id, "status").await?;
        let status = parse_container_status(response.get("status").and_then(|s| s.as_str()));
        tracing::debug!(container_id = %container_id, status = ?status, "Threads container status");
        Ok(status)
    }

    async fn publish_container(&self, container_id: &str) -> Result<String, PublishError> {
        let response = self
            .graph
            .post_form(
                &format!("{}/threads_publish", self.user_id),
                &[("creation_id", container_id.to_string())],
            )
            .await?;
        self.graph.id_field(&response, "id")
    }
}
