//! Instagram content publishing (media containers)

use async_trait::async_trait;
use secrecy::SecretString;
use shopcast_domain::{ContainerApi, ContainerSpec, ContainerStatus, Platform, PublishError};

use super::{FACEBOOK_GRAPH_URL, GraphClient, parse_container_status};

/// Instagram business account media API
pub struct InstagramApi {
    graph: GraphClient,
    account_id: String,
}

impl InstagramApi {
    pub fn new(account_id: String, access_token: SecretString) -> Self {
        Self::with_base_url(account_id, access_token, FACEBOOK_GRAPH_URL.to_string())
    }

    pub fn with_base_url(account_id: String, access_token: SecretString, base_url: String) -> Self {
        Self {
            graph: GraphClient::new(Platform::Instagram, base_url, access_token),
            account_id,
        }
    }

    fn fields(spec: &ContainerSpec) -> Result<Vec<(&'static str, String)>, PublishError> {
        let fields = match spec {
            ContainerSpec::Text { .. } => {
                return Err(PublishError::MissingMedia {
                    platform: Platform::Instagram,
                });
            }
            ContainerSpec::Image {
                image_url,
                caption,
            } => vec![
                ("image_url", image_url.clone()),
                ("caption", caption.clone()),
            ],
            ContainerSpec::CarouselItem { image_url } => vec![
                ("image_url", image_url.clone()),
                ("is_carousel_item", "true".to_string()),
            ],
            ContainerSpec::Carousel { children, caption } => vec![
                ("media_type", "CAROUSEL".to_string()),
                ("children", children.join(",")),
                ("caption", caption.clone()),
            ],
            ContainerSpec::Story { image_url } => vec![
                ("media_type", "STORIES".to_string()),
                ("image_url", image_url.clone()),
            ],
        };
        Ok(fields)
    }
}

#[async_trait]
impl ContainerApi for InstagramApi {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn is_configured(&self) -> bool {
        !self.account_id.trim().is_empty() && self.graph.has_token()
    }

    fn supports_stories(&self) -> bool {
        true
    }

    fn supports_text(&self) -> bool {
        false
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, PublishError> {
        let fields = Self::fields(spec)?;
        let response = self
            .graph
            .post_form(&format!("{}/media", self.account_id), &fields)
            .await?;
        self.graph.id_field(&response, "id")
    }

    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus, PublishError> {
        let response = self.graph.get_fields(container_id, "status_code").await?;
        let status = parse_container_status(response.get("status_code").and_then(|s| s.as_str()));
        tracing::debug!(
            container_id = %container_id,
            status = ?status,
            "Instagram container status"
        );
        Ok(status)
    }

    async fn publish_container(&self, container_id: &str) -> Result<String, PublishError> {
        let response = self
            .graph
            .post_form(
                &format!("{}/media_publish", self.account_id),
                &[("creation_id", container_id.to_string())],
            )
            .await?;
        self.graph.id_field(&response, "id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopcast_domain::usecases::{ContainerPublisher, PollConfig};
    use shopcast_domain::{PublishRequest, Publisher};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> InstagramApi {
        InstagramApi::with_base_url(
            "ig42".to_string(),
            SecretString::new("ig-token".into()),
            server.uri(),
        )
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_create_poll_publish_single_image() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ig42/media"))
            .and(body_string_contains("image_url=https"))
            .and(body_string_contains("caption=Hello"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/c1"))
            .and(query_param("fields", "status_code"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status_code": "FINISHED", "id": "c1"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/ig42/media_publish"))
            .and(body_string_contains("creation_id=c1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "17890"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let publisher = ContainerPublisher::new(Arc::new(api(&server)), fast_poll());
        let post = publisher
            .publish(&PublishRequest {
                caption: "Hello".to_string(),
                caption_plain: "Hello".to_string(),
                image_urls: vec!["https://cdn.example.com/a.jpg".to_string()],
                link: None,
            })
            .await
            .unwrap();

        assert_eq!(post.id, "17890");
    }

    #[tokio::test]
    async fn test_carousel_parent_lists_children() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ig42/media"))
            .and(body_string_contains("is_carousel_item=true"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "child"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/ig42/media"))
            .and(body_string_contains("media_type=CAROUSEL"))
            .and(body_string_contains("children=child%2Cchild"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "parent"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = api(&server)
            .create_container(&ContainerSpec::CarouselItem {
                image_url: "https://cdn.example.com/a.jpg".to_string(),
            })
            .await
            .unwrap();
        api(&server)
            .create_container(&ContainerSpec::CarouselItem {
                image_url: "https://cdn.example.com/b.jpg".to_string(),
            })
            .await
            .unwrap();
        let parent = api(&server)
            .create_container(&ContainerSpec::Carousel {
                children: vec![id.clone(), id],
                caption: "two".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(parent, "parent");
    }

    #[tokio::test]
    async fn test_error_status_maps_to_failed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/c9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status_code": "ERROR"})),
            )
            .mount(&server)
            .await;

        let status = api(&server).container_status("c9").await.unwrap();
        assert!(matches!(status, ContainerStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_text_only_is_rejected_without_request() {
        let server = MockServer::start().await;

        let result = api(&server)
            .create_container(&ContainerSpec::Text {
                caption: "no image".to_string(),
                link: None,
            })
            .await;

        assert!(matches!(result, Err(PublishError::MissingMedia { .. })));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_without_account() {
        let api = InstagramApi::new(String::new(), SecretString::new("token".into()));
        assert!(!api.is_configured());
    }
}
