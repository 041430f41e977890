//! Meta Graph API adapters (Facebook Pages, Instagram, Threads)

mod facebook;
mod instagram;
mod threads;

pub use facebook::FacebookPublisher;
pub use instagram::InstagramApi;
pub use threads::ThreadsApi;

use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use shopcast_domain::{Platform, PublishError};
use std::time::Duration;

pub const FACEBOOK_GRAPH_URL: &str = "https://graph.facebook.com/v19.0";
pub const THREADS_GRAPH_URL: &str = "https://graph.threads.net/v1.0";

/// Form-encoded Graph API client bound to one platform and access token
#[derive(Clone)]
pub(crate) struct GraphClient {
    client: Client,
    base_url: String,
    access_token: SecretString,
    platform: Platform,
}

impl GraphClient {
    pub(crate) fn new(platform: Platform, base_url: String, access_token: SecretString) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            platform,
        }
    }

    pub(crate) fn has_token(&self) -> bool {
        !self.access_token.expose_secret().trim().is_empty()
    }

    /// POST `/{path}` with form fields plus the access token
    pub(crate) async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, String)],
    ) -> Result<Value, PublishError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut form: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        form.push(("access_token", self.access_token.expose_secret()));

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport(None, e.to_string()))?;

        self.read_json(response).await
    }

    /// GET `/{path}?fields=...`
    pub(crate) async fn get_fields(&self, path: &str, fields: &str) -> Result<Value, PublishError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", fields),
                ("access_token", self.access_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| self.transport(None, e.to_string()))?;

        self.read_json(response).await
    }

    async fn read_json(&self, response: Response) -> Result<Value, PublishError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.transport(Some(status.as_u16()), error_detail(&body)));
        }

        response.json().await.map_err(|e| PublishError::InvalidResponse {
            platform: self.platform,
            detail: e.to_string(),
        })
    }

    fn transport(&self, status: Option<u16>, detail: String) -> PublishError {
        PublishError::Transport {
            platform: self.platform,
            status,
            detail,
        }
    }

    /// Read a string or numeric identifier field from a response
    pub(crate) fn id_field(&self, value: &Value, key: &str) -> Result<String, PublishError> {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(PublishError::InvalidResponse {
                platform: self.platform,
                detail: format!("missing '{}' in {}", key, value),
            }),
        }
    }
}

/// Graph errors arrive as `{"error": {"message": ...}}`; fall back to the raw body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Container status strings shared by Instagram and Threads
pub(crate) fn parse_container_status(raw: Option<&str>) -> shopcast_domain::ContainerStatus {
    use shopcast_domain::ContainerStatus;

    match raw {
        Some("FINISHED") | Some("PUBLISHED") => ContainerStatus::Finished,
        Some(status @ ("ERROR" | "EXPIRED")) => ContainerStatus::Failed {
            detail: status.to_string(),
        },
        _ => ContainerStatus::InProgress,
    }
}
