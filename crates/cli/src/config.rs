//! Configuration loading and management

use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shopcast_domain::{Partition, Platform, usecases::KeywordTag};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub partitions: Vec<PartitionConfig>,

    #[serde(default)]
    pub selector: SelectorConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub facebook: FacebookConfig,

    #[serde(default)]
    pub instagram: InstagramConfig,

    #[serde(default)]
    pub threads: ThreadsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_true")]
    pub dry_run: bool,

    #[serde(default = "default_max_posts_per_run")]
    pub max_posts_per_run: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// shopify or fixture
    #[serde(default = "default_catalog_provider")]
    pub provider: String,

    #[serde(default)]
    pub store_url: String,

    #[serde(default = "default_shopify_token_env")]
    pub access_token_env: String,

    /// JSON catalog used by the fixture provider
    #[serde(default = "default_fixture_path")]
    pub fixture_path: PathBuf,

    /// Collection display name -> handle
    #[serde(default)]
    pub collection_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub name: String,
    /// Defaults to `<name>-round-`
    #[serde(default)]
    pub tag_prefix: Option<String>,
    #[serde(default)]
    pub collections: Vec<String>,
}

impl PartitionConfig {
    pub fn to_partition(&self) -> Partition {
        let tag_prefix = self
            .tag_prefix
            .clone()
            .unwrap_or_else(|| format!("{}-round-", self.name));
        Partition::new(self.name.clone(), tag_prefix, self.collections.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Partition served first after startup
    #[serde(default)]
    pub first_partition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    #[serde(default)]
    pub stories: bool,

    /// Replace every platform with a recording stub (offline runs)
    #[serde(default)]
    pub stub: bool,

    #[serde(default = "default_platforms")]
    pub default_platforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Public storefront for product links; defaults to catalog.store_url
    #[serde(default)]
    pub store_url: Option<String>,

    #[serde(default)]
    pub header: Option<String>,

    #[serde(default)]
    pub hashtags: Vec<String>,

    #[serde(default)]
    pub keyword_tags: Vec<KeywordTag>,

    #[serde(default = "default_max_description_chars")]
    pub max_description_chars: usize,

    #[serde(default)]
    pub currency_symbol: String,

    #[serde(default = "default_price_on_request")]
    pub price_on_request: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    #[serde(default)]
    pub page_id: String,

    #[serde(default = "default_facebook_token_env")]
    pub access_token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(default)]
    pub account_id: String,

    /// Instagram shares the Page token by default
    #[serde(default = "default_facebook_token_env")]
    pub access_token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsConfig {
    #[serde(default)]
    pub user_id: String,

    #[serde(default = "default_threads_token_env")]
    pub access_token_env: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_max_posts_per_run() -> usize {
    10
}

fn default_catalog_provider() -> String {
    "shopify".to_string()
}

fn default_shopify_token_env() -> String {
    "SHOPIFY_ACCESS_TOKEN".to_string()
}

fn default_fixture_path() -> PathBuf {
    PathBuf::from("./catalog.json")
}

fn default_poll_interval() -> u64 {
    2
}

fn default_poll_timeout() -> u64 {
    60
}

fn default_platforms() -> Vec<String> {
    Platform::ALL.iter().map(|p| p.as_str().to_string()).collect()
}

fn default_max_description_chars() -> usize {
    300
}

fn default_price_on_request() -> String {
    "Price on request".to_string()
}

fn default_facebook_token_env() -> String {
    "FACEBOOK_PAGE_TOKEN".to_string()
}

fn default_threads_token_env() -> String {
    "THREADS_ACCESS_TOKEN".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dry_run: default_true(),
            max_posts_per_run: default_max_posts_per_run(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            provider: default_catalog_provider(),
            store_url: String::new(),
            access_token_env: default_shopify_token_env(),
            fixture_path: default_fixture_path(),
            collection_aliases: BTreeMap::new(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            stories: false,
            stub: false,
            default_platforms: default_platforms(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            header: None,
            hashtags: vec![],
            keyword_tags: vec![],
            max_description_chars: default_max_description_chars(),
            currency_symbol: String::new(),
            price_on_request: default_price_on_request(),
        }
    }
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            page_id: String::new(),
            access_token_env: default_facebook_token_env(),
        }
    }
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            access_token_env: default_facebook_token_env(),
        }
    }
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            access_token_env: default_threads_token_env(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("SHOPCAST")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn partitions(&self) -> Vec<Partition> {
        self.partitions.iter().map(PartitionConfig::to_partition).collect()
    }

    pub fn default_platforms(&self) -> Result<Vec<Platform>> {
        self.publish
            .default_platforms
            .iter()
            .map(|p| p.parse::<Platform>().map_err(anyhow::Error::from))
            .collect::<Result<Vec<_>>>()
            .context("Invalid publish.default_platforms")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r##"# shopcast configuration

[general]
dry_run = true  # set to false to publish
max_posts_per_run = 10

[catalog]
provider = "shopify"  # shopify, fixture
store_url = "https://your-store.example.com"
access_token_env = "SHOPIFY_ACCESS_TOKEN"
# fixture_path = "./catalog.json"

[catalog.collection_aliases]
# "Human Made" = "human-made-1"

[[partitions]]
name = "souvenir"
tag_prefix = "souvenir-round-"
collections = ["yokumoku", "cocoris"]

[[partitions]]
name = "fashion"
tag_prefix = "fashion-round-"
collections = ["human-made-1", "x-girl"]

[selector]
first_partition = "souvenir"

[publish]
poll_interval_secs = 2
poll_timeout_secs = 60
stories = false
stub = false
default_platforms = ["facebook", "instagram", "threads"]

[content]
# store_url = "https://shop.example.com"
header = "New in store today"
hashtags = ["#japan", "#souvenir"]
max_description_chars = 300
currency_symbol = "¥"
price_on_request = "Price on request"

# [[content.keyword_tags]]
# keyword = "bape"
# tag = "#BAPE"

[facebook]
page_id = ""
access_token_env = "FACEBOOK_PAGE_TOKEN"

[instagram]
account_id = ""
access_token_env = "FACEBOOK_PAGE_TOKEN"

[threads]
user_id = ""
access_token_env = "THREADS_ACCESS_TOKEN"
"##
        .to_string()
    }
}

/// Read a secret from the named environment variable
pub(crate) fn load_secret(env_var: &str, what: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No token env var configured for {}", what);
    }

    let value = std::env::var(env_var)
        .with_context(|| format!("Missing token env var {} for {}", env_var, what))?;

    if value.trim().is_empty() {
        bail!("Token env var {} is empty for {}", env_var, what);
    }

    Ok(SecretString::new(value.into()))
}

/// Like [`load_secret`] but treats a missing variable as "not configured"
pub(crate) fn optional_secret(env_var: &str) -> Option<SecretString> {
    std::env::var(env_var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| SecretString::new(v.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_deserializes() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();

        assert!(config.general.dry_run);
        assert_eq!(config.general.max_posts_per_run, 10);
        assert_eq!(config.partitions.len(), 2);
        assert_eq!(config.selector.first_partition.as_deref(), Some("souvenir"));
        assert_eq!(config.default_platforms().unwrap(), Platform::ALL.to_vec());
        assert_eq!(config.publish.poll_interval_secs, 2);
    }

    #[test]
    fn test_partition_tag_prefix_defaults_to_name() {
        let partition = PartitionConfig {
            name: "fashion".to_string(),
            tag_prefix: None,
            collections: vec!["bape".to_string()],
        }
        .to_partition();

        assert_eq!(partition.round_tag(3), "fashion-round-3");
    }

    #[test]
    fn test_invalid_default_platform() {
        let mut config = AppConfig::default();
        config.publish.default_platforms = vec!["fb".to_string(), "tiktok".to_string()];
        assert!(config.default_platforms().is_err());
    }
}
