//! Shopify Admin API catalog adapter

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use shopcast_domain::{CatalogError, CatalogItem, CatalogStore, CollectionInfo};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use time::OffsetDateTime;

const API_VERSION: &str = "2024-10";
const PAGE_LIMIT: usize = 250;

/// Catalog backed by a Shopify store; labels are product tags
pub struct ShopifyCatalog {
    client: Client,
    store_url: String,
    access_token: SecretString,
    /// Collection display name -> handle
    aliases: BTreeMap<String, String>,
}

impl ShopifyCatalog {
    pub fn new(store_url: String, access_token: SecretString) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            store_url: store_url.trim_end_matches('/').to_string(),
            access_token,
            aliases: BTreeMap::new(),
        }
    }

    /// Map human-readable collection names to their handles
    pub fn with_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/admin/api/{}/{}", self.store_url, API_VERSION, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("X-Shopify-Access-Token", self.access_token.expose_secret())
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let response = self
            .authorized(self.client.get(self.endpoint(path)))
            .query(query)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let response = check_status(response, path).await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Resolve a configured collection name to a handle
    fn resolve_handle(&self, name: &str) -> String {
        if let Some(handle) = self.aliases.get(name) {
            return handle.clone();
        }
        if let Some((_, handle)) = self
            .aliases
            .iter()
            .find(|(alias, _)| alias.to_lowercase() == name.to_lowercase())
        {
            return handle.clone();
        }
        name.to_lowercase().replace(' ', "-")
    }

    /// Walk a `since_id`-paginated listing until a short page comes back
    async fn paginate<P, T>(
        &self,
        path: &str,
        filter: &[(&str, String)],
        entries: impl Fn(P) -> Vec<T>,
        id_of: impl Fn(&T) -> u64,
    ) -> Result<Vec<T>, CatalogError>
    where
        P: for<'de> Deserialize<'de>,
    {
        let mut all = Vec::new();
        let mut since_id: Option<u64> = None;

        loop {
            let mut query = filter.to_vec();
            query.push(("limit", PAGE_LIMIT.to_string()));
            if let Some(since_id) = since_id {
                query.push(("since_id", since_id.to_string()));
            }

            let page = entries(self.get_json::<P>(path, &query).await?);
            let count = page.len();
            since_id = page.last().map(&id_of);
            all.extend(page);

            if count < PAGE_LIMIT {
                break;
            }
        }

        Ok(all)
    }

    async fn collections(&self) -> Result<Vec<ShopifyCollection>, CatalogError> {
        let custom = self
            .paginate(
                "custom_collections.json",
                &[],
                |page: CustomCollections| page.custom_collections,
                |c: &ShopifyCollection| c.id,
            )
            .await?;
        let smart = self
            .paginate(
                "smart_collections.json",
                &[],
                |page: SmartCollections| page.smart_collections,
                |c: &ShopifyCollection| c.id,
            )
            .await?;

        Ok(custom.into_iter().chain(smart).collect())
    }

    async fn collection_products(
        &self,
        collection_id: u64,
    ) -> Result<Vec<ShopifyProduct>, CatalogError> {
        self.paginate(
            "products.json",
            &[("collection_id", collection_id.to_string())],
            |page: ProductList| page.products,
            |p: &ShopifyProduct| p.id,
        )
        .await
    }

    async fn fetch_product(&self, id: &str) -> Result<ShopifyProduct, CatalogError> {
        let wrapper: ProductWrapper = self
            .get_json(&format!("products/{}.json", id), &[])
            .await?;
        Ok(wrapper.product)
    }

    async fn write_tags(&self, id: &str, tags: &[String]) -> Result<(), CatalogError> {
        let product_id = id
            .parse::<u64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::from(id));
        let payload = serde_json::json!({
            "product": {
                "id": product_id,
                "tags": join_tags(tags),
            }
        });

        let path = format!("products/{}.json", id);
        let response = self
            .authorized(self.client.put(self.endpoint(&path)))
            .json(&payload)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        check_status(response, &path).await?;
        Ok(())
    }
}

async fn check_status(
    response: reqwest::Response,
    path: &str,
) -> Result<reqwest::Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CatalogError::Auth(format!("{}: {}", status, body))
        }
        StatusCode::NOT_FOUND => CatalogError::NotFound(path.to_string()),
        _ => CatalogError::Api(format!("{} returned {}: {}", path, status, body)),
    })
}

/// Split Shopify's comma-separated tag string
pub(crate) fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}

#[async_trait]
impl CatalogStore for ShopifyCatalog {
    async fn list_items(&self, collections: &[String]) -> Result<Vec<CatalogItem>, CatalogError> {
        let known = self.collections().await?;

        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for name in collections {
            let handle = self.resolve_handle(name);
            let Some(collection) = known
                .iter()
                .find(|c| c.handle == handle || c.title.eq_ignore_ascii_case(name))
            else {
                tracing::warn!(
                    collection = %name,
                    handle = %handle,
                    "Collection not found in store"
                );
                continue;
            };

            let products = self.collection_products(collection.id).await?;
            tracing::debug!(
                collection = %name,
                products = products.len(),
                "Fetched collection products"
            );

            for product in products {
                if seen.insert(product.id) {
                    items.push(product.into_item());
                }
            }
        }

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, CatalogError> {
        Ok(self
            .collections()
            .await?
            .into_iter()
            .map(|c| CollectionInfo {
                id: c.id.to_string(),
                title: c.title,
                handle: c.handle,
            })
            .collect())
    }

    async fn get_item(&self, id: &str) -> Result<CatalogItem, CatalogError> {
        Ok(self.fetch_product(id).await?.into_item())
    }

    async fn add_label(&self, id: &str, label: &str) -> Result<(), CatalogError> {
        let product = self.fetch_product(id).await?;
        let mut tags = parse_tags(&product.tags);

        if tags.iter().any(|t| t == label) {
            return Ok(());
        }

        tags.push(label.to_string());
        self.write_tags(id, &tags).await?;
        tracing::debug!(product_id = %id, label = %label, "Added product tag");
        Ok(())
    }

    async fn remove_labels_with_prefix(&self, id: &str, prefix: &str) -> Result<(), CatalogError> {
        let product = self.fetch_product(id).await?;
        let tags = parse_tags(&product.tags);
        let kept: Vec<String> = tags
            .iter()
            .filter(|t| !t.starts_with(prefix))
            .cloned()
            .collect();

        if kept.len() == tags.len() {
            return Ok(());
        }

        self.write_tags(id, &kept).await?;
        tracing::debug!(
            product_id = %id,
            prefix = %prefix,
            removed = tags.len() - kept.len(),
            "Removed product tags"
        );
        Ok(())
    }
}

// Shopify API types

#[derive(Deserialize)]
struct ShopifyCollection {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    handle: String,
}

#[derive(Deserialize)]
struct CustomCollections {
    #[serde(default)]
    custom_collections: Vec<ShopifyCollection>,
}

#[derive(Deserialize)]
struct SmartCollections {
    #[serde(default)]
    smart_collections: Vec<ShopifyCollection>,
}

#[derive(Deserialize)]
struct ProductList {
    #[serde(default)]
    products: Vec<ShopifyProduct>,
}

#[derive(Deserialize)]
struct ProductWrapper {
    product: ShopifyProduct,
}

#[derive(Deserialize)]
struct ShopifyProduct {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    handle: String,
    #[serde(default)]
    body_html: Option<String>,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    images: Vec<ShopifyImage>,
    #[serde(default)]
    variants: Vec<ShopifyVariant>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

#[derive(Deserialize)]
struct ShopifyImage {
    src: Option<String>,
}

#[derive(Deserialize)]
struct ShopifyVariant {
    price: Option<String>,
}

impl ShopifyProduct {
    fn into_item(self) -> CatalogItem {
        CatalogItem {
            id: self.id.to_string(),
            title: self.title,
            handle: self.handle,
            description: self.body_html,
            price: self.variants.into_iter().next().and_then(|v| v.price),
            image_urls: self.images.into_iter().filter_map(|i| i.src).collect(),
            labels: parse_tags(&self.tags),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{
        body_json, header, method, path, query_param, query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "/admin/api/2024-10";

    fn catalog(server: &MockServer) -> ShopifyCatalog {
        ShopifyCatalog::new(server.uri(), SecretString::new("shpat_test".into()))
    }

    fn product(id: u64, created_at: &str, tags: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": format!("Product {}", id),
            "handle": format!("product-{}", id),
            "body_html": "<p>Nice</p>",
            "tags": tags,
            "images": [{"src": format!("https://cdn.example.com/{}.jpg", id)}],
            "variants": [{"price": "1200.00"}],
            "created_at": created_at
        })
    }

    async fn mount_product(server: &MockServer, id: u64, tags: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{}/products/{}.json", BASE, id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "product": product(id, "2024-03-01T10:00:00+09:00", tags)
            })))
            .mount(server)
            .await;
    }

    async fn mount_collections(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("{}/custom_collections.json", BASE)))
            .and(header("X-Shopify-Access-Token", "shpat_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "custom_collections": [{"id": 11, "title": "Yokumoku", "handle": "yokumoku"}]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/smart_collections.json", BASE)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "smart_collections": [{"id": 22, "title": "Human Made", "handle": "human-made-1"}]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_tags_trims_and_drops_empties() {
        assert_eq!(
            parse_tags(" a, b ,,c , "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_tags("").is_empty());
        assert_eq!(join_tags(&parse_tags("x,y")), "x, y");
    }

    #[test]
    fn test_resolve_handle() {
        let mut aliases = BTreeMap::new();
        aliases.insert("Human Made".to_string(), "human-made-1".to_string());
        let catalog = ShopifyCatalog::new("https://shop".to_string(), SecretString::new("t".into()))
            .with_aliases(aliases);

        assert_eq!(catalog.resolve_handle("Human Made"), "human-made-1");
        assert_eq!(catalog.resolve_handle("human made"), "human-made-1");
        assert_eq!(catalog.resolve_handle("Gateau Festa"), "gateau-festa");
    }

    #[tokio::test]
    async fn test_list_items_merges_dedupes_and_sorts() {
        let server = MockServer::start().await;
        mount_collections(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{}/products.json", BASE)))
            .and(query_param("collection_id", "11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "products": [
                    product(1, "2024-01-01T00:00:00Z", ""),
                    product(2, "2024-03-01T00:00:00Z", "souvenir-round-1, gift"),
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/products.json", BASE)))
            .and(query_param("collection_id", "22"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "products": [
                    product(2, "2024-03-01T00:00:00Z", "souvenir-round-1, gift"),
                    product(3, "2024-02-01T00:00:00Z", ""),
                ]
            })))
            .mount(&server)
            .await;

        let items = catalog(&server)
            .list_items(&["yokumoku".to_string(), "Human Made".to_string(), "missing".to_string()])
            .await
            .unwrap();

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
        assert_eq!(items[0].labels, vec!["souvenir-round-1", "gift"]);
        assert_eq!(items[0].price.as_deref(), Some("1200.00"));
        assert_eq!(items[0].image_urls, vec!["https://cdn.example.com/2.jpg"]);
    }

    #[tokio::test]
    async fn test_collections_follow_pagination() {
        let server = MockServer::start().await;

        let first_page: Vec<_> = (1..=250u64)
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "title": format!("C{}", id),
                    "handle": format!("c-{}", id)
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("{}/custom_collections.json", BASE)))
            .and(query_param("limit", "250"))
            .and(query_param_is_missing("since_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "custom_collections": first_page
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/custom_collections.json", BASE)))
            .and(query_param("since_id", "250"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "custom_collections": [
                    {"id": 251, "title": "Gateau Festa", "handle": "gateau-festa"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/smart_collections.json", BASE)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "smart_collections": [{"id": 900, "title": "Human Made", "handle": "human-made-1"}]
            })))
            .mount(&server)
            .await;

        let collections = catalog(&server).list_collections().await.unwrap();

        assert_eq!(collections.len(), 252);
        assert_eq!(collections[250].handle, "gateau-festa");
        assert_eq!(
            collections[251],
            CollectionInfo {
                id: "900".to_string(),
                title: "Human Made".to_string(),
                handle: "human-made-1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_add_label_appends_and_writes() {
        let server = MockServer::start().await;
        mount_product(&server, 5, "gift, sale").await;

        Mock::given(method("PUT"))
            .and(path(format!("{}/products/5.json", BASE)))
            .and(body_json(serde_json::json!({
                "product": {"id": 5, "tags": "gift, sale, souvenir-round-2"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        catalog(&server)
            .add_label("5", "souvenir-round-2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_existing_label_is_noop() {
        let server = MockServer::start().await;
        mount_product(&server, 5, "souvenir-round-2").await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        catalog(&server)
            .add_label("5", "souvenir-round-2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_labels_with_prefix() {
        let server = MockServer::start().await;
        mount_product(&server, 6, "souvenir-round-1, gift, souvenir-round-3").await;

        Mock::given(method("PUT"))
            .and(path(format!("{}/products/6.json", BASE)))
            .and(body_json(serde_json::json!({
                "product": {"id": 6, "tags": "gift"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        catalog(&server)
            .remove_labels_with_prefix("6", "souvenir-round-")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/products/404.json", BASE)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/products/401.json", BASE)))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let catalog = catalog(&server);
        assert!(matches!(
            catalog.get_item("404").await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            catalog.get_item("401").await,
            Err(CatalogError::Auth(_))
        ));
    }
}
