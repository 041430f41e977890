//! Rendering use case - turns a catalog item into publishable captions

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    model::{CatalogItem, Partition, PublishRequest},
    ports::ContentGenerator,
};

/// Hashtag added when a keyword appears in an item's handle or title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTag {
    pub keyword: String,
    pub tag: String,
}

/// Configuration for the caption renderer
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Public storefront base URL, used for product links
    pub store_url: String,
    /// Lines placed above the title
    pub header: Option<String>,
    /// Discovery hashtags appended to the tagged variant
    pub hashtags: Vec<String>,
    /// First matching keyword contributes one extra hashtag
    pub keyword_tags: Vec<KeywordTag>,
    /// Descriptions longer than this are cut and suffixed with "..."
    pub max_description_chars: usize,
    /// Prefix for a parsed price (e.g. "¥")
    pub currency_symbol: String,
    /// Shown when the price is missing or not positive
    pub price_on_request: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            header: None,
            hashtags: vec![],
            keyword_tags: vec![],
            max_description_chars: 300,
            currency_symbol: String::new(),
            price_on_request: "Price on request".to_string(),
        }
    }
}

/// Deterministic caption renderer
pub struct CaptionRenderer {
    config: RenderConfig,
    html_tag: Regex,
    blank_lines: Regex,
}

impl CaptionRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            html_tag: Regex::new(r"<[^<]+?>").expect("Valid regex"),
            blank_lines: Regex::new(r"\n{3,}").expect("Valid regex"),
        }
    }

    pub fn product_url(&self, item: &CatalogItem) -> String {
        format!(
            "{}/products/{}",
            self.config.store_url.trim_end_matches('/'),
            item.handle
        )
    }

    /// Strip markup, squeeze blank runs and cut to the configured length
    fn clean_description(&self, raw: &str) -> String {
        let text = self.html_tag.replace_all(raw, "");
        let text = self.blank_lines.replace_all(&text, "\n\n");
        let text = text.trim();

        let max = self.config.max_description_chars;
        if text.chars().count() > max {
            let cut: String = text.chars().take(max).collect();
            format!("{}...", cut)
        } else {
            text.to_string()
        }
    }

    fn price_line(&self, price: Option<&str>) -> String {
        let amount = price
            .and_then(|p| p.trim().parse::<f64>().ok())
            .filter(|p| *p > 0.0);

        match amount {
            Some(amount) => format!(
                "💰 {}{}",
                self.config.currency_symbol,
                group_thousands(amount.trunc() as u64)
            ),
            None => format!("💰 {}", self.config.price_on_request),
        }
    }

    fn hashtag_line(&self, item: &CatalogItem) -> String {
        let handle = item.handle.to_lowercase();
        let title = item.title.to_lowercase();

        let keyword_tag = self.config.keyword_tags.iter().find(|rule| {
            let keyword = rule.keyword.to_lowercase();
            handle.contains(&keyword) || title.contains(&keyword)
        });

        self.config
            .hashtags
            .iter()
            .map(String::as_str)
            .chain(keyword_tag.map(|rule| rule.tag.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render both caption variants for an item
    pub fn render(&self, item: &CatalogItem) -> PublishRequest {
        let mut blocks = vec![];
        if let Some(header) = self.config.header.as_deref().filter(|h| !h.trim().is_empty()) {
            blocks.push(header.trim_end().to_string());
        }
        blocks.push(format!("✨ {}", item.title));

        let description = item
            .description
            .as_deref()
            .map(|d| self.clean_description(d))
            .unwrap_or_default();
        if !description.is_empty() {
            blocks.push(description);
        }

        let link = self.product_url(item);
        blocks.push(format!(
            "{}\n🛒 {}",
            self.price_line(item.price.as_deref()),
            link
        ));

        let caption_plain = blocks.join("\n\n");
        let hashtags = self.hashtag_line(item);
        let caption = if hashtags.is_empty() {
            caption_plain.clone()
        } else {
            format!("{}\n\n{}", caption_plain, hashtags)
        };

        PublishRequest {
            caption,
            caption_plain,
            image_urls: item.image_urls.clone(),
            link: Some(link),
        }
    }
}

impl ContentGenerator for CaptionRenderer {
    fn generate(&self, item: &CatalogItem, partition: &Partition) -> PublishRequest {
        tracing::debug!(
            item_id = %item.id,
            partition = %partition.name,
            images = item.image_urls.len(),
            "Rendering captions"
        );
        self.render(item)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
