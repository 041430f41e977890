//! Story image sources

use async_trait::async_trait;
use shopcast_domain::{StoryImageError, StoryImageSource};

/// Uses the post image unchanged as the story image
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginalImageStory;

#[async_trait]
impl StoryImageSource for OriginalImageStory {
    async fn prepare(&self, image_url: &str) -> Result<String, StoryImageError> {
        if image_url.trim().is_empty() {
            return Err(StoryImageError::Fetch("empty image URL".to_string()));
        }
        Ok(image_url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_original_url() {
        let source = OriginalImageStory;
        assert_eq!(
            source.prepare("https://cdn.example.com/a.jpg").await.unwrap(),
            "https://cdn.example.com/a.jpg"
        );
        assert!(source.prepare(" ").await.is_err());
    }
}
