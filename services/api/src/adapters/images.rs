//! services/api/src/adapters/images.rs
//!
//! This module contains the adapter for the Unsplash stock-photo search.
//! It implements the `ImageSearchService` port from the `core` crate.

use async_trait::async_trait;
use course_workflow_core::ports::{ImageSearchService, Photo, PortError, PortResult};
use reqwest::{header, Client as HttpClient};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::UnsplashConfig;

/// An adapter that finds slide illustrations on Unsplash.
#[derive(Clone)]
pub struct UnsplashImageAdapter {
    http: HttpClient,
    config: UnsplashConfig,
}

impl UnsplashImageAdapter {
    pub fn new(config: UnsplashConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        info!("Unsplash client initialized: baseURL={}", config.base_url);
        Ok(Self { http, config })
    }
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    alt_description: Option<String>,
    urls: PhotoUrls,
}

#[derive(Deserialize)]
struct PhotoUrls {
    regular: String,
}

impl UnsplashPhoto {
    /// Regular size, with alt text falling back to the description.
    fn into_photo(self) -> Photo {
        let alt = self
            .alt_description
            .filter(|a| !a.trim().is_empty())
            .or(self.description.filter(|d| !d.trim().is_empty()))
            .unwrap_or_else(|| "Stock photo".to_string());
        Photo {
            url: self.urls.regular,
            alt,
        }
    }
}

#[async_trait]
impl ImageSearchService for UnsplashImageAdapter {
    async fn find_photo(&self, keywords: &str) -> PortResult<Option<Photo>> {
        let response = self
            .http
            .get(format!("{}/search/photos", self.config.base_url.trim_end_matches('/')))
            .query(&[("query", keywords), ("per_page", "1"), ("orientation", "landscape")])
            .header(header::AUTHORIZATION, format!("Client-ID {}", self.config.access_key))
            .header("Accept-Version", "v1")
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("unsplash request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Unsplash API error ({}): {}", status, body);
            return Err(PortError::Unexpected(format!(
                "unsplash returned status {}: {}",
                status, body
            )));
        }

        let result: SearchResult = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("unsplash reply: {}", e)))?;
        Ok(result.results.into_iter().next().map(UnsplashPhoto::into_photo))
    }

    fn is_available(&self) -> bool {
        !self.config.access_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_text_falls_back_to_description_then_default() {
        let parse = |json: &str| -> Photo {
            serde_json::from_str::<UnsplashPhoto>(json).unwrap().into_photo()
        };
        let with_alt = parse(r#"{"alt_description": "a padlock", "description": "x", "urls": {"regular": "u"}}"#);
        assert_eq!(with_alt.alt, "a padlock");
        let with_description = parse(r#"{"alt_description": null, "description": "server room", "urls": {"regular": "u"}}"#);
        assert_eq!(with_description.alt, "server room");
        let bare = parse(r#"{"urls": {"regular": "https://images.example/1"}}"#);
        assert_eq!(bare.alt, "Stock photo");
        assert_eq!(bare.url, "https://images.example/1");
    }

    #[test]
    fn empty_search_yields_no_photo() {
        let result: SearchResult = serde_json::from_str(r#"{"total": 0, "results": []}"#).unwrap();
        assert!(result.results.is_empty());
    }
}
