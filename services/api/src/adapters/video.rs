//! services/api/src/adapters/video.rs
//!
//! This module contains the adapter for the Synthesia avatar-video API.
//! It implements the `VideoGenerationService` port from the `core` crate.

use async_trait::async_trait;
use course_workflow_core::domain::VideoStatus;
use course_workflow_core::ports::{PortError, PortResult, VideoGenerationService, VideoJob};
use reqwest::{header, Client as HttpClient, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::SynthesiaConfig;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that renders lesson scripts as avatar videos on Synthesia.
#[derive(Clone)]
pub struct SynthesiaVideoAdapter {
    http: HttpClient,
    config: SynthesiaConfig,
}

impl SynthesiaVideoAdapter {
    /// Creates a new `SynthesiaVideoAdapter`.
    pub fn new(config: SynthesiaConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        info!("Synthesia client initialized: baseURL={}", config.base_url);
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVideoRequest<'a> {
    test: bool,
    title: &'a str,
    visibility: &'static str,
    aspect_ratio: &'static str,
    input: Vec<VideoInput<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_id: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInput<'a> {
    avatar: &'a str,
    avatar_settings: AvatarSettings,
    background: &'static str,
    script_text: &'a str,
}

#[derive(Serialize)]
struct AvatarSettings {
    style: &'static str,
}

#[derive(Deserialize)]
struct CreateVideoResponse {
    id: String,
}

#[derive(Deserialize)]
struct VideoStatusResponse {
    status: String,
    #[serde(default)]
    download: Option<String>,
}

async fn check(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Synthesia API error ({}): {}", status, body);
    Err(PortError::Unexpected(format!(
        "synthesia returned status {}: {}",
        status, body
    )))
}

fn transport(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Unavailable(format!("synthesia request timed out: {}", e))
    } else {
        PortError::Unexpected(format!("synthesia request failed: {}", e))
    }
}

//=========================================================================================
// `VideoGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VideoGenerationService for SynthesiaVideoAdapter {
    async fn create_video(&self, script: &str, title: &str) -> PortResult<String> {
        let body = CreateVideoRequest {
            test: false,
            title,
            visibility: "private",
            aspect_ratio: "16:9",
            input: vec![VideoInput {
                avatar: &self.config.avatar_id,
                avatar_settings: AvatarSettings {
                    style: "rectangular",
                },
                background: "green_screen",
                script_text: script,
            }],
            callback_id: self.config.webhook_url.as_deref(),
        };

        let response = self
            .http
            .post(self.url("/videos"))
            .header(header::AUTHORIZATION, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let created: CreateVideoResponse = check(response).await?.json().await.map_err(transport)?;
        info!(video_id = %created.id, "Synthesia video requested for '{}'.", title);
        Ok(created.id)
    }

    async fn video_status(&self, video_id: &str) -> PortResult<VideoJob> {
        let response = self
            .http
            .get(self.url(&format!("/videos/{}", video_id)))
            .header(header::AUTHORIZATION, &self.config.api_key)
            .send()
            .await
            .map_err(transport)?;
        let body: VideoStatusResponse = check(response).await?.json().await.map_err(transport)?;

        let status = body.status.parse::<VideoStatus>().map_err(PortError::Unexpected)?;
        Ok(VideoJob {
            status,
            download_url: body.download.filter(|url| !url.is_empty()),
        })
    }
}
