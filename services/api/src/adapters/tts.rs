//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for OpenAI's Text-to-Speech (TTS) service.
//! It implements the `SpeechSynthesisService` port from the `core` crate.
//!
//! Each narration is written as an mp3 file under the audio directory and served
//! back by the web layer from `/api/v1/audio/<file>`.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use course_workflow_core::ports::{PortError, PortResult, SpeechSynthesisService};
use std::path::PathBuf;
use uuid::Uuid;

/// URL prefix the audio directory is mounted under.
pub const AUDIO_URL_PREFIX: &str = "/api/v1/audio";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechSynthesisService` port using the OpenAI TTS API.
#[derive(Clone)]
pub struct OpenAiSpeechAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    /// When set, used for every language.
    voice: Option<Voice>,
    output_dir: PathBuf,
}

impl OpenAiSpeechAdapter {
    /// Creates a new `OpenAiSpeechAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        model: SpeechModel,
        voice: Option<Voice>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            client,
            model,
            voice,
            output_dir,
        }
    }

    fn voice_for(&self, language: &str) -> Voice {
        match &self.voice {
            Some(voice) => voice.clone(),
            None => voice_for_language(language),
        }
    }
}

/// Parses a configured model name.
pub fn speech_model(name: &str) -> SpeechModel {
    match name.to_lowercase().as_str() {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

/// Parses a configured voice name.
pub fn voice_by_name(name: &str) -> Option<Voice> {
    match name.to_lowercase().as_str() {
        "alloy" => Some(Voice::Alloy),
        "echo" => Some(Voice::Echo),
        "fable" => Some(Voice::Fable),
        "onyx" => Some(Voice::Onyx),
        "nova" => Some(Voice::Nova),
        "shimmer" => Some(Voice::Shimmer),
        _ => None,
    }
}

/// Picks a voice from the base language code ("de" from "de-DE").
fn voice_for_language(language: &str) -> Voice {
    let code = language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match code.as_str() {
        "de" => Voice::Onyx,
        "fr" => Voice::Shimmer,
        "es" => Voice::Nova,
        "it" => Voice::Fable,
        "pt" => Voice::Echo,
        _ => Voice::Alloy,
    }
}

//=========================================================================================
// `SpeechSynthesisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechSynthesisService for OpenAiSpeechAdapter {
    /// Synthesizes `text` and returns the URL path of the stored mp3.
    async fn synthesize(&self, text: &str, language: &str) -> PortResult<String> {
        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.voice_for(language),
            ..Default::default()
        };

        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let file_name = format!("{}.mp3", Uuid::new_v4());
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| PortError::Unexpected(format!("audio directory: {}", e)))?;
        tokio::fs::write(self.output_dir.join(&file_name), &response.bytes)
            .await
            .map_err(|e| PortError::Unexpected(format!("writing audio file: {}", e)))?;

        Ok(format!("{}/{}", AUDIO_URL_PREFIX, file_name))
    }
}
