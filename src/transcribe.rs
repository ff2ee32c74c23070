//! Audio transcription adapter
//!
//! Turns raw audio bytes into candidate text. An empty string is a legal
//! outcome ("no clear speech"); callers decide how to react.

use crate::error::PipelineError;
use crate::Result;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Trait for speech-to-text providers
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe audio; `language_hint` is a BCP-47 code such as "es-MX".
    /// Returns an empty string when no speech was recognized.
    async fn transcribe(&self, audio: &[u8], language_hint: &str) -> Result<String>;
}

/// Google Cloud Speech-to-Text client (REST `speech:recognize`)
pub struct GoogleSpeechClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleSpeechClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: "https://speech.googleapis.com/v1/speech:recognize".to_string(),
        }
    }
}

#[async_trait]
impl SpeechToText for GoogleSpeechClient {
    async fn transcribe(&self, audio: &[u8], language_hint: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(PipelineError::TranscriptionFailure(
                "SPEECH_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = RecognizeRequest {
            config: RecognitionConfig {
                language_code: language_hint.to_string(),
                enable_automatic_punctuation: true,
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(audio),
            },
        };

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!("Speech API request failed: {}", e);
            PipelineError::TranscriptionFailure(format!("Speech API error: {}", e))
        })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Speech API error response: {}", error_text);
            return Err(PipelineError::TranscriptionFailure(format!(
                "Speech API error: {}",
                error_text
            )));
        }

        let recognize_response: RecognizeResponse = response.json().await.map_err(|e| {
            PipelineError::TranscriptionFailure(format!("Speech parse error: {}", e))
        })?;

        // Concatenate the top alternative of each result
        let transcript = recognize_response
            .results
            .iter()
            .filter_map(|r| r.alternatives.first())
            .map(|a| a.transcript.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();

        info!(chars = transcript.len(), "Transcription complete");
        Ok(transcript)
    }
}

/// Mock transcriber for development & testing
pub struct MockTranscriber {
    pub transcript: String,
}

impl MockTranscriber {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
        }
    }
}

#[async_trait]
impl SpeechToText for MockTranscriber {
    async fn transcribe(&self, _audio: &[u8], _language_hint: &str) -> Result<String> {
        Ok(self.transcript.clone())
    }
}

//
// ================= Wire payloads =================
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    language_code: String,
    enable_automatic_punctuation: bool,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
}
