//! Gemini-backed reasoning client
//!
//! One prompt per pipeline task, all through a long-lived reqwest::Client
//! for connection pooling. Responses are JSON-shaped; markdown fences are
//! stripped before parsing and parse failures surface as recoverable
//! reasoning errors.

use crate::category;
use crate::error::PipelineError;
use crate::models::{ChatMode, Domain, ExtractionCandidate, QueryAnalysis, Resolution};
use crate::reasoning::ReasoningClient;
use crate::Result;
use async_trait::async_trait;
use base64::Engine as _;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiReasoning {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiReasoning {
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
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
        }
    }

    /// Send one request and return the raw text of the first candidate
    async fn generate(&self, system_prompt: &str, parts: Vec<Part>) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(PipelineError::ReasoningError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part::text(system_prompt)],
            },
        };

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!("Gemini API request failed: {}", e);
            PipelineError::ReasoningError(format!("Gemini API error: {}", e))
        })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(PipelineError::ReasoningError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            PipelineError::ReasoningError(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.clone())
            .ok_or_else(|| {
                PipelineError::ReasoningError("Empty response from Gemini".to_string())
            })?;

        Ok(answer)
    }

    async fn generate_text(&self, system_prompt: &str, text: &str) -> Result<String> {
        self.generate(system_prompt, vec![Part::text(text)]).await
    }

    /// Parse a JSON payload out of a model reply, tolerating markdown fences
    fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
        let cleaned = strip_code_fences(raw);
        serde_json::from_str(cleaned).map_err(|e| {
            PipelineError::ReasoningError(format!(
                "Malformed reasoning payload: {} | raw={}",
                e, raw
            ))
        })
    }

    fn taxonomy_labels() -> String {
        category::ESSENTIAL
            .iter()
            .chain(category::DISCRETIONARY)
            .chain(category::FINANCIAL_MOVEMENT)
            .chain(std::iter::once(&category::DEFAULT_CATEGORY))
            .map(|label| format!("\"{}\"", label))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn extraction_prompt(today: NaiveDate) -> String {
        format!(
            r#"You are the extraction stage of a voice expense tracker.
Extract EVERY financial movement mentioned in the user's utterance.

Return ONLY a JSON array (even for a single movement), no markdown, where
each element has these keys:
- "type": "EXPENSE" | "INCOME" | "DEBT"
- "amount": number (0 when the user gave no amount)
- "concept": string, short description of what the movement was
- "merchant": string or null. null unless the user explicitly NAMED a
  business. Never copy the concept into merchant.
- "category": one of [{}]
- "date": "YYYY-MM-DD" or null. Assume today is {} when the user says
  "hoy"/"today"; null when no date was said.
"#,
            Self::taxonomy_labels(),
            today.format("%Y-%m-%d"),
        )
    }
}

/// Remove a surrounding ```json ... ``` fence, if any
fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

//
// ================= Wire payloads per task =================
//

#[derive(Debug, Deserialize)]
struct DomainReply {
    domain: Domain,
}

#[derive(Debug, Deserialize)]
struct ResolutionReply {
    resolution: Resolution,
}

#[async_trait]
impl ReasoningClient for GeminiReasoning {
    async fn classify_domain(&self, text: &str) -> Result<Domain> {
        let system = r#"Classify the user's utterance into exactly one domain.
- "META": questions about the assistant itself (what it can do, how it works)
- "SOCIAL": greetings, thanks, small talk with no financial content
- "FINANCIAL": anything about money the user spent, received, owes or asks about

Return ONLY JSON: {"domain": "META" | "SOCIAL" | "FINANCIAL"}"#;

        let raw = self.generate_text(system, text).await?;
        let reply: DomainReply = Self::parse_json(&raw)?;

        info!(domain = ?reply.domain, "Domain classified");
        Ok(reply.domain)
    }

    async fn classify_resolution(&self, text: &str) -> Result<Resolution> {
        let system = r#"The utterance is about the user's finances. Decide what they want:
- "READ": asking about movements already recorded (totals, how much, when)
- "WRITE": describing a new expense, income or debt to record
- "AMBIGUOUS": financial words but not enough to record or answer anything

Return ONLY JSON: {"resolution": "READ" | "WRITE" | "AMBIGUOUS"}"#;

        let raw = self.generate_text(system, text).await?;
        let reply: ResolutionReply = Self::parse_json(&raw)?;

        info!(resolution = ?reply.resolution, "Resolution classified");
        Ok(reply.resolution)
    }

    async fn extract_candidates(&self, text: &str) -> Result<Vec<ExtractionCandidate>> {
        let today = chrono::Utc::now().date_naive();
        let raw = self.generate_text(&Self::extraction_prompt(today), text).await?;
        Self::parse_json(&raw)
    }

    async fn analyze_query_intent(&self, text: &str, today: NaiveDate) -> Result<QueryAnalysis> {
        let system = format!(
            r#"The user asks about their recorded finances. Today is {}.

Return ONLY JSON:
{{
  "intent": "QUERY" | "CHAT",
  "filters": {{
    "start_date": "YYYY-MM-DD" or null,
    "end_date": "YYYY-MM-DD" or null,
    "category": one of [{}] or null,
    "type": "EXPENSE" | "INCOME" | "DEBT" or null
  }}
}}

"QUERY" when the question can be answered by summing recorded movements;
"CHAT" for general financial talk with nothing to look up."#,
            today.format("%Y-%m-%d"),
            Self::taxonomy_labels(),
        );

        let raw = self.generate_text(&system, text).await?;
        Self::parse_json(&raw)
    }

    async fn generate_chat_reply(&self, text: &str, mode: ChatMode) -> Result<String> {
        let system = match mode {
            ChatMode::Capability => {
                "You are a voice finance assistant. Briefly explain, in the user's \
                 language, that you record expenses, income and debts by voice and \
                 answer questions about them. One or two sentences."
            }
            ChatMode::SmallTalk => {
                "You are a friendly voice finance assistant. Reply to the small talk \
                 in the user's language, in one short sentence, and invite them to \
                 tell you a movement to record."
            }
        };

        let reply = self.generate_text(system, text).await?;
        Ok(reply.trim().to_string())
    }

    async fn extract_from_audio(
        &self,
        audio: &[u8],
        language: &str,
    ) -> Result<Vec<ExtractionCandidate>> {
        let today = chrono::Utc::now().date_naive();
        let system = Self::extraction_prompt(today);

        let parts = vec![
            Part::inline_audio(audio),
            Part::text(&format!(
                "The audio is in {}. Transcribe it mentally and extract the movements.",
                language
            )),
        ];

        let raw = self.generate(&system, parts).await?;
        Self::parse_json(&raw)
    }
}

//
// ================= Request / response DTOs =================
//

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline_audio(audio: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "audio/ogg".to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(audio),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
