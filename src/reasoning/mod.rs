//! Reasoning capability trait and implementations
//!
//! All structured inference (classification, extraction, query analysis,
//! chat replies) goes through this seam so providers can be swapped and
//! tests can run without a live model.

use crate::models::{ChatMode, Domain, ExtractionCandidate, QueryAnalysis, QueryFilters,
    QueryIntent, Resolution, TransactionType};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub mod gemini;
pub use gemini::GeminiReasoning;

/// Trait for the remote structured-inference engine.
///
/// Every method is a single request/response call; malformed or non-JSON
/// responses surface as a recoverable `ReasoningError`. Retry policy is the
/// caller's business, not this trait's.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Coarse domain of an utterance (cascade stage 1)
    async fn classify_domain(&self, text: &str) -> Result<Domain>;

    /// Fine-grained resolution for financial text (cascade stage 2)
    async fn classify_resolution(&self, text: &str) -> Result<Resolution>;

    /// Structured transaction candidates; always list-shaped, one utterance
    /// may describe several movements
    async fn extract_candidates(&self, text: &str) -> Result<Vec<ExtractionCandidate>>;

    /// Query-intent analysis for the read path
    async fn analyze_query_intent(&self, text: &str, today: NaiveDate) -> Result<QueryAnalysis>;

    /// Short conversational reply for non-financial utterances
    async fn generate_chat_reply(&self, text: &str, mode: ChatMode) -> Result<String>;

    /// Best-effort direct audio-to-candidates extraction, used once as a
    /// fallback when transcription yields nothing
    async fn extract_from_audio(
        &self,
        audio: &[u8],
        language: &str,
    ) -> Result<Vec<ExtractionCandidate>>;
}

/// Mock reasoning client for development & testing
/// Keeps the pipeline functional without LLM dependency
pub struct MockReasoning;

impl MockReasoning {
    fn sniff_amount(text: &str) -> f64 {
        text.split_whitespace()
            .filter_map(|token| token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.').parse::<f64>().ok())
            .next()
            .unwrap_or(0.0)
    }

    fn sniff_concept(text: &str) -> String {
        let lowered = text.to_lowercase();
        match lowered.split_once(" en ") {
            Some((_, rest)) => rest.trim().trim_end_matches('.').to_string(),
            None => lowered.trim().to_string(),
        }
    }

    fn sniff_kind(text: &str) -> TransactionType {
        let lowered = text.to_lowercase();
        if lowered.contains("ingreso") || lowered.contains("pagaron") || lowered.contains("sueldo")
        {
            TransactionType::Income
        } else if lowered.contains("deuda") || lowered.contains("debo") {
            TransactionType::Debt
        } else {
            TransactionType::Expense
        }
    }
}

#[async_trait]
impl ReasoningClient for MockReasoning {
    async fn classify_domain(&self, text: &str) -> Result<Domain> {
        let lowered = text.to_lowercase();
        if lowered.contains("hola") || lowered.contains("gracias") || lowered.contains("hello") {
            Ok(Domain::Social)
        } else if lowered.contains("qué puedes") || lowered.contains("ayuda") {
            Ok(Domain::Meta)
        } else {
            Ok(Domain::Financial)
        }
    }

    async fn classify_resolution(&self, text: &str) -> Result<Resolution> {
        let lowered = text.to_lowercase();
        if lowered.contains("cuánto") || lowered.contains("cuanto") || lowered.contains("how much")
        {
            Ok(Resolution::Read)
        } else {
            Ok(Resolution::Write)
        }
    }

    async fn extract_candidates(&self, text: &str) -> Result<Vec<ExtractionCandidate>> {
        Ok(vec![ExtractionCandidate {
            kind: Self::sniff_kind(text),
            amount: Self::sniff_amount(text),
            concept: Self::sniff_concept(text),
            merchant: None,
            category: None,
            date: None,
        }])
    }

    async fn analyze_query_intent(&self, _text: &str, _today: NaiveDate) -> Result<QueryAnalysis> {
        Ok(QueryAnalysis {
            intent: QueryIntent::Query,
            filters: QueryFilters::default(),
        })
    }

    async fn generate_chat_reply(&self, _text: &str, mode: ChatMode) -> Result<String> {
        Ok(match mode {
            ChatMode::Capability => {
                "Puedo registrar tus gastos, ingresos y deudas por voz, y responder \
                 preguntas sobre lo que llevas gastado."
                    .to_string()
            }
            ChatMode::SmallTalk => "¡Hola! Cuéntame algún gasto o ingreso y lo anoto.".to_string(),
        })
    }

    async fn extract_from_audio(
        &self,
        _audio: &[u8],
        _language: &str,
    ) -> Result<Vec<ExtractionCandidate>> {
        Ok(vec![])
    }
}
