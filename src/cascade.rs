//! Two-stage intent cascade
//!
//! Stage 1 ("macro") asks the reasoning service for a coarse domain; stage 2
//! ("micro") resolves financial text into read/ambiguous/write. Both stages
//! absorb a single collaborator failure with a fail-open default — the
//! conversation must not stall on a classification hiccup. A local rule
//! layered after the micro call forces AMBIGUOUS for bare generic nouns,
//! whatever the model said.

use crate::models::{CascadeResult, Domain, Resolution};
use crate::reasoning::ReasoningClient;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything shorter than this (after trimming) is noise, not an utterance
const MIN_UTTERANCE_CHARS: usize = 2;

/// Generic financial nouns that, alone, carry no recordable content.
/// Static list — zero allocation.
const GENERIC_FINANCIAL_NOUNS: &[&str] = &[
    "gasto", "gastos", "ingreso", "ingresos", "deuda", "deudas", "compra", "pago", "dinero",
    "expense", "income", "debt", "purchase", "payment", "money",
];

/// Two-stage classifier over free text
pub struct IntentCascadeClassifier {
    reasoning: Arc<dyn ReasoningClient>,
}

impl IntentCascadeClassifier {
    pub fn new(reasoning: Arc<dyn ReasoningClient>) -> Self {
        Self { reasoning }
    }

    /// Classify one utterance. Never fails: collaborator errors collapse
    /// into the documented defaults (FINANCIAL, then WRITE).
    pub async fn classify(&self, text: &str) -> CascadeResult {
        let trimmed = text.trim();

        if trimmed.chars().count() < MIN_UTTERANCE_CHARS {
            debug!("Utterance below minimum length, short-circuiting to noise");
            return CascadeResult::noise();
        }

        // === Stage 1: macro domain ===
        let domain = match self.reasoning.classify_domain(trimmed).await {
            Ok(domain) => domain,
            Err(e) => {
                warn!("Domain classification failed, defaulting to FINANCIAL: {}", e);
                Domain::Financial
            }
        };

        if domain != Domain::Financial {
            return CascadeResult::conversational(domain);
        }

        // === Stage 2: micro resolution ===
        let resolution = match self.reasoning.classify_resolution(trimmed).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Resolution classification failed, defaulting to WRITE: {}", e);
                Resolution::Write
            }
        };

        // Local hard rule, applied after the call: a bare generic noun can
        // never be a WRITE, whatever the model answered.
        let resolution = if is_bare_generic_noun(trimmed) {
            debug!("Bare generic financial noun, forcing AMBIGUOUS");
            Resolution::Ambiguous
        } else {
            resolution
        };

        CascadeResult::financial(resolution)
    }
}

/// True when the utterance is exactly one blacklisted noun
fn is_bare_generic_noun(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .to_lowercase();
    GENERIC_FINANCIAL_NOUNS.contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMode, ExtractionCandidate, QueryAnalysis};
    use crate::error::PipelineError;
    use crate::Result;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted reasoning stub; `None` means "collaborator fails"
    struct StubReasoning {
        domain: Option<Domain>,
        resolution: Option<Resolution>,
        calls: AtomicUsize,
    }

    impl StubReasoning {
        fn new(domain: Option<Domain>, resolution: Option<Resolution>) -> Self {
            Self {
                domain,
                resolution,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReasoningClient for StubReasoning {
        async fn classify_domain(&self, _text: &str) -> Result<Domain> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.domain
                .ok_or_else(|| PipelineError::ReasoningError("stub failure".into()))
        }

        async fn classify_resolution(&self, _text: &str) -> Result<Resolution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.resolution
                .ok_or_else(|| PipelineError::ReasoningError("stub failure".into()))
        }

        async fn extract_candidates(&self, _text: &str) -> Result<Vec<ExtractionCandidate>> {
            unreachable!("cascade never extracts")
        }

        async fn analyze_query_intent(
            &self,
            _text: &str,
            _today: NaiveDate,
        ) -> Result<QueryAnalysis> {
            unreachable!("cascade never analyzes queries")
        }

        async fn generate_chat_reply(&self, _text: &str, _mode: ChatMode) -> Result<String> {
            unreachable!("cascade never chats")
        }

        async fn extract_from_audio(
            &self,
            _audio: &[u8],
            _language: &str,
        ) -> Result<Vec<ExtractionCandidate>> {
            unreachable!("cascade never touches audio")
        }
    }

    fn classifier(stub: StubReasoning) -> (IntentCascadeClassifier, Arc<StubReasoning>) {
        let stub = Arc::new(stub);
        (IntentCascadeClassifier::new(stub.clone()), stub)
    }

    #[tokio::test]
    async fn test_short_input_short_circuits_without_collaborator() {
        let (cascade, stub) = classifier(StubReasoning::new(
            Some(Domain::Social),
            Some(Resolution::Write),
        ));

        for input in ["", " ", "a", "  .  "] {
            let result = cascade.classify(input).await;
            assert_eq!(result.resolution, Resolution::Noise);
        }

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bare_generic_noun_forces_ambiguous() {
        // Collaborator insists on WRITE; the local rule must win
        let (cascade, _) = classifier(StubReasoning::new(
            Some(Domain::Financial),
            Some(Resolution::Write),
        ));

        for noun in ["gasto", "expense", "Ingreso", "deuda.", "GASTOS"] {
            let result = cascade.classify(noun).await;
            assert_eq!(
                result.resolution,
                Resolution::Ambiguous,
                "noun {:?} must resolve AMBIGUOUS",
                noun
            );
        }
    }

    #[tokio::test]
    async fn test_concrete_write_passes_through() {
        let (cascade, _) = classifier(StubReasoning::new(
            Some(Domain::Financial),
            Some(Resolution::Write),
        ));

        let result = cascade.classify("gasté 120 pesos en la cena").await;
        assert_eq!(result.domain, Domain::Financial);
        assert_eq!(result.resolution, Resolution::Write);
    }

    #[tokio::test]
    async fn test_macro_failure_fails_open_to_financial() {
        let (cascade, stub) =
            classifier(StubReasoning::new(None, Some(Resolution::Read)));

        let result = cascade.classify("cuánto llevo este mes").await;
        assert_eq!(result.domain, Domain::Financial);
        assert_eq!(result.resolution, Resolution::Read);
        // both stages consulted exactly once — no retries
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_micro_failure_fails_open_to_write() {
        let (cascade, _) = classifier(StubReasoning::new(Some(Domain::Financial), None));

        let result = cascade.classify("compré boletos de avión").await;
        assert_eq!(result.resolution, Resolution::Write);
    }

    #[tokio::test]
    async fn test_non_financial_domains_skip_micro_stage() {
        let (cascade, stub) = classifier(StubReasoning::new(
            Some(Domain::Social),
            Some(Resolution::Write),
        ));

        let result = cascade.classify("hola, buenos días").await;
        assert_eq!(result.domain, Domain::Social);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }
}
