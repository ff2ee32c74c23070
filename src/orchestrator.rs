//! Voice orchestrator - sequences the whole utterance pipeline
//!
//! TRANSCRIBE → CASCADE → (EXTRACT → VALIDATE → RECORD) | QUERY | CHAT
//!
//! One utterance is one logical task; collaborator calls run sequentially
//! because each stage depends on the previous one's outcome. Replies come
//! back in a uniform envelope so callers only branch on its tag.

use crate::category;
use crate::cascade::IntentCascadeClassifier;
use crate::error::PipelineError;
use crate::extraction::{ClarificationNeed, ExtractionOutcome, TransactionExtractor};
use crate::lifecycle::TransactionLifecycle;
use crate::models::{
    ChatMode, DocumentData, Domain, ExtractionCandidate, Resolution, Transaction, VoiceReply,
};
use crate::narrative;
use crate::query::QueryAnswerer;
use crate::reasoning::ReasoningClient;
use crate::store::TransactionStore;
use crate::transcribe::SpeechToText;
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_LANGUAGE: &str = "es-MX";

const REPLY_NOISE: &str = "No te entendí, repítelo por favor.";
const REPLY_NO_AUDIO: &str = "No pude detectar voz clara en el audio. Por favor intenta de nuevo.";
const REPLY_NEED_AMOUNT: &str =
    "Entendí el concepto, pero necesito el monto para registrarlo. ¿Cuánto costó?";
const REPLY_NEED_DETAIL: &str =
    "Entendí que quieres registrar algo, pero me faltan detalles. ¿Podrías decirme qué fue y cuánto costó?";

/// Top-level coordinator for voice utterances and verifications
pub struct VoiceOrchestrator {
    transcriber: Arc<dyn SpeechToText>,
    reasoning: Arc<dyn ReasoningClient>,
    store: Arc<dyn TransactionStore>,
    cascade: IntentCascadeClassifier,
    extractor: TransactionExtractor,
    lifecycle: TransactionLifecycle,
    query: QueryAnswerer,
}

impl VoiceOrchestrator {
    pub fn new(
        transcriber: Arc<dyn SpeechToText>,
        reasoning: Arc<dyn ReasoningClient>,
        store: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            cascade: IntentCascadeClassifier::new(reasoning.clone()),
            extractor: TransactionExtractor::new(reasoning.clone()),
            lifecycle: TransactionLifecycle::new(store.clone()),
            query: QueryAnswerer::new(reasoning.clone(), store.clone()),
            transcriber,
            reasoning,
            store,
        }
    }

    /// Process one voice utterance end to end
    pub async fn handle_utterance(
        &self,
        user_id: Uuid,
        audio: &[u8],
        language: &str,
    ) -> Result<VoiceReply> {
        info!(user_id = ?user_id, bytes = audio.len(), "Voice pipeline: starting");

        // === TRANSCRIBE ===
        let transcript = match self.transcriber.transcribe(audio, language).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Transcription failed: {}", e);
                String::new()
            }
        };

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() || transcript.eq_ignore_ascii_case("error") {
            return self.audio_fallback(user_id, audio, language).await;
        }

        info!(transcript = %transcript, "Transcription accepted");
        self.handle_transcript(user_id, &transcript).await
    }

    /// The cascade-and-branch half of the pipeline, shared by the voice
    /// path and any caller that already has text
    pub async fn handle_transcript(&self, user_id: Uuid, transcript: &str) -> Result<VoiceReply> {
        // === CASCADE ===
        let cascade = self.cascade.classify(transcript).await;
        info!(domain = ?cascade.domain, resolution = ?cascade.resolution, "Cascade resolved");

        match cascade.domain {
            Domain::Meta => {
                let message = self
                    .reasoning
                    .generate_chat_reply(transcript, ChatMode::Capability)
                    .await?;
                Ok(VoiceReply::chat(message))
            }
            Domain::Social => {
                let message = self
                    .reasoning
                    .generate_chat_reply(transcript, ChatMode::SmallTalk)
                    .await?;
                Ok(VoiceReply::chat(message))
            }
            Domain::Financial => match cascade.resolution {
                Resolution::Noise => Ok(VoiceReply::chat(REPLY_NOISE)),
                Resolution::Read => {
                    let message = self.query.answer(user_id, transcript).await?;
                    Ok(VoiceReply::chat(message))
                }
                Resolution::Ambiguous => Ok(VoiceReply::chat(follow_up_question(transcript))),
                Resolution::Write => self.record_utterance(user_id, transcript).await,
            },
        }
    }

    /// Answer a typed question over recorded movements (chat surface)
    pub async fn answer_query(&self, user_id: Uuid, text: &str) -> Result<String> {
        self.query.answer(user_id, text).await
    }

    /// Verify a provisional transaction against document-extracted data.
    /// The document collaborator already ran; its output is the input here.
    pub async fn verify_with_document(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        document: DocumentData,
    ) -> Result<Transaction> {
        let tx = self.owned_transaction(user_id, transaction_id).await?;

        let category = category::suggest(&tx.concept, Some(&document.vendor));
        self.lifecycle
            .verify_with_document(transaction_id, &document, Some(category.to_string()))
            .await
    }

    /// Verify a provisional transaction without a document
    pub async fn verify_manually(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction> {
        let tx = self.owned_transaction(user_id, transaction_id).await?;

        let category = category::suggest(&tx.concept, tx.merchant.as_deref());
        self.lifecycle
            .verify_manually(transaction_id, Some(category.to_string()))
            .await
    }

    /// Fetch a transaction and enforce that the requester owns it
    async fn owned_transaction(&self, user_id: Uuid, transaction_id: Uuid) -> Result<Transaction> {
        let tx = self
            .store
            .fetch(transaction_id)
            .await?
            .ok_or(PipelineError::NotFound(transaction_id))?;

        if tx.user_id != user_id {
            return Err(PipelineError::Unauthorized(
                "Not authorized to verify this transaction".to_string(),
            ));
        }

        Ok(tx)
    }

    // === WRITE branch ===

    async fn record_utterance(&self, user_id: Uuid, transcript: &str) -> Result<VoiceReply> {
        match self.extractor.extract(transcript).await? {
            ExtractionOutcome::Rejected(need) => {
                info!(?need, "Extraction incomplete, asking for clarification");
                Ok(VoiceReply::chat(clarification_prompt(need)))
            }
            ExtractionOutcome::Accepted(candidates) => {
                self.record_candidates(user_id, candidates).await
            }
        }
    }

    async fn record_candidates(
        &self,
        user_id: Uuid,
        candidates: Vec<ExtractionCandidate>,
    ) -> Result<VoiceReply> {
        let mut transactions = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let tx = self.lifecycle.create_provisional(user_id, candidate).await?;
            transactions.push(tx);
        }

        let message = narrative::confirmation(&transactions);
        info!(count = transactions.len(), "Movements recorded");

        Ok(VoiceReply::Transaction {
            data: transactions,
            message,
        })
    }

    /// Best-effort secondary attempt when transcription produced nothing:
    /// one direct audio-to-candidates extraction, then give up.
    async fn audio_fallback(
        &self,
        user_id: Uuid,
        audio: &[u8],
        language: &str,
    ) -> Result<VoiceReply> {
        warn!("No usable transcription, attempting direct audio extraction");

        let candidates = match self.reasoning.extract_from_audio(audio, language).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Direct audio extraction failed: {}", e);
                return Err(PipelineError::TranscriptionFailure(REPLY_NO_AUDIO.to_string()));
            }
        };

        match TransactionExtractor::gate_candidates(candidates) {
            ExtractionOutcome::Accepted(accepted) => {
                self.record_candidates(user_id, accepted).await
            }
            ExtractionOutcome::Rejected(_) => Err(PipelineError::TranscriptionFailure(
                REPLY_NO_AUDIO.to_string(),
            )),
        }
    }
}

/// Targeted follow-up for AMBIGUOUS utterances, chosen by keyword sniffing
fn follow_up_question(transcript: &str) -> &'static str {
    let lowered = transcript.to_lowercase();
    if lowered.contains("ingreso") || lowered.contains("income") {
        "¿De qué fue el ingreso y de cuánto fue?"
    } else if lowered.contains("deuda") || lowered.contains("debt") {
        "¿A quién le debes y cuánto es la deuda?"
    } else {
        "¿De qué fue el gasto/ingreso? Necesito más detalles."
    }
}

fn clarification_prompt(need: ClarificationNeed) -> &'static str {
    match need {
        ClarificationNeed::Amount => REPLY_NEED_AMOUNT,
        ClarificationNeed::Detail => REPLY_NEED_DETAIL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QueryAnalysis, QueryFilters, QueryIntent, TransactionStatus, TransactionType};
    use crate::store::InMemoryStore;
    use crate::transcribe::MockTranscriber;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};

    /// Fully scripted reasoning collaborator
    struct ScriptedReasoning {
        domain: Domain,
        resolution: Resolution,
        candidates: Vec<ExtractionCandidate>,
        audio_candidates: Vec<ExtractionCandidate>,
    }

    impl ScriptedReasoning {
        fn write(candidates: Vec<ExtractionCandidate>) -> Self {
            Self {
                domain: Domain::Financial,
                resolution: Resolution::Write,
                candidates,
                audio_candidates: vec![],
            }
        }
    }

    #[async_trait]
    impl ReasoningClient for ScriptedReasoning {
        async fn classify_domain(&self, _text: &str) -> Result<Domain> {
            Ok(self.domain)
        }

        async fn classify_resolution(&self, _text: &str) -> Result<Resolution> {
            Ok(self.resolution)
        }

        async fn extract_candidates(&self, _text: &str) -> Result<Vec<ExtractionCandidate>> {
            Ok(self.candidates.clone())
        }

        async fn analyze_query_intent(
            &self,
            _text: &str,
            _today: NaiveDate,
        ) -> Result<QueryAnalysis> {
            Ok(QueryAnalysis {
                intent: QueryIntent::Query,
                filters: QueryFilters::default(),
            })
        }

        async fn generate_chat_reply(&self, _text: &str, mode: ChatMode) -> Result<String> {
            Ok(match mode {
                ChatMode::Capability => "Registro tus movimientos por voz.".to_string(),
                ChatMode::SmallTalk => "¡Hola! ¿Qué anotamos hoy?".to_string(),
            })
        }

        async fn extract_from_audio(
            &self,
            _audio: &[u8],
            _language: &str,
        ) -> Result<Vec<ExtractionCandidate>> {
            Ok(self.audio_candidates.clone())
        }
    }

    fn candidate(kind: TransactionType, amount: f64, concept: &str) -> ExtractionCandidate {
        ExtractionCandidate {
            kind,
            amount,
            concept: concept.to_string(),
            merchant: None,
            category: None,
            date: None,
        }
    }

    fn orchestrator(
        transcript: &str,
        reasoning: ScriptedReasoning,
    ) -> (VoiceOrchestrator, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = VoiceOrchestrator::new(
            Arc::new(MockTranscriber::new(transcript)),
            Arc::new(reasoning),
            store.clone(),
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_single_expense_utterance_creates_provisional_transaction() {
        // "I spent 120 pesos on dinner"
        let (orchestrator, store) = orchestrator(
            "Gasté 120 pesos en la cena",
            ScriptedReasoning::write(vec![candidate(TransactionType::Expense, 120.0, "cena")]),
        );

        let reply = orchestrator
            .handle_utterance(Uuid::new_v4(), b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();

        match reply {
            VoiceReply::Transaction { data, message } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].kind, TransactionType::Expense);
                assert_eq!(data[0].amount, 120.0);
                assert!(data[0].concept.contains("cena"));
                assert!(data[0].merchant.is_none());
                assert_eq!(data[0].status, TransactionStatus::Provisional);
                assert!(message.contains("cena"));

                let stored = store.fetch(data[0].transaction_id).await.unwrap().unwrap();
                assert_eq!(stored.status, TransactionStatus::Provisional);
            }
            other => panic!("expected transaction reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bare_noun_utterance_asks_for_detail_and_creates_nothing() {
        // model says WRITE, the local rule still forces AMBIGUOUS
        let (orchestrator, store) = orchestrator(
            "gasto",
            ScriptedReasoning::write(vec![candidate(TransactionType::Expense, 120.0, "cena")]),
        );

        let user_id = Uuid::new_v4();
        let reply = orchestrator
            .handle_utterance(user_id, b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();

        assert!(matches!(reply, VoiceReply::Chat { .. }));
        assert!(reply.message().contains("Necesito más detalles"));
        assert!(store
            .list(user_id, &QueryFilters::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_follow_up_is_keyword_targeted() {
        assert!(follow_up_question("un ingreso").contains("ingreso"));
        assert!(follow_up_question("tengo una deuda").contains("debes"));
        assert!(follow_up_question("dinero").contains("gasto/ingreso"));
    }

    #[tokio::test]
    async fn test_invalid_candidates_yield_clarification_not_transaction() {
        let (orchestrator, store) = orchestrator(
            "compré boletos de avión",
            ScriptedReasoning::write(vec![candidate(
                TransactionType::Expense,
                0.0,
                "boletos de avión",
            )]),
        );

        let user_id = Uuid::new_v4();
        let reply = orchestrator
            .handle_utterance(user_id, b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();

        match reply {
            VoiceReply::Chat { message } => assert!(message.contains("¿Cuánto costó?")),
            other => panic!("expected chat reply, got {:?}", other),
        }

        assert!(store
            .list(user_id, &QueryFilters::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_two_movements_create_two_transactions_with_grouped_narrative() {
        let (orchestrator, _) = orchestrator(
            "gasté 50 en café y me pagaron 500 de sueldo",
            ScriptedReasoning::write(vec![
                candidate(TransactionType::Expense, 50.0, "café"),
                candidate(TransactionType::Income, 500.0, "sueldo"),
            ]),
        );

        let reply = orchestrator
            .handle_utterance(Uuid::new_v4(), b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();

        match reply {
            VoiceReply::Transaction { data, message } => {
                assert_eq!(data.len(), 2);
                assert!(data.iter().any(|tx| tx.kind == TransactionType::Expense));
                assert!(data.iter().any(|tx| tx.kind == TransactionType::Income));
                assert!(message.contains("1 gasto ($50.00)"));
                assert!(message.contains("1 ingreso ($500.00)"));
            }
            other => panic!("expected transaction reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_social_utterance_routes_to_chat_generator() {
        let reasoning = ScriptedReasoning {
            domain: Domain::Social,
            resolution: Resolution::Write,
            candidates: vec![],
            audio_candidates: vec![],
        };
        let (orchestrator, _) = orchestrator("hola, ¿cómo estás?", reasoning);

        let reply = orchestrator
            .handle_utterance(Uuid::new_v4(), b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();

        assert_eq!(reply.message(), "¡Hola! ¿Qué anotamos hoy?");
    }

    #[tokio::test]
    async fn test_read_utterance_routes_to_query_path() {
        let reasoning = ScriptedReasoning {
            domain: Domain::Financial,
            resolution: Resolution::Read,
            candidates: vec![],
            audio_candidates: vec![],
        };
        let (orchestrator, _) = orchestrator("¿cuánto llevo gastado?", reasoning);

        let reply = orchestrator
            .handle_utterance(Uuid::new_v4(), b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();

        // empty store: the query path reports no matches
        assert!(reply.message().contains("no encontré"));
    }

    #[tokio::test]
    async fn test_empty_transcription_falls_back_to_audio_extraction() {
        let reasoning = ScriptedReasoning {
            domain: Domain::Financial,
            resolution: Resolution::Write,
            candidates: vec![],
            audio_candidates: vec![candidate(TransactionType::Expense, 80.0, "tacos")],
        };
        let (orchestrator, store) = orchestrator("", reasoning);

        let user_id = Uuid::new_v4();
        let reply = orchestrator
            .handle_utterance(user_id, b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();

        match reply {
            VoiceReply::Transaction { data, .. } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].concept, "tacos");
            }
            other => panic!("expected transaction reply, got {:?}", other),
        }

        assert_eq!(
            store.list(user_id, &QueryFilters::default()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_empty_transcription_and_failed_fallback_abort() {
        let (orchestrator, _) = orchestrator("", ScriptedReasoning::write(vec![]));

        let result = orchestrator
            .handle_utterance(Uuid::new_v4(), b"audio", DEFAULT_LANGUAGE)
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::TranscriptionFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_document_verification_assigns_restaurant_category() {
        let (orchestrator, _) = orchestrator(
            "Gasté 120 pesos en la cena",
            ScriptedReasoning::write(vec![candidate(TransactionType::Expense, 120.0, "cena")]),
        );

        let user_id = Uuid::new_v4();
        let reply = orchestrator
            .handle_utterance(user_id, b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();
        let VoiceReply::Transaction { data, .. } = reply else {
            panic!("expected transaction reply");
        };

        let document = DocumentData {
            vendor: "La Trattoria".to_string(),
            total_amount: 122.50,
            date: Utc.with_ymd_and_hms(2026, 8, 1, 21, 30, 0).unwrap(),
        };

        let verified = orchestrator
            .verify_with_document(user_id, data[0].transaction_id, document)
            .await
            .unwrap();

        assert_eq!(verified.status, TransactionStatus::Verified);
        assert_eq!(verified.amount, 122.50);
        assert_eq!(verified.merchant.as_deref(), Some("La Trattoria"));
        assert_eq!(verified.category.as_deref(), Some("Restaurantes"));
    }

    #[tokio::test]
    async fn test_verification_by_non_owner_is_unauthorized() {
        let (orchestrator, _) = orchestrator(
            "Gasté 120 pesos en la cena",
            ScriptedReasoning::write(vec![candidate(TransactionType::Expense, 120.0, "cena")]),
        );

        let owner = Uuid::new_v4();
        let reply = orchestrator
            .handle_utterance(owner, b"audio", DEFAULT_LANGUAGE)
            .await
            .unwrap();
        let VoiceReply::Transaction { data, .. } = reply else {
            panic!("expected transaction reply");
        };

        let stranger = Uuid::new_v4();
        let result = orchestrator
            .verify_manually(stranger, data[0].transaction_id)
            .await;

        assert!(matches!(result, Err(PipelineError::Unauthorized(_))));
    }
}
