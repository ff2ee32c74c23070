//! Structured extraction and the validation gate
//!
//! The extractor asks the reasoning service for a *list* of candidates (one
//! utterance can describe several movements), normalizes each one, and runs
//! it through the gate. "Not enough info" is an expected, frequent outcome,
//! so it is a tagged result — never an error.

use crate::category;
use crate::models::ExtractionCandidate;
use crate::reasoning::ReasoningClient;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Concept used when the model produced an amount but no description
const FALLBACK_CONCEPT: &str = "Movimiento sin concepto";

/// Concepts too generic to record on their own — localized counterpart of
/// the cascade's noun blacklist
const GENERIC_CONCEPTS: &[&str] = &[
    "gasto", "ingreso", "deuda", "compra", "pago", "dinero",
    "expense", "income", "debt", "purchase", "payment", "money",
];

/// What the user must clarify before anything can be recorded.
/// `Amount` is the more specific of the two: the concept was fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClarificationNeed {
    /// Concrete concept, no usable amount — ask how much
    Amount,
    /// No usable amount and no concrete concept — ask what it was
    Detail,
}

/// Outcome of extracting one utterance
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    /// At least one candidate survived the gate
    Accepted(Vec<ExtractionCandidate>),
    /// Every candidate was rejected; carries the most specific reason seen
    Rejected(ClarificationNeed),
}

/// Pure completeness check over a single candidate.
/// Same input always yields the same verdict; no external calls.
pub struct ValidationGate;

impl ValidationGate {
    pub fn validate(candidate: &ExtractionCandidate) -> std::result::Result<(), ClarificationNeed> {
        if candidate.amount > 0.0 {
            return Ok(());
        }

        let concept = candidate.concept.trim();
        let generic = concept.is_empty()
            || concept.chars().count() < 3
            || GENERIC_CONCEPTS.contains(&concept.to_lowercase().as_str());

        if generic {
            Err(ClarificationNeed::Detail)
        } else {
            Err(ClarificationNeed::Amount)
        }
    }
}

/// Converts confirmed "write" text into validated candidates
pub struct TransactionExtractor {
    reasoning: Arc<dyn ReasoningClient>,
}

impl TransactionExtractor {
    pub fn new(reasoning: Arc<dyn ReasoningClient>) -> Self {
        Self { reasoning }
    }

    /// One structured-extraction request, then normalize + gate every
    /// candidate. Collaborator failures propagate — unlike the cascade,
    /// there is no safe default to extract with.
    pub async fn extract(&self, text: &str) -> Result<ExtractionOutcome> {
        let raw = self.reasoning.extract_candidates(text).await?;
        debug!(candidates = raw.len(), "Raw extraction returned");
        Ok(Self::gate_candidates(raw))
    }

    /// Normalize + gate an already-extracted candidate list (also used for
    /// the direct-audio fallback path)
    pub fn gate_candidates(raw: Vec<ExtractionCandidate>) -> ExtractionOutcome {
        let mut accepted = Vec::new();
        let mut rejections = Vec::new();

        for candidate in raw {
            let candidate = normalize(candidate);
            match ValidationGate::validate(&candidate) {
                Ok(()) => accepted.push(candidate),
                Err(need) => rejections.push(need),
            }
        }

        if !accepted.is_empty() {
            info!(
                accepted = accepted.len(),
                rejected = rejections.len(),
                "Extraction gated"
            );
            return ExtractionOutcome::Accepted(accepted);
        }

        let need = if rejections.contains(&ClarificationNeed::Amount) {
            ClarificationNeed::Amount
        } else {
            ClarificationNeed::Detail
        };

        ExtractionOutcome::Rejected(need)
    }
}

/// Candidate hygiene before gating:
/// - merchant must not duplicate the concept (case-insensitive) and is
///   never inferred — blank means none was named;
/// - category labels outside the closed taxonomy are discarded;
/// - a usable amount with a blank concept gets a neutral placeholder.
fn normalize(mut candidate: ExtractionCandidate) -> ExtractionCandidate {
    candidate.concept = candidate.concept.trim().to_string();

    candidate.merchant = candidate.merchant.and_then(|m| {
        let m = m.trim().to_string();
        if m.is_empty() || m.to_lowercase() == candidate.concept.to_lowercase() {
            None
        } else {
            Some(m)
        }
    });

    candidate.category = candidate
        .category
        .filter(|label| category::is_known_label(label));

    if candidate.concept.is_empty() && candidate.amount > 0.0 {
        candidate.concept = FALLBACK_CONCEPT.to_string();
    }

    candidate
}
