//! Core data models for the voice-ledger pipeline

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Expense,
    Income,
    Debt,
}

impl Default for TransactionType {
    fn default() -> Self {
        TransactionType::Expense
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Provisional,
    Verified,
    VerifiedManual,
}

/// Coarse domain of an utterance (cascade stage 1)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    Meta,
    Social,
    Financial,
}

/// Fine-grained resolution of a financial utterance (cascade stage 2).
/// Only meaningful when the domain is Financial.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    Read,
    Ambiguous,
    Write,
    Noise,
}

//
// ================= Transaction =================
//

/// A single financial movement, exclusively owned by one user.
/// All reads and writes are scoped by `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub concept: String,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub status: TransactionStatus,
    /// Populated once a document verifies the transaction
    pub transaction_date: Option<NaiveDate>,
    pub transaction_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field updates applied by a verification, executed atomically by the store.
/// Document verification overwrites amount/merchant/date/time; manual
/// verification carries only the new status and an optional category.
#[derive(Debug, Clone)]
pub struct VerificationUpdate {
    pub status: TransactionStatus,
    pub amount: Option<f64>,
    pub merchant: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_time: Option<NaiveTime>,
    pub category: Option<String>,
}

//
// ================= Cascade =================
//

/// Ephemeral result of the two-stage intent cascade. Produced fresh per
/// utterance and discarded after routing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CascadeResult {
    pub domain: Domain,
    pub resolution: Resolution,
}

impl CascadeResult {
    /// Empty or unintelligible input; never reaches the reasoning service.
    pub fn noise() -> Self {
        Self {
            domain: Domain::Financial,
            resolution: Resolution::Noise,
        }
    }

    /// Non-financial small talk or meta question; resolution is unused.
    pub fn conversational(domain: Domain) -> Self {
        Self {
            domain,
            resolution: Resolution::Noise,
        }
    }

    pub fn financial(resolution: Resolution) -> Self {
        Self {
            domain: Domain::Financial,
            resolution,
        }
    }
}

//
// ================= Extraction =================
//

/// An unpersisted, extracted guess at a transaction. Zero or more per
/// utterance; must survive the validation gate before becoming a Transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    #[serde(rename = "type", default)]
    pub kind: TransactionType,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

//
// ================= Document Verification =================
//

/// Fields extracted from a receipt by the document-analysis collaborator.
/// The analysis itself is out of scope; this is its output, and the
/// source of truth for amount/merchant/date during verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentData {
    pub vendor: String,
    pub total_amount: f64,
    pub date: DateTime<Utc>,
}

//
// ================= Query Path =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryIntent {
    Query,
    Chat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<TransactionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub intent: QueryIntent,
    #[serde(default)]
    pub filters: QueryFilters,
}

/// Aggregate over a set of transactions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total: f64,
    pub count: u64,
}

//
// ================= Chat =================
//

/// What kind of reply the chat generator should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Social small talk
    SmallTalk,
    /// Meta questions about the assistant itself
    Capability,
}

//
// ================= Orchestrator Reply =================
//

/// Uniform reply envelope: callers only branch on the tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VoiceReply {
    Transaction {
        data: Vec<Transaction>,
        message: String,
    },
    Chat {
        message: String,
    },
}

impl VoiceReply {
    pub fn chat(message: impl Into<String>) -> Self {
        VoiceReply::Chat {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            VoiceReply::Transaction { message, .. } => message,
            VoiceReply::Chat { message } => message,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Provisional => "provisional",
            TransactionStatus::Verified => "verified",
            TransactionStatus::VerifiedManual => "verified_manual",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Expense => "EXPENSE",
            TransactionType::Income => "INCOME",
            TransactionType::Debt => "DEBT",
        };
        write!(f, "{}", s)
    }
}
