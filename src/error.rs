//! Error types for the voice-ledger pipeline

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Transcription failure: {0}")]
    TranscriptionFailure(String),

    #[error("Reasoning service error: {0}")]
    ReasoningError(String),

    #[error("Transaction not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
