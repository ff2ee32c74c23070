//! Voice-Ledger Orchestrator
//!
//! A voice-driven personal ledger pipeline that:
//! - Transcribes short spoken utterances about money
//! - Classifies intent through a two-stage cascade (domain → resolution)
//! - Extracts structured transaction candidates and gates them for completeness
//! - Records provisional transactions and verifies them by document or manually
//! - Answers questions over recorded movements in natural language
//!
//! PIPELINE:
//! TRANSCRIBE → CASCADE → (EXTRACT → VALIDATE → RECORD) | QUERY | CHAT

pub mod api;
pub mod cascade;
pub mod category;
pub mod error;
pub mod extraction;
pub mod lifecycle;
pub mod models;
pub mod narrative;
pub mod orchestrator;
pub mod query;
pub mod reasoning;
pub mod store;
pub mod transcribe;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use orchestrator::VoiceOrchestrator;
