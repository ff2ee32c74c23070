//! REST API server for the voice-ledger orchestrator
//!
//! Thin routing layer: decode the payload, hand it to the orchestrator,
//! wrap the outcome. All branching logic lives in the library.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::DocumentData;
use crate::orchestrator::{VoiceOrchestrator, DEFAULT_LANGUAGE};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    pub user_id: Option<String>,
    pub language: Option<String>,
    /// Base64-encoded audio payload
    pub audio: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatQueryRequest {
    pub user_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentVerificationRequest {
    pub user_id: Option<String>,
    /// Output of the document-analysis collaborator
    pub document: DocumentData,
}

#[derive(Debug, Deserialize)]
pub struct ManualVerificationRequest {
    pub user_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<VoiceOrchestrator>,
}

/// =============================
/// Helpers
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

fn error_status(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::InvalidState(_) => StatusCode::BAD_REQUEST,
        PipelineError::Unauthorized(_) => StatusCode::FORBIDDEN,
        PipelineError::TranscriptionFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: PipelineError) -> (StatusCode, Json<ApiResponse>) {
    (error_status(&error), Json(ApiResponse::error(error.to_string())))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Voice Endpoint
/// =============================

async fn handle_voice(
    State(state): State<ApiState>,
    Json(req): Json<VoiceRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_or_stable_uuid(req.user_id.as_deref(), "anonymous-user");
    let language = req.language.as_deref().unwrap_or(DEFAULT_LANGUAGE).to_string();

    let audio = match base64::engine::general_purpose::STANDARD.decode(&req.audio) {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!("Invalid audio payload: {}", e))),
            );
        }
    };

    info!(user_id = ?user_id, bytes = audio.len(), "Received voice request");

    match state
        .orchestrator
        .handle_utterance(user_id, &audio, &language)
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(ApiResponse::success(reply))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Chat Query Endpoint
/// =============================

async fn handle_chat(
    State(state): State<ApiState>,
    Json(req): Json<ChatQueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_or_stable_uuid(req.user_id.as_deref(), "anonymous-user");

    match state.orchestrator.answer_query(user_id, &req.message).await {
        Ok(message) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "type": "chat",
                "message": message,
            }))),
        ),
        Err(e) => failure(e),
    }
}

/// =============================
/// Verification Endpoints
/// =============================

async fn verify_with_document(
    State(state): State<ApiState>,
    Path(transaction_id): Path<Uuid>,
    Json(req): Json<DocumentVerificationRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_or_stable_uuid(req.user_id.as_deref(), "anonymous-user");

    match state
        .orchestrator
        .verify_with_document(user_id, transaction_id, req.document)
        .await
    {
        Ok(tx) => (StatusCode::OK, Json(ApiResponse::success(tx))),
        Err(e) => failure(e),
    }
}

async fn verify_manually(
    State(state): State<ApiState>,
    Path(transaction_id): Path<Uuid>,
    Json(req): Json<ManualVerificationRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_or_stable_uuid(req.user_id.as_deref(), "anonymous-user");

    match state
        .orchestrator
        .verify_manually(user_id, transaction_id)
        .await
    {
        Ok(tx) => (StatusCode::OK, Json(ApiResponse::success(tx))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<VoiceOrchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/voice", post(handle_voice))
        .route("/api/chat", post(handle_chat))
        .route("/api/transactions/:id/verify", post(verify_with_document))
        .route("/api/transactions/:id/verify/manual", post(verify_manually))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<VoiceOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
