use std::sync::Arc;
use tracing::info;
use voice_ledger_orchestrator::{
    api::start_server,
    orchestrator::VoiceOrchestrator,
    reasoning::GeminiReasoning,
    store::{InMemoryStore, PostgresStore, TransactionStore},
    transcribe::GoogleSpeechClient,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
        eprintln!("📌 See .env.example for setup instructions");
        String::new()
    });

    let speech_api_key = std::env::var("SPEECH_API_KEY")
        .or_else(|_| std::env::var("GOOGLE_API_KEY"))
        .unwrap_or_else(|_| gemini_api_key.clone());

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Voice-Ledger Orchestrator - API Server");
    info!("📍 Port: {}", api_port);

    // Select the store backend: Postgres when configured, memory otherwise
    let database_url = std::env::var("POSTGRES_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok();

    let store: Arc<dyn TransactionStore> = match database_url {
        Some(url) => match PostgresStore::connect(&url) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                eprintln!("⚠️  Postgres unavailable, falling back to in-memory: {}", e);
                Arc::new(InMemoryStore::new())
            }
        },
        None => {
            info!("Transaction store backend: in-memory");
            Arc::new(InMemoryStore::new())
        }
    };

    // Wire the live collaborators
    let transcriber = Arc::new(GoogleSpeechClient::new(speech_api_key));
    let reasoning = Arc::new(GeminiReasoning::new(gemini_api_key));

    let orchestrator = Arc::new(VoiceOrchestrator::new(transcriber, reasoning, store));

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(orchestrator, api_port).await?;

    Ok(())
}
