use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use voice_ledger_orchestrator::{
    models::VoiceReply,
    orchestrator::{VoiceOrchestrator, DEFAULT_LANGUAGE},
    reasoning::MockReasoning,
    store::InMemoryStore,
    transcribe::MockTranscriber,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Voice-Ledger Orchestrator demo starting");

    // Wire the pipeline with the offline collaborators
    let transcriber = Arc::new(MockTranscriber::new("Gasté 120 pesos en la cena"));
    let reasoning = Arc::new(MockReasoning);
    let store = Arc::new(InMemoryStore::new());

    let orchestrator = VoiceOrchestrator::new(transcriber, reasoning, store);

    let user_id = Uuid::new_v4();

    info!(user_id = ?user_id, "Processing sample utterance");

    match orchestrator
        .handle_utterance(user_id, b"sample-audio", DEFAULT_LANGUAGE)
        .await
    {
        Ok(reply) => {
            println!("\n=== PIPELINE RESULT ===");
            match &reply {
                VoiceReply::Transaction { data, message } => {
                    println!("Reply: {}", message);
                    for tx in data {
                        println!(
                            "  {} | {} | ${:.2} | {} | {}",
                            tx.transaction_id, tx.kind, tx.amount, tx.concept, tx.status
                        );
                    }
                }
                VoiceReply::Chat { message } => {
                    println!("Reply: {}", message);
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Pipeline failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
