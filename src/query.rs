//! Read path: answering questions over recorded transactions
//!
//! The reasoning service interprets the question into filters; the store
//! does the arithmetic. When the service decides there is nothing to look
//! up, a keyword sniff over the utterance still tries to produce a useful
//! period/category window before answering.

use crate::models::{QueryFilters, QueryIntent};
use crate::narrative;
use crate::reasoning::ReasoningClient;
use crate::store::TransactionStore;
use crate::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Category hints recognized directly in query text
const QUERY_CATEGORY_HINTS: &[(&str, &str)] = &[
    ("restaurante", "Restaurantes"),
    ("cena", "Restaurantes"),
    ("comida", "Alimentación"),
    ("café", "Alimentación"),
    ("super", "Supermercado"),
    ("gasolina", "Transporte"),
    ("uber", "Transporte"),
    ("taxi", "Transporte"),
    ("luz", "Servicios"),
    ("renta", "Vivienda"),
];

pub struct QueryAnswerer {
    reasoning: Arc<dyn ReasoningClient>,
    store: Arc<dyn TransactionStore>,
}

impl QueryAnswerer {
    pub fn new(reasoning: Arc<dyn ReasoningClient>, store: Arc<dyn TransactionStore>) -> Self {
        Self { reasoning, store }
    }

    pub async fn answer(&self, user_id: Uuid, text: &str) -> Result<String> {
        let today = Utc::now().date_naive();
        let analysis = self.reasoning.analyze_query_intent(text, today).await?;

        let filters = match analysis.intent {
            QueryIntent::Query => analysis.filters,
            QueryIntent::Chat => {
                debug!("Query intent resolved to chat, sniffing filters locally");
                sniff_filters(text)
            }
        };

        let summary = self.store.summarize(user_id, &filters).await?;
        let pending = self.store.pending_balance(user_id).await?;

        Ok(narrative::query_summary(&summary, &pending, &filters))
    }
}

/// Keyword fallback: derive a period and category from the raw utterance
fn sniff_filters(text: &str) -> QueryFilters {
    let lowered = text.to_lowercase();
    let today = Utc::now().date_naive();

    let days_back = if lowered.contains("hoy") {
        0
    } else if lowered.contains("ayer") {
        1
    } else if lowered.contains("semana") {
        7
    } else {
        30
    };

    let category = QUERY_CATEGORY_HINTS
        .iter()
        .find(|(hint, _)| lowered.contains(hint))
        .map(|(_, label)| label.to_string());

    QueryFilters {
        start_date: Some(today - Duration::days(days_back)),
        end_date: Some(today),
        category,
        kind: None,
    }
}
