//! Transaction state machine
//!
//! PROVISIONAL → VERIFIED | VERIFIED_MANUAL, nothing else. This component
//! owns transition legality and field semantics; it is agnostic to how a
//! category was computed and never checks ownership — both are the
//! orchestrator's job.

use crate::models::{
    DocumentData, ExtractionCandidate, Transaction, TransactionStatus, VerificationUpdate,
};
use crate::store::TransactionStore;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct TransactionLifecycle {
    store: Arc<dyn TransactionStore>,
}

impl TransactionLifecycle {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Create and persist a transaction from a validated candidate.
    /// Always lands in PROVISIONAL.
    pub async fn create_provisional(
        &self,
        user_id: Uuid,
        candidate: ExtractionCandidate,
    ) -> Result<Transaction> {
        let now = Utc::now();
        let tx = Transaction {
            transaction_id: Uuid::new_v4(),
            user_id,
            kind: candidate.kind,
            amount: candidate.amount,
            concept: candidate.concept,
            merchant: candidate.merchant,
            category: candidate.category,
            status: TransactionStatus::Provisional,
            transaction_date: candidate.date,
            transaction_time: None,
            created_at: now,
            updated_at: now,
        };

        info!(
            transaction_id = ?tx.transaction_id,
            user_id = ?user_id,
            kind = %tx.kind,
            amount = tx.amount,
            "Provisional transaction created"
        );

        self.store.insert(tx).await
    }

    /// Verify against a source document. The document is the source of
    /// truth for amount, merchant, date and time — all four are overwritten.
    pub async fn verify_with_document(
        &self,
        transaction_id: Uuid,
        document: &DocumentData,
        category: Option<String>,
    ) -> Result<Transaction> {
        let update = VerificationUpdate {
            status: TransactionStatus::Verified,
            amount: Some(document.total_amount),
            merchant: Some(document.vendor.clone()),
            transaction_date: Some(document.date.date_naive()),
            transaction_time: Some(document.date.time()),
            category,
        };

        let tx = self.store.verify(transaction_id, update).await?;
        info!(transaction_id = ?transaction_id, "Transaction verified by document");
        Ok(tx)
    }

    /// Verify without a document: only the status changes (and the category,
    /// when one was computed). Amount, concept and merchant stay untouched.
    pub async fn verify_manually(
        &self,
        transaction_id: Uuid,
        category: Option<String>,
    ) -> Result<Transaction> {
        let update = VerificationUpdate {
            status: TransactionStatus::VerifiedManual,
            amount: None,
            merchant: None,
            transaction_date: None,
            transaction_time: None,
            category,
        };

        let tx = self.store.verify(transaction_id, update).await?;
        info!(transaction_id = ?transaction_id, "Transaction verified manually");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::TransactionType;
    use crate::store::InMemoryStore;
    use chrono::TimeZone;

    fn lifecycle() -> (TransactionLifecycle, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (TransactionLifecycle::new(store.clone()), store)
    }

    fn dinner_candidate() -> ExtractionCandidate {
        ExtractionCandidate {
            kind: TransactionType::Expense,
            amount: 120.0,
            concept: "cena".to_string(),
            merchant: None,
            category: None,
            date: None,
        }
    }

    fn trattoria_receipt() -> DocumentData {
        DocumentData {
            vendor: "La Trattoria".to_string(),
            total_amount: 122.50,
            date: Utc.with_ymd_and_hms(2026, 8, 1, 21, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_creation_is_always_provisional() {
        let (lifecycle, _) = lifecycle();
        let tx = lifecycle
            .create_provisional(Uuid::new_v4(), dinner_candidate())
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Provisional);
        assert_eq!(tx.amount, 120.0);
        assert!(tx.transaction_date.is_none());
        assert!(tx.updated_at >= tx.created_at);
    }

    #[tokio::test]
    async fn test_document_verification_overwrites_document_fields() {
        let (lifecycle, _) = lifecycle();
        let tx = lifecycle
            .create_provisional(Uuid::new_v4(), dinner_candidate())
            .await
            .unwrap();

        let verified = lifecycle
            .verify_with_document(
                tx.transaction_id,
                &trattoria_receipt(),
                Some("Restaurantes".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(verified.status, TransactionStatus::Verified);
        assert_eq!(verified.amount, 122.50);
        assert_eq!(verified.merchant.as_deref(), Some("La Trattoria"));
        assert_eq!(verified.category.as_deref(), Some("Restaurantes"));
        assert_eq!(verified.transaction_date.unwrap().to_string(), "2026-08-01");
        assert_eq!(verified.transaction_time.unwrap().to_string(), "21:30:00");
        // the voice concept survives document verification
        assert_eq!(verified.concept, "cena");
    }

    #[tokio::test]
    async fn test_manual_verification_leaves_fields_untouched() {
        let (lifecycle, _) = lifecycle();
        let tx = lifecycle
            .create_provisional(Uuid::new_v4(), dinner_candidate())
            .await
            .unwrap();

        let verified = lifecycle
            .verify_manually(tx.transaction_id, Some("Restaurantes".to_string()))
            .await
            .unwrap();

        assert_eq!(verified.status, TransactionStatus::VerifiedManual);
        assert_eq!(verified.amount, 120.0);
        assert!(verified.merchant.is_none());
        assert!(verified.transaction_date.is_none());
    }

    #[tokio::test]
    async fn test_verified_transaction_cannot_be_verified_again() {
        let (lifecycle, store) = lifecycle();
        let tx = lifecycle
            .create_provisional(Uuid::new_v4(), dinner_candidate())
            .await
            .unwrap();

        lifecycle
            .verify_with_document(tx.transaction_id, &trattoria_receipt(), None)
            .await
            .unwrap();

        // document re-verify and manual verify must both fail, and the
        // stored transaction must be unchanged
        let again = lifecycle
            .verify_with_document(tx.transaction_id, &trattoria_receipt(), None)
            .await;
        assert!(matches!(again, Err(PipelineError::InvalidState(_))));

        let manual = lifecycle.verify_manually(tx.transaction_id, None).await;
        assert!(matches!(manual, Err(PipelineError::InvalidState(_))));

        let stored = store.fetch(tx.transaction_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Verified);
        assert_eq!(stored.amount, 122.50);
    }

    #[tokio::test]
    async fn test_verifying_missing_transaction_is_not_found() {
        let (lifecycle, _) = lifecycle();
        let result = lifecycle.verify_manually(Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }
}
