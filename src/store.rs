//! Transaction persistence layer
//!
//! Every operation is scoped by owning user where it lists or aggregates;
//! verification is an atomic check-and-mutate so a transaction can never be
//! verified twice, even under concurrent requests.

use crate::error::PipelineError;
use crate::models::{
    LedgerSummary, QueryFilters, Transaction, TransactionStatus, TransactionType,
    VerificationUpdate,
};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;
use uuid::Uuid;

/// Trait for transaction persistence
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: Transaction) -> Result<Transaction>;

    async fn fetch(&self, transaction_id: Uuid) -> Result<Option<Transaction>>;

    /// Apply a verification to a PROVISIONAL transaction atomically.
    /// Fails with `NotFound` for unknown ids and `InvalidState` when the
    /// transaction already left the provisional state.
    async fn verify(&self, transaction_id: Uuid, update: VerificationUpdate)
        -> Result<Transaction>;

    async fn list(&self, user_id: Uuid, filters: &QueryFilters) -> Result<Vec<Transaction>>;

    /// Sum + count over VERIFIED / VERIFIED_MANUAL transactions
    async fn summarize(&self, user_id: Uuid, filters: &QueryFilters) -> Result<LedgerSummary>;

    /// Sum + count over PROVISIONAL transactions awaiting review
    async fn pending_balance(&self, user_id: Uuid) -> Result<LedgerSummary>;
}

fn matches_filters(tx: &Transaction, filters: &QueryFilters) -> bool {
    if let Some(start) = filters.start_date {
        if tx.created_at.date_naive() < start {
            return false;
        }
    }
    if let Some(end) = filters.end_date {
        if tx.created_at.date_naive() > end {
            return false;
        }
    }
    if let Some(category) = &filters.category {
        if tx.category.as_deref() != Some(category.as_str()) {
            return false;
        }
    }
    if let Some(kind) = filters.kind {
        if tx.kind != kind {
            return false;
        }
    }
    true
}

fn apply_update(tx: &mut Transaction, update: VerificationUpdate) {
    tx.status = update.status;
    if let Some(amount) = update.amount {
        tx.amount = amount;
    }
    if let Some(merchant) = update.merchant {
        tx.merchant = Some(merchant);
    }
    if let Some(date) = update.transaction_date {
        tx.transaction_date = Some(date);
    }
    if let Some(time) = update.transaction_time {
        tx.transaction_time = Some(time);
    }
    if let Some(category) = update.category {
        tx.category = Some(category);
    }
    tx.updated_at = Utc::now();
}

//
// ================= In-memory backend =================
//

/// In-memory store for development & tests
pub struct InMemoryStore {
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn insert(&self, tx: Transaction) -> Result<Transaction> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(tx.transaction_id, tx.clone());
        Ok(tx)
    }

    async fn fetch(&self, transaction_id: Uuid) -> Result<Option<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(&transaction_id).cloned())
    }

    async fn verify(
        &self,
        transaction_id: Uuid,
        update: VerificationUpdate,
    ) -> Result<Transaction> {
        // Check-and-mutate under one write lock: no double-verify window
        let mut transactions = self.transactions.write().await;

        let tx = transactions
            .get_mut(&transaction_id)
            .ok_or(PipelineError::NotFound(transaction_id))?;

        if tx.status != TransactionStatus::Provisional {
            return Err(PipelineError::InvalidState(format!(
                "Transaction is not in provisional state. Current state: {}",
                tx.status
            )));
        }

        apply_update(tx, update);
        Ok(tx.clone())
    }

    async fn list(&self, user_id: Uuid, filters: &QueryFilters) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;

        let mut matched: Vec<Transaction> = transactions
            .values()
            .filter(|tx| tx.user_id == user_id && matches_filters(tx, filters))
            .cloned()
            .collect();

        matched.sort_by_key(|tx| tx.created_at);
        Ok(matched)
    }

    async fn summarize(&self, user_id: Uuid, filters: &QueryFilters) -> Result<LedgerSummary> {
        let transactions = self.transactions.read().await;

        let mut summary = LedgerSummary::default();
        for tx in transactions.values() {
            let verified = matches!(
                tx.status,
                TransactionStatus::Verified | TransactionStatus::VerifiedManual
            );
            if tx.user_id == user_id && verified && matches_filters(tx, filters) {
                summary.total += tx.amount;
                summary.count += 1;
            }
        }

        Ok(summary)
    }

    async fn pending_balance(&self, user_id: Uuid) -> Result<LedgerSummary> {
        let transactions = self.transactions.read().await;

        let mut summary = LedgerSummary::default();
        for tx in transactions.values() {
            if tx.user_id == user_id && tx.status == TransactionStatus::Provisional {
                summary.total += tx.amount;
                summary.count += 1;
            }
        }

        Ok(summary)
    }
}

//
// ================= Postgres backend =================
//

/// Postgres-backed store (sqlx)
pub struct PostgresStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| PipelineError::StoreError(format!("Failed to create pool: {}", e)))?;

        info!("Transaction store backend: postgres");

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS transactions (
                      transaction_id UUID PRIMARY KEY,
                      user_id UUID NOT NULL,
                      kind TEXT NOT NULL,
                      amount DOUBLE PRECISION NOT NULL,
                      concept TEXT NOT NULL,
                      merchant TEXT,
                      category TEXT,
                      status TEXT NOT NULL,
                      transaction_date DATE,
                      transaction_time TIME,
                      created_at TIMESTAMPTZ NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_transactions_user_created
                    ON transactions (user_id, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                PipelineError::StoreError(format!("Failed to initialize schema: {}", e))
            })?;

        Ok(())
    }

    fn status_to_db(status: TransactionStatus) -> &'static str {
        match status {
            TransactionStatus::Provisional => "provisional",
            TransactionStatus::Verified => "verified",
            TransactionStatus::VerifiedManual => "verified_manual",
        }
    }

    fn status_from_db(status: &str) -> TransactionStatus {
        match status {
            "verified" => TransactionStatus::Verified,
            "verified_manual" => TransactionStatus::VerifiedManual,
            _ => TransactionStatus::Provisional,
        }
    }

    fn kind_to_db(kind: TransactionType) -> &'static str {
        match kind {
            TransactionType::Expense => "expense",
            TransactionType::Income => "income",
            TransactionType::Debt => "debt",
        }
    }

    fn kind_from_db(kind: &str) -> TransactionType {
        match kind {
            "income" => TransactionType::Income,
            "debt" => TransactionType::Debt,
            _ => TransactionType::Expense,
        }
    }

    fn row_to_transaction(row: &sqlx::postgres::PgRow) -> Result<Transaction> {
        let status: String = row
            .try_get("status")
            .map_err(|e| PipelineError::StoreError(e.to_string()))?;
        let kind: String = row
            .try_get("kind")
            .map_err(|e| PipelineError::StoreError(e.to_string()))?;

        Ok(Transaction {
            transaction_id: row
                .try_get("transaction_id")
                .map_err(|e| PipelineError::StoreError(e.to_string()))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| PipelineError::StoreError(e.to_string()))?,
            kind: Self::kind_from_db(&kind),
            amount: row
                .try_get("amount")
                .map_err(|e| PipelineError::StoreError(e.to_string()))?,
            concept: row
                .try_get("concept")
                .map_err(|e| PipelineError::StoreError(e.to_string()))?,
            merchant: row.try_get("merchant").unwrap_or(None),
            category: row.try_get("category").unwrap_or(None),
            status: Self::status_from_db(&status),
            transaction_date: row.try_get("transaction_date").unwrap_or(None),
            transaction_time: row.try_get("transaction_time").unwrap_or(None),
            created_at: row
                .try_get("created_at")
                .map_err(|e| PipelineError::StoreError(e.to_string()))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| PipelineError::StoreError(e.to_string()))?,
        })
    }

    fn push_filters<'a>(
        builder: &mut sqlx::QueryBuilder<'a, sqlx::Postgres>,
        filters: &'a QueryFilters,
    ) {
        if let Some(start) = filters.start_date {
            builder.push(" AND created_at::date >= ").push_bind(start);
        }
        if let Some(end) = filters.end_date {
            builder.push(" AND created_at::date <= ").push_bind(end);
        }
        if let Some(category) = &filters.category {
            builder.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(kind) = filters.kind {
            builder.push(" AND kind = ").push_bind(Self::kind_to_db(kind));
        }
    }
}

#[async_trait]
impl TransactionStore for PostgresStore {
    async fn insert(&self, tx: Transaction) -> Result<Transaction> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO transactions
              (transaction_id, user_id, kind, amount, concept, merchant, category,
               status, transaction_date, transaction_time, created_at, updated_at)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(tx.transaction_id)
        .bind(tx.user_id)
        .bind(Self::kind_to_db(tx.kind))
        .bind(tx.amount)
        .bind(&tx.concept)
        .bind(&tx.merchant)
        .bind(&tx.category)
        .bind(Self::status_to_db(tx.status))
        .bind(tx.transaction_date)
        .bind(tx.transaction_time)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::StoreError(format!("Failed to insert transaction: {}", e)))?;

        Ok(tx)
    }

    async fn fetch(&self, transaction_id: Uuid) -> Result<Option<Transaction>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT * FROM transactions WHERE transaction_id = $1")
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PipelineError::StoreError(format!("Failed to fetch transaction: {}", e)))?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    async fn verify(
        &self,
        transaction_id: Uuid,
        update: VerificationUpdate,
    ) -> Result<Transaction> {
        self.ensure_schema().await?;

        // One conditional UPDATE: the status guard and the mutation are a
        // single atomic statement, so concurrent verifications race safely.
        let row = sqlx::query(
            r#"
            UPDATE transactions SET
              status = $2,
              amount = COALESCE($3, amount),
              merchant = COALESCE($4, merchant),
              transaction_date = COALESCE($5, transaction_date),
              transaction_time = COALESCE($6, transaction_time),
              category = COALESCE($7, category),
              updated_at = NOW()
            WHERE transaction_id = $1 AND status = 'provisional'
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .bind(Self::status_to_db(update.status))
        .bind(update.amount)
        .bind(update.merchant)
        .bind(update.transaction_date)
        .bind(update.transaction_time)
        .bind(update.category)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PipelineError::StoreError(format!("Failed to verify transaction: {}", e)))?;

        match row {
            Some(row) => Self::row_to_transaction(&row),
            None => match self.fetch(transaction_id).await? {
                Some(existing) => Err(PipelineError::InvalidState(format!(
                    "Transaction is not in provisional state. Current state: {}",
                    existing.status
                ))),
                None => Err(PipelineError::NotFound(transaction_id)),
            },
        }
    }

    async fn list(&self, user_id: Uuid, filters: &QueryFilters) -> Result<Vec<Transaction>> {
        self.ensure_schema().await?;

        let mut builder =
            sqlx::QueryBuilder::new("SELECT * FROM transactions WHERE user_id = ");
        builder.push_bind(user_id);
        Self::push_filters(&mut builder, filters);
        builder.push(" ORDER BY created_at ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PipelineError::StoreError(format!("Failed to list transactions: {}", e)))?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    async fn summarize(&self, user_id: Uuid, filters: &QueryFilters) -> Result<LedgerSummary> {
        self.ensure_schema().await?;

        let mut builder = sqlx::QueryBuilder::new(
            "SELECT COALESCE(SUM(amount), 0) AS total, COUNT(*) AS count \
             FROM transactions WHERE status IN ('verified', 'verified_manual') AND user_id = ",
        );
        builder.push_bind(user_id);
        Self::push_filters(&mut builder, filters);

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PipelineError::StoreError(format!("Failed to summarize: {}", e)))?;

        Ok(LedgerSummary {
            total: row.try_get::<f64, _>("total").unwrap_or(0.0),
            count: row.try_get::<i64, _>("count").unwrap_or(0) as u64,
        })
    }

    async fn pending_balance(&self, user_id: Uuid) -> Result<LedgerSummary> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total, COUNT(*) AS count \
             FROM transactions WHERE status = 'provisional' AND user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PipelineError::StoreError(format!("Failed to compute pending balance: {}", e)))?;

        Ok(LedgerSummary {
            total: row.try_get::<f64, _>("total").unwrap_or(0.0),
            count: row.try_get::<i64, _>("count").unwrap_or(0) as u64,
        })
    }
}
