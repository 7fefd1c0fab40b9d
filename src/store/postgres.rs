//! PostgreSQL adapter for the settlement store ports.
//!
//! All multi-step operations run inside an explicit database transaction;
//! dropping the `sqlx::Transaction` on an error path rolls everything back,
//! so no partial settlement is ever observable.

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::card::Card;
use crate::models::customer::Customer;
use crate::models::transaction::{Transaction, TransactionStatus};
use crate::models::webhook::{NewWebhookAttempt, WebhookAttempt};
use crate::services::ledger::{self, LedgerEntity};
use crate::store::{
    CardStore, CustomerStore, StoreError, TransactionStore, WebhookAttemptStore,
};

/// Settlement store backed by the application's connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn find_all_pending(&self) -> Result<Vec<Transaction>, StoreError> {
        let pending = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE status = $1 ORDER BY created_at",
        )
        .bind(TransactionStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(pending)
    }

    async fn commit_settlement(
        &self,
        transaction: &Transaction,
        status: TransactionStatus,
        target: LedgerEntity,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut db_tx = self.pool.begin().await?;

        // Claim the transaction: compare-and-set out of pending. Zero rows
        // means another cycle got here first and we must not touch balances.
        let settled = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = $1,
                updated_at = NOW()
            WHERE id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(transaction.id)
        .bind(TransactionStatus::Pending)
        .fetch_optional(&mut *db_tx)
        .await?;

        let Some(settled) = settled else {
            db_tx.rollback().await?;
            return Ok(None);
        };

        // Serialize settlements touching this merchant account. The credit
        // below takes its own row lock on the actual target, which may be
        // the card instead.
        sqlx::query("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(settled.account_id)
            .execute(&mut *db_tx)
            .await?;

        ledger::credit(&mut db_tx, target, settled.amount).await?;

        db_tx.commit().await?;

        Ok(Some(settled))
    }
}

#[async_trait]
impl CardStore for PgStore {
    async fn find_card(&self, id: Uuid) -> Result<Option<Card>, StoreError> {
        let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(card)
    }
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }
}

#[async_trait]
impl WebhookAttemptStore for PgStore {
    async fn max_attempt_number(&self, transaction_id: Uuid) -> Result<Option<i32>, StoreError> {
        let max = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(attempt_number) FROM webhook_attempts WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(max)
    }

    async fn record_attempt(
        &self,
        attempt: NewWebhookAttempt,
    ) -> Result<WebhookAttempt, StoreError> {
        let recorded = sqlx::query_as::<_, WebhookAttempt>(
            r#"
            INSERT INTO webhook_attempts (
                transaction_id,
                attempt_number,
                notification_url,
                request_body,
                transaction_status,
                delivery_status,
                response_body
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(attempt.transaction_id)
        .bind(attempt.attempt_number)
        .bind(&attempt.notification_url)
        .bind(&attempt.request_body)
        .bind(attempt.transaction_status)
        .bind(attempt.delivery_status)
        .bind(&attempt.response_body)
        .fetch_one(&self.pool)
        .await?;

        Ok(recorded)
    }
}
