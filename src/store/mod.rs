//! Store ports consumed by the settlement engine and the webhook delivery
//! pipeline.
//!
//! The engine is generic over these traits so the core logic can be driven
//! against an in-memory store in tests while production uses the PostgreSQL
//! adapter in [`postgres`]. Handlers and payment initiation talk to the
//! database directly (they are plain request/response glue); only the
//! background core goes through ports.

pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::card::Card;
use crate::models::customer::Customer;
use crate::models::transaction::{Transaction, TransactionStatus};
use crate::models::webhook::{NewWebhookAttempt, WebhookAttempt};
use crate::services::ledger::LedgerEntity;

/// Errors surfaced by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Transaction rows as the settlement engine sees them.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Snapshot of every transaction still awaiting settlement.
    async fn find_all_pending(&self) -> Result<Vec<Transaction>, StoreError>;

    /// Settle one transaction in a single atomic unit of work:
    ///
    /// 1. Claim it by moving `status` out of `Pending` (a compare-and-set),
    ///    so a transaction another cycle already claimed yields `Ok(None)`
    ///    and nothing else happens
    /// 2. Lock the owning account row
    /// 3. Apply the settlement credit to `target`
    ///
    /// Returns the updated transaction row on success. Any error rolls the
    /// whole unit back, leaving the row pending for a later cycle.
    async fn commit_settlement(
        &self,
        transaction: &Transaction,
        status: TransactionStatus,
        target: LedgerEntity,
    ) -> Result<Option<Transaction>, StoreError>;
}

/// Card lookups for notification payloads.
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn find_card(&self, id: Uuid) -> Result<Option<Card>, StoreError>;
}

/// Customer lookups for notification payloads.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;
}

/// Durable webhook attempt history.
#[async_trait]
pub trait WebhookAttemptStore: Send + Sync {
    /// Highest attempt number recorded for a transaction, `None` when no
    /// attempt exists yet. Derived from persisted rows, not in-memory
    /// state, so numbering is restart-safe.
    async fn max_attempt_number(&self, transaction_id: Uuid) -> Result<Option<i32>, StoreError>;

    /// Append one attempt record. Attempt rows are never updated.
    async fn record_attempt(
        &self,
        attempt: NewWebhookAttempt,
    ) -> Result<WebhookAttempt, StoreError>;
}

/// Everything the settlement core needs from storage.
pub trait SettlementStore:
    TransactionStore + CardStore + CustomerStore + WebhookAttemptStore
{
}

impl<T> SettlementStore for T where
    T: TransactionStore + CardStore + CustomerStore + WebhookAttemptStore
{
}
