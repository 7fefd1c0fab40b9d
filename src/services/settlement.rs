//! Settlement orchestrator.
//!
//! The periodic driver of the system. Each cycle takes a snapshot of the
//! pending transactions and runs an independent pipeline per transaction:
//!
//! ```text
//! pending → (resolve) → {approved, failed} → (ledger credit) → (notify)
//! ```
//!
//! The status write and the balance credit commit as one unit of work; the
//! webhook notification runs after that commit and can never roll it back.
//! One transaction's failure never halts the rest of the cycle.
//!
//! Cycles are allowed to overlap; a slow cycle does not delay the next
//! tick. The compare-and-set claim inside `commit_settlement` plus the row
//! locks in the ledger make overlapping cycles safe: a transaction leaves
//! `pending` exactly once, whichever cycle wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::models::transaction::{Transaction, TransactionStatus, TransactionType};
use crate::services::ledger::LedgerEntity;
use crate::services::resolver::OutcomeResolver;
use crate::services::webhook::WebhookNotifier;
use crate::store::{SettlementStore, StoreError};

/// Errors terminal to a single transaction's settlement pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// The (status × type) routing saw a status that is not a terminal
    /// settlement outcome. This is a programming-invariant violation, not a
    /// recoverable business error.
    #[error("invalid status {0:?} for settlement")]
    InvalidState(TransactionStatus),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which balance the settlement credit goes to, by (status × type):
///
/// | status   | type    | credited            |
/// |----------|---------|---------------------|
/// | approved | top-up  | merchant account    |
/// | failed   | top-up  | card (refund)       |
/// | approved | payout  | card                |
/// | failed   | payout  | account (refund)    |
///
/// The debit already happened at initiation, so settlement only ever
/// credits, either forwarding the funds or refunding them.
pub fn credit_target(
    transaction: &Transaction,
    status: TransactionStatus,
) -> Result<LedgerEntity, SettlementError> {
    match (status, transaction.transaction_type) {
        (TransactionStatus::Approved, TransactionType::TopUp) => {
            Ok(LedgerEntity::Account(transaction.account_id))
        }
        (TransactionStatus::Failed, TransactionType::TopUp) => {
            Ok(LedgerEntity::Card(transaction.card_id))
        }
        (TransactionStatus::Approved, TransactionType::PayOut) => {
            Ok(LedgerEntity::Card(transaction.card_id))
        }
        (TransactionStatus::Failed, TransactionType::PayOut) => {
            Ok(LedgerEntity::Account(transaction.account_id))
        }
        (TransactionStatus::Pending, _) => {
            Err(SettlementError::InvalidState(TransactionStatus::Pending))
        }
    }
}

/// Settlement engine: resolves, settles and notifies pending transactions.
///
/// Generic over the store ports and the outcome resolver so the whole
/// pipeline runs unchanged against the in-memory store in tests.
pub struct SettlementEngine<S, R> {
    store: Arc<S>,
    resolver: Arc<R>,
    notifier: WebhookNotifier<S>,
    max_in_flight: usize,
}

impl<S, R> SettlementEngine<S, R>
where
    S: SettlementStore + 'static,
    R: OutcomeResolver + 'static,
{
    pub fn new(
        store: Arc<S>,
        resolver: R,
        notifier: WebhookNotifier<S>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            store,
            resolver: Arc::new(resolver),
            notifier,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Run one settlement cycle to completion.
    ///
    /// Fetches the pending snapshot, fans the transactions out onto a task
    /// set capped at `max_in_flight`, and joins every pipeline before
    /// returning; the cycle is only complete once all of its work is.
    pub async fn run_cycle(&self) {
        let pending = match self.store.find_all_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch pending transactions");
                return;
            }
        };

        if pending.is_empty() {
            return;
        }
        tracing::info!(count = pending.len(), "Processing pending transactions");

        let mut pipelines = JoinSet::new();
        for transaction in pending {
            if pipelines.len() >= self.max_in_flight {
                pipelines.join_next().await;
            }

            let store = self.store.clone();
            let resolver = self.resolver.clone();
            let notifier = self.notifier.clone();
            pipelines.spawn(async move {
                settle_one(store, resolver, notifier, transaction).await;
            });
        }

        // Join point: the cycle is complete once every pipeline finished.
        while pipelines.join_next().await.is_some() {}
    }
}

/// One transaction's settlement pipeline: resolve, commit, notify.
async fn settle_one<S, R>(
    store: Arc<S>,
    resolver: Arc<R>,
    notifier: WebhookNotifier<S>,
    transaction: Transaction,
) where
    S: SettlementStore,
    R: OutcomeResolver,
{
    let transaction_id = transaction.id;
    tracing::info!(%transaction_id, status = ?transaction.status, "Processing transaction");

    // The snapshot should only ever hand us pending rows.
    if transaction.status != TransactionStatus::Pending {
        tracing::error!(%transaction_id, status = ?transaction.status, "Transaction is not pending, skipping");
        return;
    }

    let status = resolver.resolve(&transaction);
    let target = match credit_target(&transaction, status) {
        Ok(target) => target,
        Err(e) => {
            tracing::error!(%transaction_id, error = %e, "Settlement aborted");
            return;
        }
    };

    match store.commit_settlement(&transaction, status, target).await {
        Ok(Some(settled)) => {
            tracing::info!(%transaction_id, status = ?settled.status, "Transaction settled");
            // Settlement is committed; delivery failures are absorbed
            // inside the notifier and cannot undo it.
            notifier.deliver(&settled).await;
        }
        Ok(None) => {
            tracing::info!(%transaction_id, "Transaction already claimed by another cycle, skipping");
        }
        Err(e) => {
            // Infrastructure error before the status write committed: the
            // row is still pending and a later cycle will retry it.
            tracing::error!(%transaction_id, error = %e, "Settlement failed, will retry next cycle");
        }
    }
}

/// Scheduler loop: initial delay, then one cycle per period.
///
/// Each tick spawns its cycle instead of awaiting it, so a cycle that
/// outlives the period overlaps the next one rather than pushing the
/// schedule back.
pub async fn run<S, R>(
    engine: Arc<SettlementEngine<S, R>>,
    initial_delay: Duration,
    period: Duration,
) where
    S: SettlementStore + 'static,
    R: OutcomeResolver + 'static,
{
    tracing::info!(?period, ?initial_delay, "Settlement scheduler starting");
    tokio::time::sleep(initial_delay).await;

    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_cycle().await });
    }
}
