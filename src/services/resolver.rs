//! Transaction outcome resolution.
//!
//! Deciding whether a pending transaction is approved or failed belongs to a
//! payment network this service does not integrate with, so the decision is
//! behind a trait. Production wiring uses [`RandomOutcomeResolver`], a
//! uniform coin flip standing in for the real rail; a genuine integration
//! replaces the implementation without touching the settlement engine.

use crate::models::transaction::{Transaction, TransactionStatus};

/// Policy deciding the terminal status of a pending transaction.
///
/// Implementations must return `Approved` or `Failed`, never `Pending`. The
/// engine only calls this for transactions that are still pending in the
/// cycle snapshot, and persists the result before any state-dependent step
/// runs, so a resolver is never asked about the same transaction twice.
pub trait OutcomeResolver: Send + Sync {
    fn resolve(&self, transaction: &Transaction) -> TransactionStatus;
}

/// Uniformly random approval/failure decision.
pub struct RandomOutcomeResolver;

impl OutcomeResolver for RandomOutcomeResolver {
    fn resolve(&self, _transaction: &Transaction) -> TransactionStatus {
        if rand::random::<bool>() {
            TransactionStatus::Approved
        } else {
            TransactionStatus::Failed
        }
    }
}
