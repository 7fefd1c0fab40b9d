//! Account data model.
//!
//! An account holds a merchant's funds in a single currency. Balances are
//! mutated only through the balance ledger, which reads the row under an
//! exclusive lock before applying the arithmetic below.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::LedgerError;

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Belongs to one merchant (via `merchant_id`)
/// - Holds exactly one currency
/// - Has a fixed-point decimal balance (NUMERIC column, never floats)
///
/// # Balance Invariant
///
/// The balance is never negative. [`Account::debit`] rejects any amount the
/// balance does not cover, and the database backs this up with a CHECK
/// constraint.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Foreign key to the merchant that owns this account
    pub merchant_id: Uuid,

    /// Currency code (ISO 4217, 3 letters)
    pub currency: String,

    /// Current balance as a fixed-point decimal
    pub balance: Decimal,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Add `amount` to the balance. Credits cannot fail.
    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
    }

    /// Remove `amount` from the balance.
    ///
    /// Fails with [`LedgerError::InsufficientFunds`] and leaves the balance
    /// unchanged when `balance - amount` would be negative.
    pub fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance -= amount;
        Ok(())
    }
}
