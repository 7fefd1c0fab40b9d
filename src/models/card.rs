//! Card data model.
//!
//! Cards are the customer side of the money movement: a top-up debits a card
//! and (on approval) credits the merchant account; a payout flows the other
//! way. Cards share the non-negative balance invariant with accounts.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, LedgerError};

/// Represents a card record from the database.
///
/// Maps to the `cards` table. The full card number is stored for lookup
/// during initiation, but every outbound surface (API responses, webhook
/// payloads) only ever sees the masked form.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Card {
    pub id: Uuid,

    /// Foreign key to the customer that owns this card
    pub customer_id: Uuid,

    #[serde(skip_serializing)]
    pub card_number: String,

    /// Expiry as the last valid instant of the card's expiry month
    pub exp_date: DateTime<Utc>,

    #[serde(skip_serializing)]
    pub cvv: String,

    /// Currency code (ISO 4217, 3 letters)
    pub currency: String,

    /// Current balance as a fixed-point decimal, never negative
    pub balance: Decimal,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Card {
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

    /// Masked card number: all but the last four digits replaced with `*`.
    ///
    /// This is the only form of the card number that leaves the service.
    pub fn masked_number(&self) -> String {
        let number = &self.card_number;
        if number.len() <= 4 {
            return number.clone();
        }
        let (head, tail) = number.split_at(number.len() - 4);
        format!("{}{}", "*".repeat(head.len()), tail)
    }
}

/// Parse a `MM/yy` expiry string into the card's expiry instant.
///
/// A card expires at the end of its expiry month, so `12/26` becomes
/// `2026-12-31T23:59:00Z` (one minute before the first day of the next
/// month).
pub fn parse_exp_date(exp_date: &str) -> Result<DateTime<Utc>, AppError> {
    let invalid = || AppError::InvalidRequest(format!("Invalid expiry date: {exp_date}"));

    let (month, year) = exp_date.split_once('/').ok_or_else(invalid)?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let year: i32 = year.parse::<i32>().map_err(|_| invalid())? + 2000;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(invalid)?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(invalid)?;

    Ok(Utc.from_utc_datetime(&(first_of_next - Duration::minutes(1))))
}
