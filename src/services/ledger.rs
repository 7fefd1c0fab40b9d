//! Balance ledger: exclusive, lock-scoped mutation of account and card
//! balances.
//!
//! Both operations read the target row with `SELECT ... FOR UPDATE` so that
//! concurrent settlements of the same entity serialize instead of
//! interleaving, then persist the new balance inside the caller's database
//! transaction. Nothing is observable until that transaction commits.
//!
//! Debits enforce the non-negative invariant and fail with
//! [`LedgerError::InsufficientFunds`] without writing anything; credits
//! cannot fail on balance grounds.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::account::Account;
use crate::models::card::Card;

/// Reference to the entity whose balance a ledger operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntity {
    Account(Uuid),
    Card(Uuid),
}

/// Credit `amount` to the target entity and return the new balance.
pub async fn credit(
    db_tx: &mut DbTransaction<'_, Postgres>,
    entity: LedgerEntity,
    amount: Decimal,
) -> Result<Decimal, LedgerError> {
    match entity {
        LedgerEntity::Account(id) => {
            let mut account = lock_account(db_tx, id).await?;
            account.credit(amount);
            save_account_balance(db_tx, id, account.balance).await?;
            Ok(account.balance)
        }
        LedgerEntity::Card(id) => {
            let mut card = lock_card(db_tx, id).await?;
            card.credit(amount);
            save_card_balance(db_tx, id, card.balance).await?;
            Ok(card.balance)
        }
    }
}

/// Debit `amount` from the target entity and return the new balance.
///
/// Fails with [`LedgerError::InsufficientFunds`] when the balance does not
/// cover the amount; the row is left untouched in that case (the lock is
/// released when the caller's transaction ends).
pub async fn debit(
    db_tx: &mut DbTransaction<'_, Postgres>,
    entity: LedgerEntity,
    amount: Decimal,
) -> Result<Decimal, LedgerError> {
    match entity {
        LedgerEntity::Account(id) => {
            let mut account = lock_account(db_tx, id).await?;
            account.debit(amount)?;
            save_account_balance(db_tx, id, account.balance).await?;
            Ok(account.balance)
        }
        LedgerEntity::Card(id) => {
            let mut card = lock_card(db_tx, id).await?;
            card.debit(amount)?;
            save_card_balance(db_tx, id, card.balance).await?;
            Ok(card.balance)
        }
    }
}

async fn lock_account(
    db_tx: &mut DbTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Account, LedgerError> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **db_tx)
        .await?
        .ok_or(LedgerError::EntityNotFound("Account", id))
}

async fn lock_card(
    db_tx: &mut DbTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Card, LedgerError> {
    sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **db_tx)
        .await?
        .ok_or(LedgerError::EntityNotFound("Card", id))
}

async fn save_account_balance(
    db_tx: &mut DbTransaction<'_, Postgres>,
    id: Uuid,
    balance: Decimal,
) -> Result<(), LedgerError> {
    sqlx::query("UPDATE accounts SET balance = $1, updated_at = NOW() WHERE id = $2")
        .bind(balance)
        .bind(id)
        .execute(&mut **db_tx)
        .await?;
    Ok(())
}

async fn save_card_balance(
    db_tx: &mut DbTransaction<'_, Postgres>,
    id: Uuid,
    balance: Decimal,
) -> Result<(), LedgerError> {
    sqlx::query("UPDATE cards SET balance = $1, updated_at = NOW() WHERE id = $2")
        .bind(balance)
        .bind(id)
        .execute(&mut **db_tx)
        .await?;
    Ok(())
}
