//! Shared test fixtures: an in-memory settlement store and a deterministic
//! outcome resolver, so the engine and the delivery pipeline run without a
//! database or a payment rail.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use settlement_service::error::LedgerError;
use settlement_service::models::account::Account;
use settlement_service::models::card::Card;
use settlement_service::models::customer::Customer;
use settlement_service::models::transaction::{
    Transaction, TransactionStatus, TransactionType,
};
use settlement_service::models::webhook::{
    NewWebhookAttempt, WebhookAttempt, WebhookDeliveryStatus,
};
use settlement_service::services::ledger::LedgerEntity;
use settlement_service::services::resolver::OutcomeResolver;
use settlement_service::store::{
    CardStore, CustomerStore, StoreError, TransactionStore, WebhookAttemptStore,
};

/// Resolver that always picks the configured terminal status.
pub struct FixedOutcomeResolver(pub TransactionStatus);

impl OutcomeResolver for FixedOutcomeResolver {
    fn resolve(&self, _transaction: &Transaction) -> TransactionStatus {
        self.0
    }
}

/// In-memory implementation of the settlement store ports.
///
/// Mirrors the PostgreSQL adapter's semantics: `commit_settlement` is a
/// compare-and-set claim plus a balance credit, all-or-nothing, and attempt
/// records are append-only.
#[derive(Default)]
pub struct MemStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
    cards: Mutex<HashMap<Uuid, Card>>,
    customers: Mutex<HashMap<Uuid, Customer>>,
    transactions: Mutex<HashMap<Uuid, Transaction>>,
    attempts: Mutex<Vec<WebhookAttempt>>,
}

impl MemStore {
    pub fn seed_account(&self, account: Account) {
        self.accounts.lock().unwrap().insert(account.id, account);
    }

    pub fn seed_card(&self, card: Card) {
        self.cards.lock().unwrap().insert(card.id, card);
    }

    pub fn seed_customer(&self, customer: Customer) {
        self.customers.lock().unwrap().insert(customer.id, customer);
    }

    pub fn seed_transaction(&self, transaction: Transaction) {
        self.transactions
            .lock()
            .unwrap()
            .insert(transaction.id, transaction);
    }

    /// Pre-populate delivery history, as if attempts had been made before a
    /// process restart.
    pub fn seed_attempts(&self, transaction: &Transaction, numbers: &[i32]) {
        let mut attempts = self.attempts.lock().unwrap();
        for &attempt_number in numbers {
            attempts.push(WebhookAttempt {
                id: Uuid::new_v4(),
                transaction_id: transaction.id,
                attempt_number,
                notification_url: transaction.notification_url.clone(),
                request_body: "{}".to_string(),
                transaction_status: transaction.status,
                delivery_status: WebhookDeliveryStatus::Failed,
                response_body: None,
                created_at: Utc::now(),
            });
        }
    }

    pub fn account_balance(&self, id: Uuid) -> Decimal {
        self.accounts.lock().unwrap()[&id].balance
    }

    pub fn card_balance(&self, id: Uuid) -> Decimal {
        self.cards.lock().unwrap()[&id].balance
    }

    pub fn transaction_status(&self, id: Uuid) -> TransactionStatus {
        self.transactions.lock().unwrap()[&id].status
    }

    pub fn recorded_attempts(&self, transaction_id: Uuid) -> Vec<WebhookAttempt> {
        let mut attempts: Vec<_> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.transaction_id == transaction_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        attempts
    }
}

#[async_trait]
impl TransactionStore for MemStore {
    async fn find_all_pending(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.status == TransactionStatus::Pending)
            .cloned()
            .collect())
    }

    async fn commit_settlement(
        &self,
        transaction: &Transaction,
        status: TransactionStatus,
        target: LedgerEntity,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut transactions = self.transactions.lock().unwrap();
        let current = transactions
            .get(&transaction.id)
            .ok_or(LedgerError::EntityNotFound("Transaction", transaction.id))?;
        if current.status != TransactionStatus::Pending {
            return Ok(None);
        }
        let amount = current.amount;

        // Credit before flipping the status so a missing entity leaves the
        // row pending, like a rolled-back database transaction would.
        match target {
            LedgerEntity::Account(id) => {
                let mut accounts = self.accounts.lock().unwrap();
                let account = accounts
                    .get_mut(&id)
                    .ok_or(LedgerError::EntityNotFound("Account", id))?;
                account.credit(amount);
            }
            LedgerEntity::Card(id) => {
                let mut cards = self.cards.lock().unwrap();
                let card = cards
                    .get_mut(&id)
                    .ok_or(LedgerError::EntityNotFound("Card", id))?;
                card.credit(amount);
            }
        }

        let current = transactions.get_mut(&transaction.id).unwrap();
        current.status = status;
        current.updated_at = Utc::now();
        Ok(Some(current.clone()))
    }
}

#[async_trait]
impl CardStore for MemStore {
    async fn find_card(&self, id: Uuid) -> Result<Option<Card>, StoreError> {
        Ok(self.cards.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl CustomerStore for MemStore {
    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl WebhookAttemptStore for MemStore {
    async fn max_attempt_number(&self, transaction_id: Uuid) -> Result<Option<i32>, StoreError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.transaction_id == transaction_id)
            .map(|a| a.attempt_number)
            .max())
    }

    async fn record_attempt(
        &self,
        attempt: NewWebhookAttempt,
    ) -> Result<WebhookAttempt, StoreError> {
        let recorded = WebhookAttempt {
            id: Uuid::new_v4(),
            transaction_id: attempt.transaction_id,
            attempt_number: attempt.attempt_number,
            notification_url: attempt.notification_url,
            request_body: attempt.request_body,
            transaction_status: attempt.transaction_status,
            delivery_status: attempt.delivery_status,
            response_body: attempt.response_body,
            created_at: Utc::now(),
        };
        self.attempts.lock().unwrap().push(recorded.clone());
        Ok(recorded)
    }
}

// ── fixture builders ──

pub fn customer() -> Customer {
    Customer {
        id: Uuid::new_v4(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        country: "DE".to_string(),
    }
}

pub fn account_with_balance(balance: Decimal) -> Account {
    Account {
        id: Uuid::new_v4(),
        merchant_id: Uuid::new_v4(),
        currency: "USD".to_string(),
        balance,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn card_with_balance(customer_id: Uuid, balance: Decimal) -> Card {
    Card {
        id: Uuid::new_v4(),
        customer_id,
        card_number: "4242424242424242".to_string(),
        exp_date: Utc::now(),
        cvv: "123".to_string(),
        currency: "USD".to_string(),
        balance,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn transaction(
    account: &Account,
    card: &Card,
    transaction_type: TransactionType,
    status: TransactionStatus,
    amount: Decimal,
    notification_url: &str,
) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        currency: "USD".to_string(),
        amount,
        notification_url: notification_url.to_string(),
        language: "en".to_string(),
        status,
        transaction_type,
        card_id: card.id,
        account_id: account.id,
    }
}
