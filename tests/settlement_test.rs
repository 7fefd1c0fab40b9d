//! Settlement engine integration tests.
//!
//! Drives full settlement cycles against the in-memory store with a
//! deterministic resolver and a mockito webhook endpoint, checking the
//! monetary invariants from every (status × type) combination.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use settlement_service::models::transaction::{TransactionStatus, TransactionType};
use settlement_service::models::webhook::WebhookDeliveryStatus;
use settlement_service::services::settlement::SettlementEngine;
use settlement_service::services::webhook::{RetryPolicy, WebhookNotifier};
use settlement_service::store::TransactionStore;

use common::{FixedOutcomeResolver, MemStore};

fn test_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(5),
    }
}

fn engine(
    store: &Arc<MemStore>,
    outcome: TransactionStatus,
) -> SettlementEngine<MemStore, FixedOutcomeResolver> {
    let notifier = WebhookNotifier::new(store.clone(), test_policy());
    SettlementEngine::new(store.clone(), FixedOutcomeResolver(outcome), notifier, 8)
}

/// Seed a complete settlement scenario: merchant account, customer, card
/// and one pending transaction pointing at the mock endpoint.
fn seed(
    store: &MemStore,
    account_balance: rust_decimal::Decimal,
    card_balance: rust_decimal::Decimal,
    transaction_type: TransactionType,
    amount: rust_decimal::Decimal,
    url: &str,
) -> (uuid::Uuid, uuid::Uuid, uuid::Uuid) {
    let customer = common::customer();
    let account = common::account_with_balance(account_balance);
    let card = common::card_with_balance(customer.id, card_balance);
    let transaction = common::transaction(
        &account,
        &card,
        transaction_type,
        TransactionStatus::Pending,
        amount,
        url,
    );
    let ids = (account.id, card.id, transaction.id);
    store.seed_customer(customer);
    store.seed_account(account);
    store.seed_card(card);
    store.seed_transaction(transaction);
    ids
}

#[tokio::test]
async fn approved_top_up_credits_the_merchant_account() {
    let mut server = mockito::Server::new_async().await;
    let hook = server
        .mock("POST", "/hook")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let store = Arc::new(MemStore::default());
    let url = format!("{}/hook", server.url());
    let (account_id, card_id, transaction_id) = seed(
        &store,
        dec!(1000.00),
        dec!(200.00),
        TransactionType::TopUp,
        dec!(150.00),
        &url,
    );

    engine(&store, TransactionStatus::Approved).run_cycle().await;

    assert_eq!(store.account_balance(account_id), dec!(1150.00));
    assert_eq!(store.card_balance(card_id), dec!(200.00));
    assert_eq!(
        store.transaction_status(transaction_id),
        TransactionStatus::Approved
    );

    let attempts = store.recorded_attempts(transaction_id);
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].attempt_number, 1);
    assert_eq!(attempts[0].delivery_status, WebhookDeliveryStatus::Successful);
    hook.assert_async().await;
}

#[tokio::test]
async fn failed_top_up_refunds_the_card() {
    let mut server = mockito::Server::new_async().await;
    let _hook = server
        .mock("POST", "/hook")
        .with_status(200)
        .create_async()
        .await;

    let store = Arc::new(MemStore::default());
    let url = format!("{}/hook", server.url());
    // Card already debited by 500.00 at initiation, sitting at 200.00
    let (account_id, card_id, transaction_id) = seed(
        &store,
        dec!(1000.00),
        dec!(200.00),
        TransactionType::TopUp,
        dec!(500.00),
        &url,
    );

    engine(&store, TransactionStatus::Failed).run_cycle().await;

    assert_eq!(store.card_balance(card_id), dec!(700.00));
    assert_eq!(store.account_balance(account_id), dec!(1000.00));
    assert_eq!(
        store.transaction_status(transaction_id),
        TransactionStatus::Failed
    );
}

#[tokio::test]
async fn approved_payout_credits_the_card() {
    let mut server = mockito::Server::new_async().await;
    let _hook = server
        .mock("POST", "/hook")
        .with_status(200)
        .create_async()
        .await;

    let store = Arc::new(MemStore::default());
    let url = format!("{}/hook", server.url());
    // Account already debited by 150.00 at initiation: 1000.00 -> 850.00
    let (account_id, card_id, _) = seed(
        &store,
        dec!(850.00),
        dec!(0.00),
        TransactionType::PayOut,
        dec!(150.00),
        &url,
    );

    engine(&store, TransactionStatus::Approved).run_cycle().await;

    assert_eq!(store.card_balance(card_id), dec!(150.00));
    assert_eq!(store.account_balance(account_id), dec!(850.00));
}

#[tokio::test]
async fn failed_payout_refunds_the_account() {
    let mut server = mockito::Server::new_async().await;
    let _hook = server
        .mock("POST", "/hook")
        .with_status(200)
        .create_async()
        .await;

    let store = Arc::new(MemStore::default());
    let url = format!("{}/hook", server.url());
    let (account_id, card_id, _) = seed(
        &store,
        dec!(850.00),
        dec!(0.00),
        TransactionType::PayOut,
        dec!(150.00),
        &url,
    );

    engine(&store, TransactionStatus::Failed).run_cycle().await;

    assert_eq!(store.account_balance(account_id), dec!(1000.00));
    assert_eq!(store.card_balance(card_id), dec!(0.00));
}

#[tokio::test]
async fn a_transaction_is_settled_exactly_once() {
    let mut server = mockito::Server::new_async().await;
    let _hook = server
        .mock("POST", "/hook")
        .with_status(200)
        .create_async()
        .await;

    let store = Arc::new(MemStore::default());
    let url = format!("{}/hook", server.url());
    let (account_id, _, transaction_id) = seed(
        &store,
        dec!(1000.00),
        dec!(200.00),
        TransactionType::TopUp,
        dec!(150.00),
        &url,
    );

    // Keep a stale pending snapshot, as an overlapping cycle would hold
    let stale = store.find_all_pending().await.unwrap().pop().unwrap();

    engine(&store, TransactionStatus::Approved).run_cycle().await;
    assert_eq!(store.account_balance(account_id), dec!(1150.00));

    // The overlapping cycle loses the claim and must not credit again
    let claimed = store
        .commit_settlement(
            &stale,
            TransactionStatus::Approved,
            settlement_service::services::ledger::LedgerEntity::Account(account_id),
        )
        .await
        .unwrap();
    assert!(claimed.is_none());
    assert_eq!(store.account_balance(account_id), dec!(1150.00));
    assert_eq!(
        store.transaction_status(transaction_id),
        TransactionStatus::Approved
    );

    // A follow-up cycle sees nothing to do
    assert!(store.find_all_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn store_failure_leaves_the_transaction_pending() {
    let store = Arc::new(MemStore::default());
    let customer = common::customer();
    let account = common::account_with_balance(dec!(1000.00));
    let card = common::card_with_balance(customer.id, dec!(200.00));
    let transaction = common::transaction(
        &account,
        &card,
        TransactionType::TopUp,
        TransactionStatus::Pending,
        dec!(150.00),
        "http://127.0.0.1:9/hook",
    );
    let transaction_id = transaction.id;
    // The account the credit would land on is missing from the store
    store.seed_customer(customer);
    store.seed_card(card);
    store.seed_transaction(transaction);

    engine(&store, TransactionStatus::Approved).run_cycle().await;

    assert_eq!(
        store.transaction_status(transaction_id),
        TransactionStatus::Pending
    );
    assert!(store.recorded_attempts(transaction_id).is_empty());
}

#[tokio::test]
async fn delivery_failure_does_not_roll_back_settlement() {
    let mut server = mockito::Server::new_async().await;
    let hook = server
        .mock("POST", "/hook")
        .with_status(500)
        .with_body("upstream down")
        .expect(5)
        .create_async()
        .await;

    let store = Arc::new(MemStore::default());
    let url = format!("{}/hook", server.url());
    let (account_id, _, transaction_id) = seed(
        &store,
        dec!(1000.00),
        dec!(200.00),
        TransactionType::TopUp,
        dec!(150.00),
        &url,
    );

    engine(&store, TransactionStatus::Approved).run_cycle().await;

    // Settlement stands even though every delivery attempt failed
    assert_eq!(store.account_balance(account_id), dec!(1150.00));
    assert_eq!(
        store.transaction_status(transaction_id),
        TransactionStatus::Approved
    );

    let attempts = store.recorded_attempts(transaction_id);
    assert_eq!(attempts.len(), 5);
    assert!(
        attempts
            .iter()
            .all(|a| a.delivery_status == WebhookDeliveryStatus::Failed)
    );
    hook.assert_async().await;
}

#[tokio::test]
async fn a_cycle_settles_every_pending_transaction_independently() {
    let mut server = mockito::Server::new_async().await;
    let _hook = server
        .mock("POST", "/hook")
        .with_status(200)
        .expect(3)
        .create_async()
        .await;

    let store = Arc::new(MemStore::default());
    let url = format!("{}/hook", server.url());
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(seed(
            &store,
            dec!(100.00),
            dec!(0.00),
            TransactionType::TopUp,
            dec!(25.00),
            &url,
        ));
    }

    engine(&store, TransactionStatus::Approved).run_cycle().await;

    for (account_id, _, transaction_id) in ids {
        assert_eq!(store.account_balance(account_id), dec!(125.00));
        assert_eq!(
            store.transaction_status(transaction_id),
            TransactionStatus::Approved
        );
    }
}
