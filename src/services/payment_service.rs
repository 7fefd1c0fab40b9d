//! Payment initiation and transaction queries.
//!
//! Initiation is the debit side of the money movement: a top-up debits the
//! customer card, a payout debits the merchant account, and either creates
//! the pending transaction the settlement engine later picks up. The debit
//! and the insert commit as one database transaction at REPEATABLE READ, so
//! a transaction row only ever exists with its funds already reserved.

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::account::Account;
use crate::models::card::{self, Card};
use crate::models::customer::Customer;
use crate::models::transaction::{
    CardData, CardNumberData, CustomerData, PaymentResponse, PayoutRequest, TopUpRequest,
    Transaction, TransactionResponse, TransactionStatus, TransactionType,
};
use crate::services::ledger::{self, LedgerEntity};

/// Query parameters for the transaction list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Range start as unix seconds (inclusive)
    pub from: Option<i64>,

    /// Range end as unix seconds (inclusive)
    pub to: Option<i64>,

    #[serde(default)]
    pub page: u32,

    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    50
}

/// Initiate a top-up: debit the customer card, create a pending
/// transaction.
///
/// # Process
///
/// 1. Resolve the merchant account for the requested currency
/// 2. Find or create the customer (identified by name + country)
/// 3. Find the card by number and currency; an unknown card is created
///    with a zero balance, so the debit below rejects it
/// 4. Debit the card and insert the pending transaction atomically
pub async fn top_up(
    pool: &DbPool,
    merchant_id: Uuid,
    request: TopUpRequest,
) -> Result<PaymentResponse, AppError> {
    let amount = validate_amount(request.amount)?;
    validate_notification_url(&request.notification_url)?;

    let account = find_account(pool, merchant_id, &request.currency)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Merchant account with this currency does not exist".to_string())
        })?;
    let customer = find_or_create_customer(pool, &request.customer).await?;
    let card = match find_card(pool, &request.card_data.card_number, &request.currency).await? {
        Some(card) => card,
        None => create_card(pool, &request.card_data, &request.currency, customer.id).await?,
    };

    let transaction = debit_and_create_transaction(
        pool,
        LedgerEntity::Card(card.id),
        amount,
        &request.currency,
        &request.notification_url,
        &request.language,
        TransactionType::TopUp,
        card.id,
        account.id,
    )
    .await?;

    tracing::info!(transaction_id = %transaction.id, "Top-up accepted for processing");
    Ok(payment_response(&transaction))
}

/// Initiate a payout: debit the merchant account, create a pending
/// transaction.
///
/// Payouts require the customer and the card to already exist.
pub async fn pay_out(
    pool: &DbPool,
    merchant_id: Uuid,
    request: PayoutRequest,
) -> Result<PaymentResponse, AppError> {
    let amount = validate_amount(request.amount)?;
    validate_notification_url(&request.notification_url)?;

    let country = request
        .customer
        .country
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("Customer country is required".to_string()))?;
    find_customer(pool, &request.customer.first_name, &request.customer.last_name, country)
        .await?
        .ok_or_else(|| AppError::NotFound("There is no such customer".to_string()))?;

    let card = find_card(pool, &request.card_data.card_number, &request.currency)
        .await?
        .ok_or_else(|| AppError::NotFound("There is no such card".to_string()))?;
    let account = find_account(pool, merchant_id, &request.currency)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Merchant account with this currency does not exist".to_string())
        })?;

    let transaction = debit_and_create_transaction(
        pool,
        LedgerEntity::Account(account.id),
        amount,
        &request.currency,
        &request.notification_url,
        &request.language,
        TransactionType::PayOut,
        card.id,
        account.id,
    )
    .await?;

    tracing::info!(transaction_id = %transaction.id, "Payout accepted for processing");
    Ok(payment_response(&transaction))
}

/// Fetch one transaction of the given type, scoped to the merchant.
pub async fn get_transaction(
    pool: &DbPool,
    merchant_id: Uuid,
    transaction_id: Uuid,
    transaction_type: TransactionType,
) -> Result<TransactionResponse, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT t.* FROM transactions t
        JOIN accounts a ON a.id = t.account_id
        WHERE t.id = $1 AND t.transaction_type = $2 AND a.merchant_id = $3
        "#,
    )
    .bind(transaction_id)
    .bind(transaction_type)
    .bind(merchant_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Transaction was not found".to_string()))?;

    to_response(pool, transaction).await
}

/// List the merchant's transactions of the given type, newest first, with
/// optional created-at range and page/size pagination.
pub async fn list_transactions(
    pool: &DbPool,
    merchant_id: Uuid,
    transaction_type: TransactionType,
    params: &ListParams,
) -> Result<Vec<TransactionResponse>, AppError> {
    let limit = i64::from(params.size);
    let offset = i64::from(params.page) * limit;

    let transactions = match (params.from, params.to) {
        (Some(from), Some(to)) => {
            let from = chrono::DateTime::from_timestamp(from, 0)
                .ok_or_else(|| AppError::InvalidRequest("Invalid 'from' timestamp".to_string()))?;
            let to = chrono::DateTime::from_timestamp(to, 0)
                .ok_or_else(|| AppError::InvalidRequest("Invalid 'to' timestamp".to_string()))?;
            sqlx::query_as::<_, Transaction>(
                r#"
                SELECT t.* FROM transactions t
                JOIN accounts a ON a.id = t.account_id
                WHERE a.merchant_id = $1 AND t.transaction_type = $2
                  AND t.created_at BETWEEN $3 AND $4
                ORDER BY t.created_at DESC
                LIMIT $5 OFFSET $6
                "#,
            )
            .bind(merchant_id)
            .bind(transaction_type)
            .bind(from)
            .bind(to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        _ => {
            sqlx::query_as::<_, Transaction>(
                r#"
                SELECT t.* FROM transactions t
                JOIN accounts a ON a.id = t.account_id
                WHERE a.merchant_id = $1 AND t.transaction_type = $2
                ORDER BY t.created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(merchant_id)
            .bind(transaction_type)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    let mut responses = Vec::with_capacity(transactions.len());
    for transaction in transactions {
        responses.push(to_response(pool, transaction).await?);
    }
    Ok(responses)
}

/// Debit the funding entity and insert the pending transaction in one unit
/// of work.
///
/// The debit runs at REPEATABLE READ on top of the explicit row lock taken
/// by the ledger. If the balance does not cover the amount, nothing is
/// written and the caller gets `InsufficientFunds`.
#[allow(clippy::too_many_arguments)]
async fn debit_and_create_transaction(
    pool: &DbPool,
    debit_from: LedgerEntity,
    amount: Decimal,
    currency: &str,
    notification_url: &str,
    language: &str,
    transaction_type: TransactionType,
    card_id: Uuid,
    account_id: Uuid,
) -> Result<Transaction, AppError> {
    let mut db_tx = pool.begin().await?;

    // Stricter isolation for the funding calculation; must be the first
    // statement of the transaction.
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
        .execute(&mut *db_tx)
        .await?;

    ledger::debit(&mut db_tx, debit_from, amount).await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            currency,
            amount,
            notification_url,
            language,
            status,
            transaction_type,
            card_id,
            account_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(currency)
    .bind(amount)
    .bind(notification_url)
    .bind(language)
    .bind(TransactionStatus::Pending)
    .bind(transaction_type)
    .bind(card_id)
    .bind(account_id)
    .fetch_one(&mut *db_tx)
    .await?;

    db_tx.commit().await?;

    Ok(transaction)
}

async fn find_account(
    pool: &DbPool,
    merchant_id: Uuid,
    currency: &str,
) -> Result<Option<Account>, AppError> {
    let account = sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE merchant_id = $1 AND currency = $2",
    )
    .bind(merchant_id)
    .bind(currency)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

async fn find_customer(
    pool: &DbPool,
    first_name: &str,
    last_name: &str,
    country: &str,
) -> Result<Option<Customer>, AppError> {
    let customer = sqlx::query_as::<_, Customer>(
        "SELECT * FROM customers WHERE first_name = $1 AND last_name = $2 AND country = $3",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(country)
    .fetch_optional(pool)
    .await?;

    Ok(customer)
}

async fn find_or_create_customer(
    pool: &DbPool,
    data: &CustomerData,
) -> Result<Customer, AppError> {
    let country = data
        .country
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("Customer country is required".to_string()))?;

    if let Some(customer) = find_customer(pool, &data.first_name, &data.last_name, country).await? {
        return Ok(customer);
    }

    let customer = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (first_name, last_name, country)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&data.first_name)
    .bind(&data.last_name)
    .bind(country)
    .fetch_one(pool)
    .await?;

    tracing::info!(customer_id = %customer.id, "Customer created");
    Ok(customer)
}

async fn find_card(
    pool: &DbPool,
    card_number: &str,
    currency: &str,
) -> Result<Option<Card>, AppError> {
    let card = sqlx::query_as::<_, Card>(
        "SELECT * FROM cards WHERE card_number = $1 AND currency = $2",
    )
    .bind(card_number)
    .bind(currency)
    .fetch_optional(pool)
    .await?;

    Ok(card)
}

/// Create a card with a zero balance for a first-seen card number.
///
/// The subsequent debit is guaranteed to fail with InsufficientFunds, but
/// the card (and its customer) stick around for future movements.
async fn create_card(
    pool: &DbPool,
    data: &CardData,
    currency: &str,
    customer_id: Uuid,
) -> Result<Card, AppError> {
    let exp_date = data
        .exp_date
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("Card expiry date is required".to_string()))?;
    let exp_date = card::parse_exp_date(exp_date)?;
    let cvv = data
        .cvv
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("Card cvv is required".to_string()))?;

    let card = sqlx::query_as::<_, Card>(
        r#"
        INSERT INTO cards (customer_id, card_number, exp_date, cvv, currency, balance)
        VALUES ($1, $2, $3, $4, $5, 0)
        RETURNING *
        "#,
    )
    .bind(customer_id)
    .bind(&data.card_number)
    .bind(exp_date)
    .bind(cvv)
    .bind(currency)
    .fetch_one(pool)
    .await?;

    tracing::info!(card_id = %card.id, "Card created");
    Ok(card)
}

async fn to_response(pool: &DbPool, transaction: Transaction) -> Result<TransactionResponse, AppError> {
    let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
        .bind(transaction.card_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Card was not found".to_string()))?;
    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(card.customer_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer was not found".to_string()))?;

    Ok(TransactionResponse {
        payment_method: "CARD".to_string(),
        amount: transaction.amount,
        currency: transaction.currency,
        transaction_id: transaction.id,
        created_at: transaction.created_at,
        updated_at: transaction.updated_at,
        notification_url: transaction.notification_url,
        card_data: CardNumberData {
            card_number: card.masked_number(),
        },
        language: transaction.language,
        customer: CustomerData {
            first_name: customer.first_name,
            last_name: customer.last_name,
            country: Some(customer.country),
        },
        status: transaction.status,
        message: "OK".to_string(),
    })
}

fn payment_response(transaction: &Transaction) -> PaymentResponse {
    PaymentResponse {
        transaction_id: transaction.id,
        status: transaction.status,
        message: "OK".to_string(),
    }
}

fn validate_amount(amount: i64) -> Result<Decimal, AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(Decimal::from(amount))
}

/// Validate a merchant notification URL.
///
/// # Rules
///
/// - Must be a valid URL
/// - Must be HTTPS (HTTP allowed for loopback hosts in development)
/// - Maximum 2048 characters
fn validate_notification_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidRequest(
            "Notification URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidRequest("Invalid notification URL".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            // Allow HTTP for localhost/127.0.0.1 (testing)
            if parsed.host_str() == Some("localhost")
                || parsed.host_str() == Some("127.0.0.1")
                || parsed.host_str() == Some("0.0.0.0")
            {
                Ok(())
            } else {
                Err(AppError::InvalidRequest(
                    "HTTP notification URLs are only allowed for localhost".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidRequest(
            "Notification URL must use HTTP or HTTPS".to_string(),
        )),
    }
}
