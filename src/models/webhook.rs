//! Webhook models: the notification payload and the durable attempt log.
//!
//! # Webhook Flow
//!
//! 1. The settlement engine finalizes a transaction
//! 2. The delivery pipeline builds the payload below and POSTs it to the
//!    transaction's notification URL
//! 3. Every attempt, success or failure, is persisted as a
//!    `WebhookAttempt` row; rows are only ever inserted, never updated
//! 4. The next attempt number is derived from the persisted history, so
//!    numbering survives process restarts
//!
//! # Wire Stability
//!
//! The payload shape (field names, nesting, timestamp format) is frozen:
//! merchants parse it, and a signature scheme added later would hash these
//! exact bytes. Do not rename fields.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::models::card::Card;
use crate::models::customer::Customer;
use crate::models::transaction::{
    CardNumberData, CustomerData, Transaction, TransactionStatus,
};

/// Outcome category of one delivery attempt.
///
/// Stored as the `webhook_delivery_status` PostgreSQL enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "webhook_delivery_status", rename_all = "snake_case")]
pub enum WebhookDeliveryStatus {
    Successful,
    Failed,
}

/// One persisted webhook delivery attempt.
///
/// Maps to the `webhook_attempts` table. Append-only: the maximum
/// `attempt_number` for a transaction is derived by scanning existing rows,
/// which makes the counter durable and restart-safe.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookAttempt {
    pub id: Uuid,

    pub transaction_id: Uuid,

    /// Monotonic per transaction, starting at 1, never reused
    pub attempt_number: i32,

    /// URL the payload was posted to
    pub notification_url: String,

    /// The exact serialized payload that was sent
    pub request_body: String,

    /// Transaction status being notified
    pub transaction_status: TransactionStatus,

    pub delivery_status: WebhookDeliveryStatus,

    /// Endpoint response body; NULL when the request never got a response
    pub response_body: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Attempt data as produced by the delivery pipeline, before insertion.
#[derive(Debug, Clone)]
pub struct NewWebhookAttempt {
    pub transaction_id: Uuid,
    pub attempt_number: i32,
    pub notification_url: String,
    pub request_body: String,
    pub transaction_status: TransactionStatus,
    pub delivery_status: WebhookDeliveryStatus,
    pub response_body: Option<String>,
}

/// Notification payload POSTed to the merchant endpoint.
///
/// # Example
///
/// ```json
/// {
///   "payment_method": "Card",
///   "amount": "150.00",
///   "currency": "USD",
///   "type": "Transaction",
///   "transactionId": "770e8400-e29b-41d4-a716-446655440002",
///   "created_at": "2026-01-15T10:30:00.000Z",
///   "updated_at": "2026-01-15T10:30:05.000Z",
///   "card_data": { "card_number": "************4242" },
///   "language": "en",
///   "customer": { "firstName": "Jane", "lastName": "Doe" },
///   "status": "APPROVED",
///   "message": "OK"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub payment_method: String,

    pub amount: Decimal,

    pub currency: String,

    #[serde(rename = "type")]
    pub notification_type: String,

    #[serde(rename = "transactionId")]
    pub transaction_id: Uuid,

    #[serde(serialize_with = "iso8601_millis")]
    pub created_at: DateTime<Utc>,

    #[serde(serialize_with = "iso8601_millis")]
    pub updated_at: DateTime<Utc>,

    pub card_data: CardNumberData,

    pub language: String,

    pub customer: CustomerData,

    pub status: TransactionStatus,

    pub message: String,
}

impl WebhookPayload {
    /// Build the payload for a settled transaction.
    ///
    /// The card number is masked and the customer's country is dropped;
    /// merchants only receive what they need to reconcile the payment.
    pub fn new(transaction: &Transaction, card: &Card, customer: &Customer) -> Self {
        Self {
            payment_method: "Card".to_string(),
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            notification_type: "Transaction".to_string(),
            transaction_id: transaction.id,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
            card_data: CardNumberData {
                card_number: card.masked_number(),
            },
            language: transaction.language.clone(),
            customer: CustomerData {
                first_name: customer.first_name.clone(),
                last_name: customer.last_name.clone(),
                country: None,
            },
            status: transaction.status,
            message: "OK".to_string(),
        }
    }
}

/// Serialize a timestamp as ISO-8601 with millisecond precision and a
/// literal `Z` suffix, e.g. `2026-01-15T10:30:00.000Z`.
fn iso8601_millis<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}
