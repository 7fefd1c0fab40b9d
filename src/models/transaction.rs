//! Transaction data models and API request/response types.
//!
//! This module defines:
//! - `Transaction`: Database entity representing a money movement
//! - `TransactionStatus` / `TransactionType`: lifecycle and direction enums
//! - Request types for top-up and payout initiation
//! - Response bodies returned to merchants

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a transaction.
///
/// Every transaction is created `Pending` by payment initiation and moves to
/// exactly one of the terminal states (`Approved` or `Failed`) when the
/// settlement engine claims it. There is no way back out of a terminal
/// state.
///
/// Serialized as `PENDING` / `APPROVED` / `FAILED` on the wire and stored as
/// the `transaction_status` PostgreSQL enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Failed,
}

/// Direction of the money movement.
///
/// - `TopUp`: customer card funds a merchant account
/// - `PayOut`: merchant account funds a customer card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
pub enum TransactionType {
    TopUp,
    PayOut,
}

/// Represents a transaction record from the database.
///
/// # Database Table
///
/// Maps to the `transactions` table. Each transaction:
/// - References the card and the account involved
/// - Stores the amount as a fixed-point decimal (never floats)
/// - Carries the merchant's notification URL for webhook delivery
///
/// Rows are created by initiation, mutated only by the settlement engine
/// (a single pending → terminal status transition), and never deleted.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Transaction {
    pub id: Uuid,

    pub created_at: DateTime<Utc>,

    /// Bumped when settlement writes the terminal status
    pub updated_at: DateTime<Utc>,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Amount moved, always positive
    pub amount: Decimal,

    /// Merchant endpoint notified of the settlement outcome
    pub notification_url: String,

    /// Language tag forwarded in the notification payload
    pub language: String,

    pub status: TransactionStatus,

    pub transaction_type: TransactionType,

    /// Card involved in the movement
    pub card_id: Uuid,

    /// Merchant account involved in the movement
    pub account_id: Uuid,
}

/// Customer identification data shared by requests and notification
/// payloads.
///
/// `country` is required when initiating a payment (customers are looked up
/// by name and country) but omitted from webhook payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Card data supplied with payment requests.
///
/// `exp_date` (`MM/yy`) and `cvv` are only needed when a top-up references a
/// card this service has not seen before.
#[derive(Debug, Clone, Deserialize)]
pub struct CardData {
    pub card_number: String,
    pub exp_date: Option<String>,
    pub cvv: Option<String>,
}

/// Request to initiate a top-up (card funds a merchant account).
///
/// # JSON Example
///
/// ```json
/// {
///   "payment_method": "Card",
///   "amount": 150,
///   "currency": "USD",
///   "language": "en",
///   "notification_url": "https://merchant.example/webhooks/payments",
///   "customer": { "firstName": "Jane", "lastName": "Doe", "country": "DE" },
///   "card_data": { "card_number": "4242424242424242", "exp_date": "12/26", "cvv": "123" }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub payment_method: String,

    /// Amount in whole currency units, must be positive
    pub amount: i64,

    pub currency: String,

    pub language: String,

    pub notification_url: String,

    pub customer: CustomerData,

    pub card_data: CardData,
}

/// Request to initiate a payout (merchant account funds a card).
///
/// Unlike top-ups, payouts require the customer and the card to already
/// exist.
#[derive(Debug, Deserialize)]
pub struct PayoutRequest {
    pub payment_method: String,

    /// Amount in whole currency units, must be positive
    pub amount: i64,

    pub currency: String,

    pub language: String,

    pub notification_url: String,

    pub customer: CustomerData,

    pub card_data: CardData,
}

/// Response returned when a payment is accepted for processing.
///
/// The transaction is `PENDING` at this point; the outcome arrives on the
/// notification URL once settlement runs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub message: String,
}

/// Masked card data echoed in responses and notifications.
#[derive(Debug, Serialize)]
pub struct CardNumberData {
    pub card_number: String,
}

/// Full transaction view returned by the query endpoints.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub payment_method: String,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub notification_url: String,
    pub card_data: CardNumberData,
    pub language: String,
    pub customer: CustomerData,
    pub status: TransactionStatus,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Approved).unwrap(),
            "\"APPROVED\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Pending).unwrap(),
            "\"PENDING\""
        );
    }

    #[test]
    fn type_serializes_in_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&TransactionType::TopUp).unwrap(),
            "\"TOP_UP\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionType::PayOut).unwrap(),
            "\"PAY_OUT\""
        );
    }

    #[test]
    fn customer_country_is_omitted_when_absent() {
        let customer = CustomerData {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            country: None,
        };
        assert_eq!(
            serde_json::to_string(&customer).unwrap(),
            r#"{"firstName":"Jane","lastName":"Doe"}"#
        );
    }
}
