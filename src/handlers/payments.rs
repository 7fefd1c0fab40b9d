//! Payment HTTP handlers.
//!
//! This module implements the merchant-facing payment API:
//! - POST /api/v1/payments/topups - Initiate a top-up
//! - POST /api/v1/payments/payouts - Initiate a payout
//! - GET /api/v1/payments/topups/{id} - Top-up details
//! - GET /api/v1/payments/payouts/{id} - Payout details
//! - GET /api/v1/payments/topups - List top-ups
//! - GET /api/v1/payments/payouts - List payouts
//!
//! Initiated payments come back `PENDING`; the outcome is delivered to the
//! request's notification URL once the settlement engine has processed the
//! transaction.

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::transaction::{
        PaymentResponse, PayoutRequest, TopUpRequest, TransactionResponse, TransactionType,
    },
    services::payment_service::{self, ListParams},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Initiate a top-up (card funds the merchant account).
///
/// # Response (201)
///
/// ```json
/// {
///   "transactionId": "770e8400-...",
///   "status": "PENDING",
///   "message": "OK"
/// }
/// ```
///
/// # Errors
///
/// - 404: no merchant account for the requested currency
/// - 422: card balance does not cover the amount
pub async fn create_top_up(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TopUpRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let response = payment_service::top_up(&pool, auth.merchant_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Initiate a payout (merchant account funds the card).
///
/// # Errors
///
/// - 404: unknown customer, card, or merchant account
/// - 422: account balance does not cover the amount
pub async fn create_payout(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<PayoutRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let response = payment_service::pay_out(&pool, auth.merchant_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get one top-up transaction by id.
pub async fn get_top_up(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let response = payment_service::get_transaction(
        &pool,
        auth.merchant_id,
        transaction_id,
        TransactionType::TopUp,
    )
    .await?;
    Ok(Json(response))
}

/// Get one payout transaction by id.
pub async fn get_payout(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let response = payment_service::get_transaction(
        &pool,
        auth.merchant_id,
        transaction_id,
        TransactionType::PayOut,
    )
    .await?;
    Ok(Json(response))
}

/// List the merchant's top-ups.
///
/// # Query Parameters
///
/// - `from`, `to`: optional created-at range as unix seconds
/// - `page`, `size`: pagination, defaulting to the first 50
pub async fn list_top_ups(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let responses = payment_service::list_transactions(
        &pool,
        auth.merchant_id,
        TransactionType::TopUp,
        &params,
    )
    .await?;
    Ok(Json(responses))
}

/// List the merchant's payouts.
pub async fn list_payouts(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let responses = payment_service::list_transactions(
        &pool,
        auth.merchant_id,
        TransactionType::PayOut,
        &params,
    )
    .await?;
    Ok(Json(responses))
}
