//! Webhook delivery pipeline.
//!
//! After settlement commits, the merchant endpoint is notified with the
//! transaction outcome. Delivery is at-least-attempted: every try, success
//! or failure, persists one attempt record, attempt numbers are derived
//! from the persisted history (restart-safe), and failed attempts are
//! retried with exponential backoff until the budget is spent.
//!
//! Nothing in this module propagates an error to the caller. The settlement
//! and balance outcome is already final when delivery starts, so every
//! failure path here is logged, recorded, and absorbed.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use crate::models::transaction::Transaction;
use crate::models::webhook::{NewWebhookAttempt, WebhookDeliveryStatus, WebhookPayload};
use crate::store::SettlementStore;

/// Retry budget and backoff shape for one delivery pipeline invocation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per invocation, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 5 total attempts with 1s/2s/4s/8s between them.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after `failed_attempts` attempts have failed
    /// (`failed_attempts >= 1`).
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        self.base_delay * 2u32.pow(failed_attempts.saturating_sub(1))
    }
}

/// Outcome of a single HTTP delivery attempt that did not succeed.
#[derive(Debug)]
struct DeliveryFailure {
    /// Response body for non-2xx responses; None when the request never
    /// got a response (connect error, timeout)
    response_body: Option<String>,
    reason: String,
}

/// Delivers settlement notifications and records every attempt.
pub struct WebhookNotifier<S> {
    store: Arc<S>,
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl<S> Clone for WebhookNotifier<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            client: self.client.clone(),
            policy: self.policy,
        }
    }
}

impl<S: SettlementStore> WebhookNotifier<S> {
    /// Create a notifier with a 5 second per-request timeout (prevents
    /// hanging on slow endpoints).
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        Self {
            store,
            client,
            policy,
        }
    }

    /// Notify the transaction's endpoint of its settlement outcome.
    ///
    /// # Process
    ///
    /// 1. Load the card and customer for the payload
    /// 2. Serialize the payload once; the same bytes are sent and persisted
    ///    on every attempt
    /// 3. Attempt delivery up to the retry budget, recording each attempt
    ///    with a durable attempt number
    ///
    /// Exhausting the budget ends the pipeline quietly: the settlement is
    /// already final and must not be affected.
    pub async fn deliver(&self, transaction: &Transaction) {
        let transaction_id = transaction.id;

        let card = match self.store.find_card(transaction.card_id).await {
            Ok(Some(card)) => card,
            Ok(None) => {
                tracing::error!(%transaction_id, card_id = %transaction.card_id, "Card not found, webhook skipped");
                return;
            }
            Err(e) => {
                tracing::error!(%transaction_id, error = %e, "Failed to load card, webhook skipped");
                return;
            }
        };
        let customer = match self.store.find_customer(card.customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                tracing::error!(%transaction_id, customer_id = %card.customer_id, "Customer not found, webhook skipped");
                return;
            }
            Err(e) => {
                tracing::error!(%transaction_id, error = %e, "Failed to load customer, webhook skipped");
                return;
            }
        };

        let payload = WebhookPayload::new(transaction, &card, &customer);
        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(%transaction_id, error = %e, "Failed to serialize webhook payload");
                return;
            }
        };

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.policy.backoff_delay(attempt - 1)).await;
            }

            // Attempt numbers come from the persisted history so they keep
            // increasing across process restarts.
            let attempt_number = match self.store.max_attempt_number(transaction_id).await {
                Ok(max) => max.unwrap_or(0) + 1,
                Err(e) => {
                    tracing::error!(%transaction_id, error = %e, "Failed to determine attempt number, webhook abandoned");
                    return;
                }
            };

            match self.post(&transaction.notification_url, &body).await {
                Ok(response_body) => {
                    self.record(
                        transaction,
                        attempt_number,
                        &body,
                        WebhookDeliveryStatus::Successful,
                        Some(response_body),
                    )
                    .await;
                    tracing::info!(%transaction_id, attempt_number, "Webhook sent successfully");
                    return;
                }
                Err(failure) => {
                    tracing::warn!(
                        %transaction_id,
                        attempt_number,
                        reason = %failure.reason,
                        "Webhook delivery failed"
                    );
                    self.record(
                        transaction,
                        attempt_number,
                        &body,
                        WebhookDeliveryStatus::Failed,
                        failure.response_body,
                    )
                    .await;
                }
            }
        }

        tracing::warn!(
            %transaction_id,
            attempts = self.policy.max_attempts,
            "Webhook retry budget exhausted, giving up"
        );
    }

    /// POST the payload. 2xx is success; everything else is a retryable
    /// failure carrying whatever response body was available.
    async fn post(&self, url: &str, body: &str) -> Result<String, DeliveryFailure> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                Ok(response.text().await.unwrap_or_default())
            }
            Ok(response) => {
                let status = response.status();
                let response_body = response.text().await.ok();
                Err(DeliveryFailure {
                    response_body,
                    reason: format!("HTTP {status}"),
                })
            }
            Err(e) => Err(DeliveryFailure {
                response_body: None,
                reason: e.to_string(),
            }),
        }
    }

    async fn record(
        &self,
        transaction: &Transaction,
        attempt_number: i32,
        request_body: &str,
        delivery_status: WebhookDeliveryStatus,
        response_body: Option<String>,
    ) {
        let attempt = NewWebhookAttempt {
            transaction_id: transaction.id,
            attempt_number,
            notification_url: transaction.notification_url.clone(),
            request_body: request_body.to_string(),
            transaction_status: transaction.status,
            delivery_status,
            response_body,
        };

        if let Err(e) = self.store.record_attempt(attempt).await {
            tracing::error!(
                transaction_id = %transaction.id,
                attempt_number,
                error = %e,
                "Failed to persist webhook attempt"
            );
        }
    }
}
