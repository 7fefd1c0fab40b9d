//! Merchant data model.
//!
//! Merchants are the API clients of this service. Each merchant owns one
//! account per currency and authenticates with Basic credentials; only the
//! SHA-256 hash of the secret is stored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a merchant record from the database.
///
/// Maps to the `merchants` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Merchant {
    /// Unique identifier, doubles as the Basic auth username
    pub id: Uuid,

    /// Legal/company name
    pub company_name: String,

    /// Country of registration (ISO 3166-1 alpha-2)
    pub country: String,

    /// Hex-encoded SHA-256 hash of the merchant secret
    ///
    /// The plaintext secret is never stored.
    #[serde(skip_serializing)]
    pub secret_key_hash: String,

    pub created_at: DateTime<Utc>,
}
