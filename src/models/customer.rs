//! Customer data model.

use serde::Serialize;
use uuid::Uuid;

/// Represents a customer record from the database.
///
/// Maps to the `customers` table. Customers own cards; a customer is
/// identified in payment requests by first name, last name and country,
/// and auto-provisioned on first top-up.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
}
