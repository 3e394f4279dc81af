//! Payment models.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// An immutable money-in event against a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub visit_id: String,
    pub amount: Money,
    pub payment_method_id: String,
    /// Calendar date the money was taken (`YYYY-MM-DD`)
    pub payment_date: String,
    pub notes: Option<String>,
    /// Desk user who took the money
    pub received_by: Option<String>,
    /// Client-supplied retry token
    pub idempotency_key: Option<String>,
    /// SHA-256 of the request that first used `idempotency_key`
    pub request_fingerprint: Option<String>,
    pub created_at: String,
}

impl Payment {
    pub fn new(
        visit_id: String,
        amount: Money,
        payment_method_id: String,
        payment_date: chrono::NaiveDate,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            visit_id,
            amount,
            payment_method_id,
            payment_date: payment_date.format("%Y-%m-%d").to_string(),
            notes: None,
            received_by: None,
            idempotency_key: None,
            request_fingerprint: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
