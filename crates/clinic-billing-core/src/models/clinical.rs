//! Clinical evidence records.
//!
//! Only their existence matters to billing: a linked vision test or prescription is
//! what allows the matching visit step to be marked complete.

use serde::{Deserialize, Serialize};

/// A vision test, optionally tied to a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisionTest {
    pub id: String,
    pub patient_id: String,
    /// Weak back-reference; standalone tests have none
    pub visit_id: Option<String>,
    pub created_at: String,
}

impl VisionTest {
    pub fn new(patient_id: String, visit_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            visit_id,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A prescription, optionally tied to a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub visit_id: Option<String>,
    pub created_at: String,
}

impl Prescription {
    pub fn new(patient_id: String, visit_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            visit_id,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One line in a visit's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub visit_id: String,
    /// Short machine-readable action ("payment_recorded", "completed", ...)
    pub action: String,
    /// Free-text detail
    pub detail: Option<String>,
    pub created_at: String,
}
