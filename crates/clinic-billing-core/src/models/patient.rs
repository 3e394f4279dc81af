//! Patient models.

use serde::{Deserialize, Serialize};

/// A registered patient. Owns zero or more visits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Local UUID
    pub id: String,
    /// Full name
    pub name: String,
    /// Contact phone number
    pub phone: Option<String>,
    /// Age in years at registration
    pub age: Option<u32>,
    /// Gender as entered at the desk
    pub gender: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            phone: None,
            age: None,
            gender: None,
            address: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Builder-style phone setter.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}
