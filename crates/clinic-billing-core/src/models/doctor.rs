//! Doctors and payment methods (reference data for billing).

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A doctor a visit can be booked with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub specialization: Option<String>,
    /// Fee charged per visit
    pub consultation_fee: Money,
    /// Inactive doctors cannot be selected for new visits
    pub active: bool,
}

impl Doctor {
    pub fn new(name: String, consultation_fee: Money) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            specialization: None,
            consultation_fee,
            active: true,
        }
    }
}

/// A way of taking money at the desk (cash, card, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub active: bool,
}
