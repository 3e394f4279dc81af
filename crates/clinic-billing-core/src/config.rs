//! Billing configuration.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::models::SourceAccount;
use crate::money::{self, Money};

/// Billing configuration.
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | CLINIC_REGISTRATION_FEE | 0 | Fee added to every visit |
/// | CLINIC_ALLOW_OVERPAYMENT | true | Accept payments above the due |
/// | CLINIC_DEFAULT_SERVICE_LINE | hospital | Account credited for visit income |
/// | CLINIC_SETTLEMENT_METHOD | cash | Method used when completion settles the due |
/// | CLINIC_BUSY_TIMEOUT_MS | 5000 | Wait for the write lock before giving up |
/// | CLINIC_API_BASE | /api | Base path for the endpoint resolver |
/// | CLINIC_EVENT_QUEUE_CAPACITY | 1024 | Undrained events kept before the oldest are dropped |
#[derive(Debug, Clone, PartialEq)]
pub struct BillingConfig {
    pub registration_fee: Money,
    pub allow_overpayment: bool,
    pub default_service_line: SourceAccount,
    pub settlement_method_id: String,
    pub busy_timeout: Duration,
    pub api_base: String,
    pub event_queue_capacity: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            registration_fee: Decimal::ZERO,
            allow_overpayment: true,
            default_service_line: SourceAccount::Hospital,
            settlement_method_id: "cash".to_string(),
            busy_timeout: crate::db::DEFAULT_BUSY_TIMEOUT,
            api_base: "/api".to_string(),
            event_queue_capacity: crate::billing::DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl BillingConfig {
    /// Load from environment variables, falling back to defaults for anything unset
    /// or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            registration_fee: lookup("CLINIC_REGISTRATION_FEE")
                .and_then(|v| money::parse_money(&v))
                .filter(|fee| *fee >= Decimal::ZERO)
                .unwrap_or(defaults.registration_fee),
            allow_overpayment: lookup("CLINIC_ALLOW_OVERPAYMENT")
                .and_then(|v| bool::from_str(v.trim()).ok())
                .unwrap_or(defaults.allow_overpayment),
            default_service_line: lookup("CLINIC_DEFAULT_SERVICE_LINE")
                .and_then(|v| SourceAccount::parse(v.trim()))
                .unwrap_or(defaults.default_service_line),
            settlement_method_id: lookup("CLINIC_SETTLEMENT_METHOD")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.settlement_method_id),
            busy_timeout: lookup("CLINIC_BUSY_TIMEOUT_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_timeout),
            api_base: lookup("CLINIC_API_BASE").unwrap_or(defaults.api_base),
            event_queue_capacity: lookup("CLINIC_EVENT_QUEUE_CAPACITY")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.event_queue_capacity),
        }
    }
}
