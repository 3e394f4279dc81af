//! Visit cost calculation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BillingError, BillingResult};
use crate::money::{self, DiscountType, Money};

/// Charges for a visit, before any payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CostBreakdown {
    pub registration_fee: Money,
    pub doctor_fee: Money,
    pub total_amount: Money,
    /// Discount type as applied (unknown types arrive here as `None`)
    pub discount_type: DiscountType,
    /// Discount value as entered, clamped to be non-negative
    pub discount_value: Decimal,
    pub discount_amount: Money,
    pub final_amount: Money,
}

/// Computes `CostBreakdown`s. The same calculator backs cost previews and
/// persisted visits.
#[derive(Debug, Clone, Copy)]
pub struct CostCalculator {
    registration_fee: Money,
}

impl CostCalculator {
    /// Create a calculator with the configured registration fee (may be zero).
    pub fn new(registration_fee: Money) -> Self {
        Self {
            registration_fee: money::round_money(registration_fee.max(Decimal::ZERO)),
        }
    }

    pub fn registration_fee(&self) -> Money {
        self.registration_fee
    }

    /// Compute the charges for a visit. No doctor means no doctor fee.
    ///
    /// Fees above `MAX_MONEY` are rejected rather than summed.
    pub fn compute(
        &self,
        doctor_fee: Option<Money>,
        discount_type: DiscountType,
        discount_value: Decimal,
    ) -> BillingResult<CostBreakdown> {
        let doctor_fee = money::round_money(doctor_fee.unwrap_or(Decimal::ZERO).max(Decimal::ZERO));
        for (name, fee) in [("registration fee", self.registration_fee), ("doctor fee", doctor_fee)] {
            if !money::within_range(fee) {
                return Err(BillingError::InvalidAmount(format!(
                    "{} {} exceeds the maximum of {}",
                    name,
                    fee,
                    money::format_money(money::MAX_MONEY)
                )));
            }
        }
        let total_amount = self
            .registration_fee
            .checked_add(doctor_fee)
            .ok_or_else(|| BillingError::InvalidAmount("visit total overflows".to_string()))?;
        let discount_value = discount_value.max(Decimal::ZERO);
        let discount_amount = money::discount_amount(total_amount, discount_type, discount_value);

        Ok(CostBreakdown {
            registration_fee: self.registration_fee,
            doctor_fee,
            total_amount,
            discount_type,
            discount_value,
            discount_amount,
            final_amount: money::final_amount(total_amount, discount_amount),
        })
    }
}
