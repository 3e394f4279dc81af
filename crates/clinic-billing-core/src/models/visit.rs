//! Visit model and its status dimensions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::voucher::SourceAccount;
use crate::billing::CostBreakdown;
use crate::money::{self, DiscountType, Money};

/// Progress of a clinical step (vision test or prescription).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Completed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Completed => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepStatus::Completed)
    }
}

/// Money state of a visit. Derived, never set directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// `paid` iff nothing is due and something was paid; `partial` iff
    /// `0 < paid < final`; otherwise `pending`.
    pub fn from_totals(total_paid: Money, final_amount: Money) -> Self {
        let due = money::due_amount(final_amount, total_paid);
        if due.is_zero() && total_paid > Decimal::ZERO {
            PaymentStatus::Paid
        } else if total_paid > Decimal::ZERO && total_paid < final_amount {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

/// Aggregate progress of a visit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    #[default]
    Pending,
    /// Vision test done, prescription outstanding
    VisionTest,
    /// Prescription done; payment or vision test may still be outstanding
    Prescription,
    Completed,
}

impl OverallStatus {
    /// Furthest step reached. `completed` needs both clinical steps plus a settled
    /// payment (paid, or nothing due at all).
    pub fn derive(
        vision: StepStatus,
        prescription: StepStatus,
        payment: PaymentStatus,
        total_due: Money,
    ) -> Self {
        let payment_settled = payment == PaymentStatus::Paid || total_due.is_zero();
        match (vision.is_completed(), prescription.is_completed()) {
            (true, true) if payment_settled => OverallStatus::Completed,
            (_, true) => OverallStatus::Prescription,
            (true, false) => OverallStatus::VisionTest,
            (false, false) => OverallStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Pending => "pending",
            OverallStatus::VisionTest => "vision_test",
            OverallStatus::Prescription => "prescription",
            OverallStatus::Completed => "completed",
        }
    }
}

/// One clinical + billing episode for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub id: String,
    pub patient_id: String,
    /// Selected doctor, if any
    pub doctor_id: Option<String>,
    /// Account that receives this visit's income
    pub service_line: SourceAccount,

    pub registration_fee: Money,
    pub doctor_fee: Money,
    pub total_amount: Money,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub total_paid: Money,
    pub total_due: Money,

    pub payment_status: PaymentStatus,
    pub vision_test_status: StepStatus,
    pub prescription_status: StepStatus,
    pub overall_status: OverallStatus,
    pub vision_test_completed_at: Option<String>,
    pub prescription_completed_at: Option<String>,

    pub chief_complaint: Option<String>,
    pub visit_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Visit {
    /// Create a pending, unpaid visit from a cost breakdown.
    pub fn new(
        patient_id: String,
        doctor_id: Option<String>,
        costs: &CostBreakdown,
        service_line: SourceAccount,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let mut visit = Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            doctor_id,
            service_line,
            registration_fee: costs.registration_fee,
            doctor_fee: costs.doctor_fee,
            total_amount: costs.total_amount,
            discount_type: costs.discount_type,
            discount_value: costs.discount_value,
            discount_amount: costs.discount_amount,
            final_amount: costs.final_amount,
            total_paid: Decimal::ZERO,
            total_due: costs.final_amount,
            payment_status: PaymentStatus::Pending,
            vision_test_status: StepStatus::Pending,
            prescription_status: StepStatus::Pending,
            overall_status: OverallStatus::Pending,
            vision_test_completed_at: None,
            prescription_completed_at: None,
            chief_complaint: None,
            visit_notes: None,
            created_at: now.clone(),
            updated_at: now,
        };
        visit.refresh_statuses();
        visit
    }

    /// Apply a new paid total and re-derive everything that depends on it.
    pub fn apply_total_paid(&mut self, total_paid: Money) {
        self.total_paid = total_paid;
        self.total_due = money::due_amount(self.final_amount, total_paid);
        self.refresh_statuses();
    }

    /// Re-derive payment and overall status from the stored fields.
    pub fn refresh_statuses(&mut self) {
        self.payment_status = PaymentStatus::from_totals(self.total_paid, self.final_amount);
        self.overall_status = OverallStatus::derive(
            self.vision_test_status,
            self.prescription_status,
            self.payment_status,
            self.total_due,
        );
    }

    /// Append a line to `visit_notes`, never replacing what is there.
    pub fn append_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        self.visit_notes = Some(match self.visit_notes.take() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
            _ => note.to_string(),
        });
    }

    pub fn is_completed(&self) -> bool {
        self.overall_status == OverallStatus::Completed
    }

    /// Check the stored money fields against their definitions.
    ///
    /// `payments_sum` is the sum of the visit's payment rows as read from storage.
    pub fn check_invariants(&self, payments_sum: Money) -> Result<(), String> {
        let expected_total = self
            .registration_fee
            .checked_add(self.doctor_fee)
            .ok_or_else(|| "registration_fee + doctor_fee overflows".to_string())?;
        if self.total_amount != expected_total {
            return Err(format!(
                "total_amount {} != registration_fee + doctor_fee {}",
                self.total_amount, expected_total
            ));
        }
        let expected_discount =
            money::discount_amount(self.total_amount, self.discount_type, self.discount_value);
        if self.discount_amount != expected_discount || self.discount_amount > self.total_amount {
            return Err(format!(
                "discount_amount {} does not match expected {}",
                self.discount_amount, expected_discount
            ));
        }
        if self.final_amount != money::final_amount(self.total_amount, self.discount_amount) {
            return Err(format!("final_amount {} is inconsistent", self.final_amount));
        }
        if self.total_paid < Decimal::ZERO || self.total_paid != payments_sum {
            return Err(format!(
                "total_paid {} != sum of payments {}",
                self.total_paid, payments_sum
            ));
        }
        if self.total_due < Decimal::ZERO
            || self.total_due != money::due_amount(self.final_amount, self.total_paid)
        {
            return Err(format!("total_due {} is inconsistent", self.total_due));
        }
        if self.payment_status != PaymentStatus::from_totals(self.total_paid, self.final_amount) {
            return Err(format!(
                "payment_status {} does not follow from totals",
                self.payment_status.as_str()
            ));
        }
        Ok(())
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::CostCalculator;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn make_visit(final_fee: &str) -> Visit {
        let costs = CostCalculator::new(Decimal::ZERO)
            .compute(Some(d(final_fee)), DiscountType::None, Decimal::ZERO)
            .unwrap();
        Visit::new("patient-1".into(), None, &costs, SourceAccount::Hospital)
    }

    #[test]
    fn test_payment_status_rule() {
        assert_eq!(PaymentStatus::from_totals(d("0"), d("500")), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_totals(d("200"), d("500")), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::from_totals(d("500"), d("500")), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_totals(d("600"), d("500")), PaymentStatus::Paid);
        // Nothing owed and nothing paid stays pending
        assert_eq!(PaymentStatus::from_totals(d("0"), d("0")), PaymentStatus::Pending);
    }

    #[test]
    fn test_overall_status_is_furthest_step() {
        use OverallStatus::*;
        use StepStatus::{Completed as Done, Pending as Open};
        let paid = PaymentStatus::Paid;
        let zero = Decimal::ZERO;

        assert_eq!(OverallStatus::derive(Open, Open, paid, zero), Pending);
        assert_eq!(OverallStatus::derive(Done, Open, paid, zero), VisionTest);
        assert_eq!(OverallStatus::derive(Open, Done, paid, zero), Prescription);
        assert_eq!(OverallStatus::derive(Done, Done, paid, zero), Completed);
        assert_eq!(
            OverallStatus::derive(Done, Done, PaymentStatus::Partial, d("10")),
            Prescription
        );
        // Fully discounted visit: nothing due counts as settled
        assert_eq!(
            OverallStatus::derive(Done, Done, PaymentStatus::Pending, zero),
            Completed
        );
    }

    #[test]
    fn test_apply_total_paid() {
        let mut visit = make_visit("500");
        visit.apply_total_paid(d("200"));
        assert_eq!(visit.total_due, d("300"));
        assert_eq!(visit.payment_status, PaymentStatus::Partial);
        assert!(visit.check_invariants(d("200")).is_ok());
        assert!(visit.check_invariants(d("100")).is_err());
    }

    #[test]
    fn test_append_note() {
        let mut visit = make_visit("100");
        visit.append_note("first");
        visit.append_note("   ");
        visit.append_note("second");
        assert_eq!(visit.visit_notes.as_deref(), Some("first\nsecond"));
    }
}
