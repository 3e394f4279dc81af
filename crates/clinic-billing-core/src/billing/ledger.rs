//! Payment ledger: records payments, keeps visit totals in step, posts vouchers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use super::events::{publish_committed, EventPublisher, VisitEventType};
use super::voucher::{narration, VoucherPoster, VoucherRequest};
use super::{load_visit, BillingError, BillingResult};
use crate::config::BillingConfig;
use crate::db::Database;
use crate::models::{AccountVoucher, Payment, TransactionType, Visit, VoucherType};
use crate::money::{self, Money};

/// Category used in payment voucher narrations.
pub const PAYMENT_CATEGORY: &str = "Patient Payment";
/// Category used when a payment is counter-posted.
pub const REVERSAL_CATEGORY: &str = "Payment Reversal";

/// A request to take money against a visit.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub visit_id: String,
    pub amount: Money,
    pub method_id: String,
    /// Defaults to today (UTC)
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub received_by: Option<String>,
    /// Client-supplied token making retries safe
    pub idempotency_key: Option<String>,
}

impl PaymentRequest {
    pub fn new(visit_id: impl Into<String>, amount: Money, method_id: impl Into<String>) -> Self {
        Self {
            visit_id: visit_id.into(),
            amount,
            method_id: method_id.into(),
            payment_date: None,
            notes: None,
            received_by: None,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// SHA-256 over `visit_id|amount|method_id`, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.visit_id.as_bytes());
        hasher.update(b"|");
        hasher.update(money::format_money(self.amount).as_bytes());
        hasher.update(b"|");
        hasher.update(self.method_id.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Outcome of `record_payment`.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment: Payment,
    /// Visit totals after the payment
    pub visit: Visit,
    /// Credit voucher posted for the payment (`None` on a replay)
    pub voucher: Option<AccountVoucher>,
    /// True when an idempotency key matched an earlier identical request
    pub replayed: bool,
}

/// Payment ledger.
pub struct PaymentLedger<'a> {
    db: &'a Database,
    config: &'a BillingConfig,
    publisher: &'a dyn EventPublisher,
    poster: VoucherPoster<'a>,
}

impl<'a> PaymentLedger<'a> {
    /// Create a new payment ledger.
    pub fn new(db: &'a Database, config: &'a BillingConfig, publisher: &'a dyn EventPublisher) -> Self {
        Self {
            db,
            config,
            publisher,
            poster: VoucherPoster::new(db),
        }
    }

    /// Record a payment against a visit.
    ///
    /// Payment row, visit totals, credit voucher and audit entry are written in one
    /// transaction; the `updated` event goes out after it commits.
    pub fn record_payment(&self, request: PaymentRequest) -> BillingResult<PaymentReceipt> {
        validate_amount(request.amount)?;

        let tx = self.db.begin_immediate()?;

        if let Some(receipt) = self.replay(&request)? {
            tracing::warn!(
                visit_id = %request.visit_id,
                payment_id = %receipt.payment.id,
                "Replayed payment for repeated idempotency key"
            );
            return Ok(receipt);
        }

        let mut visit = load_visit(self.db, &request.visit_id)?;
        let (payment, voucher) = self.record_locked(&mut visit, &request)?;

        tx.commit()?;

        tracing::info!(
            visit_id = %visit.id,
            payment_id = %payment.id,
            amount = %payment.amount,
            total_paid = %visit.total_paid,
            total_due = %visit.total_due,
            payment_status = visit.payment_status.as_str(),
            "Recorded payment"
        );
        publish_committed(self.db, self.publisher, VisitEventType::Updated, visit.clone());

        Ok(PaymentReceipt {
            payment,
            visit,
            voucher: Some(voucher),
            replayed: false,
        })
    }

    /// Payments for a visit, in the order they were taken.
    pub fn payments_for_visit(&self, visit_id: &str) -> BillingResult<Vec<Payment>> {
        load_visit(self.db, visit_id)?;
        Ok(self.db.list_payments_for_visit(visit_id)?)
    }

    /// Record a payment inside a transaction the caller already holds.
    ///
    /// Updates `visit` in place and persists it.
    pub(crate) fn record_locked(
        &self,
        visit: &mut Visit,
        request: &PaymentRequest,
    ) -> BillingResult<(Payment, AccountVoucher)> {
        validate_amount(request.amount)?;

        let method = self
            .db
            .get_payment_method(&request.method_id)?
            .filter(|m| m.active)
            .ok_or_else(|| BillingError::NotFound(format!("payment method {}", request.method_id)))?;

        if !self.config.allow_overpayment && request.amount > visit.total_due {
            return Err(BillingError::InvalidAmount(format!(
                "Payment {} exceeds amount due {}",
                money::format_money(request.amount),
                money::format_money(visit.total_due)
            )));
        }

        let payment_date = request
            .payment_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        let mut payment = Payment::new(
            visit.id.clone(),
            money::round_money(request.amount),
            method.id.clone(),
            payment_date,
        );
        payment.notes = request.notes.clone();
        payment.received_by = request.received_by.clone();
        if let Some(key) = &request.idempotency_key {
            payment.idempotency_key = Some(key.clone());
            payment.request_fingerprint = Some(request.fingerprint());
        }
        self.db.insert_payment(&payment)?;

        let previous_paid = visit.total_paid;
        let expected_paid = previous_paid.checked_add(payment.amount).ok_or_else(|| {
            BillingError::InvalidAmount(format!(
                "Payment {} would overflow total paid {}",
                money::format_money(payment.amount),
                money::format_money(previous_paid)
            ))
        })?;
        let payments_sum = self.db.sum_payments_for_visit(&visit.id)?;
        if payments_sum != expected_paid {
            return Err(invariant_violation(
                &visit.id,
                format!(
                    "stored total_paid {} plus payment {} does not match payments sum {}",
                    previous_paid, payment.amount, payments_sum
                ),
            ));
        }

        visit.apply_total_paid(payments_sum);
        visit.touch();
        visit
            .check_invariants(payments_sum)
            .map_err(|reason| invariant_violation(&visit.id, reason))?;
        self.db.update_visit(visit)?;

        let voucher = self.poster.post(VoucherRequest {
            voucher_type: VoucherType::Credit,
            amount: payment.amount,
            narration: narration(
                visit.service_line,
                TransactionType::Income,
                PAYMENT_CATEGORY,
                &format!("Visit {} via {}", short_id(&visit.id), method.name),
            ),
            source_account: visit.service_line,
            source_transaction_type: TransactionType::Income,
            source_voucher_no: None,
            source_reference_id: Some(payment.id.clone()),
        })?;

        self.db.append_audit(
            &visit.id,
            "payment_recorded",
            Some(&format!(
                "{} via {} ({})",
                money::format_money(payment.amount),
                method.name,
                voucher.voucher_no
            )),
        )?;

        Ok((payment, voucher))
    }

    /// Counter-post and remove every payment of a visit that is being deleted.
    ///
    /// Must run inside the deletion's transaction. Any reference left with a non-zero
    /// balance aborts the deletion.
    pub(crate) fn reverse_visit_payments(&self, visit: &Visit) -> BillingResult<Vec<AccountVoucher>> {
        let mut reversals = Vec::new();

        for payment in self.db.list_payments_for_visit(&visit.id)? {
            let vouchers = self.db.list_vouchers_for_reference(&payment.id)?;
            let credit = vouchers
                .iter()
                .find(|v| v.voucher_type == VoucherType::Credit)
                .ok_or_else(|| {
                    invariant_violation(&visit.id, format!("payment {} has no credit voucher", payment.id))
                })?;

            let balance = money::checked_sum(vouchers.iter().map(AccountVoucher::signed_amount))
                .ok_or_else(|| {
                    invariant_violation(&visit.id, format!("payment {} ledger balance overflows", payment.id))
                })?;
            if balance != credit.amount {
                return Err(invariant_violation(
                    &visit.id,
                    format!(
                        "payment {} has ledger balance {} before reversal, expected {}",
                        payment.id, balance, credit.amount
                    ),
                ));
            }

            let reversal = self.poster.counter_post(
                credit,
                narration(
                    credit.source_account,
                    credit.source_transaction_type,
                    REVERSAL_CATEGORY,
                    &format!("Visit {} deleted, reverses {}", short_id(&visit.id), credit.voucher_no),
                ),
            )?;

            let remaining = self.db.net_balance_for_reference(&payment.id)?;
            if !remaining.is_zero() {
                return Err(invariant_violation(
                    &visit.id,
                    format!("payment {} left balance {} after reversal", payment.id, remaining),
                ));
            }

            self.db.delete_payment(&payment.id)?;
            reversals.push(reversal);
        }

        Ok(reversals)
    }

    fn replay(&self, request: &PaymentRequest) -> BillingResult<Option<PaymentReceipt>> {
        let Some(key) = &request.idempotency_key else {
            return Ok(None);
        };
        let Some(existing) = self.db.get_payment_by_idempotency_key(key)? else {
            return Ok(None);
        };

        if existing.request_fingerprint.as_deref() != Some(request.fingerprint().as_str()) {
            return Err(BillingError::IdempotencyConflict(format!(
                "key {} was already used for a different payment",
                key
            )));
        }

        let visit = load_visit(self.db, &existing.visit_id)?;

        Ok(Some(PaymentReceipt {
            payment: existing,
            visit,
            voucher: None,
            replayed: true,
        }))
    }
}

fn validate_amount(amount: Money) -> BillingResult<()> {
    if amount <= Decimal::ZERO {
        return Err(BillingError::InvalidAmount(format!(
            "Payment amount must be positive, got {}",
            amount
        )));
    }
    if amount > money::MAX_MONEY {
        return Err(BillingError::InvalidAmount(format!(
            "Payment amount {} exceeds the maximum of {}",
            amount,
            money::format_money(money::MAX_MONEY)
        )));
    }
    if money::round_money(amount) != amount {
        return Err(BillingError::InvalidAmount(format!(
            "Payment amount has more than two decimal places: {}",
            amount
        )));
    }
    Ok(())
}

/// Log and build an `InvariantViolation`. These indicate a calculation bug.
pub(crate) fn invariant_violation(visit_id: &str, reason: String) -> BillingError {
    tracing::error!(visit_id = %visit_id, reason = %reason, "Billing invariant violated");
    BillingError::InvariantViolation(format!("visit {}: {}", visit_id, reason))
}

/// First block of a UUID, for narrations.
fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{CostCalculator, Outbox};
    use crate::models::{Patient, PaymentStatus, SourceAccount};
    use crate::money::DiscountType;

    struct Fixture {
        db: Database,
        config: BillingConfig,
        outbox: Outbox,
    }

    impl Fixture {
        fn new(config: BillingConfig) -> Self {
            Self {
                db: Database::open_in_memory().unwrap(),
                config,
                outbox: Outbox::new(),
            }
        }

        fn ledger(&self) -> PaymentLedger<'_> {
            PaymentLedger::new(&self.db, &self.config, &self.outbox)
        }

        fn visit(&self, fee: i64) -> Visit {
            let patient = Patient::new("Rumana".into());
            self.db.insert_patient(&patient).unwrap();
            let costs = CostCalculator::new(Decimal::ZERO)
                .compute(Some(Decimal::new(fee, 0)), DiscountType::None, Decimal::ZERO)
                .unwrap();
            let visit = Visit::new(patient.id, None, &costs, SourceAccount::Hospital);
            self.db.insert_visit(&visit).unwrap();
            visit
        }
    }

    #[test]
    fn test_partial_then_paid() {
        let fx = Fixture::new(BillingConfig::default());
        let visit = fx.visit(500);
        let ledger = fx.ledger();

        let first = ledger
            .record_payment(PaymentRequest::new(&visit.id, Decimal::new(200, 0), "cash"))
            .unwrap();
        assert_eq!(first.visit.payment_status, PaymentStatus::Partial);
        assert_eq!(first.visit.total_due, Decimal::new(300, 0));

        let second = ledger
            .record_payment(PaymentRequest::new(&visit.id, Decimal::new(300, 0), "card"))
            .unwrap();
        assert_eq!(second.visit.payment_status, PaymentStatus::Paid);
        assert_eq!(second.visit.total_due, Decimal::ZERO);

        let voucher = second.voucher.unwrap();
        assert_eq!(voucher.voucher_type, VoucherType::Credit);
        assert_eq!(voucher.source_reference_id.as_deref(), Some(second.payment.id.as_str()));
        assert!(voucher.narration.starts_with("Hospital Income - Patient Payment: Visit "));
        assert_eq!(fx.outbox.take().len(), 2);
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let fx = Fixture::new(BillingConfig::default());
        let visit = fx.visit(500);
        let result = fx
            .ledger()
            .record_payment(PaymentRequest::new(&visit.id, Decimal::ZERO, "cash"));
        assert!(matches!(result, Err(BillingError::InvalidAmount(_))));
        assert!(fx.outbox.is_empty());
    }

    #[test]
    fn test_amount_beyond_ceiling_is_rejected_without_panicking() {
        let fx = Fixture::new(BillingConfig::default());
        let visit = fx.visit(500);
        let ledger = fx.ledger();

        let result = ledger.record_payment(PaymentRequest::new(&visit.id, Decimal::MAX, "cash"));
        assert!(matches!(result, Err(BillingError::InvalidAmount(_))));

        ledger
            .record_payment(PaymentRequest::new(&visit.id, money::MAX_MONEY, "cash"))
            .unwrap();
        let receipt = ledger
            .record_payment(PaymentRequest::new(&visit.id, money::MAX_MONEY, "cash"))
            .unwrap();
        let receipt_after = ledger
            .record_payment(PaymentRequest::new(&visit.id, Decimal::ONE, "cash"))
            .unwrap();

        assert_eq!(receipt.visit.total_paid, Decimal::new(2_000_000_000_000, 0));
        assert_eq!(receipt_after.visit.total_paid, Decimal::new(2_000_000_000_001, 0));
        assert_eq!(fx.db.list_payments_for_visit(&visit.id).unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_visit_and_method() {
        let fx = Fixture::new(BillingConfig::default());
        let visit = fx.visit(500);
        let ledger = fx.ledger();

        assert!(matches!(
            ledger.record_payment(PaymentRequest::new("missing", Decimal::ONE, "cash")),
            Err(BillingError::NotFound(_))
        ));
        assert!(matches!(
            ledger.record_payment(PaymentRequest::new(&visit.id, Decimal::ONE, "barter")),
            Err(BillingError::NotFound(_))
        ));
        assert!(fx.db.list_payments_for_visit(&visit.id).unwrap().is_empty());
    }

    #[test]
    fn test_overpayment_follows_config() {
        let fx = Fixture::new(BillingConfig::default());
        let visit = fx.visit(100);
        let receipt = fx
            .ledger()
            .record_payment(PaymentRequest::new(&visit.id, Decimal::new(150, 0), "cash"))
            .unwrap();
        assert_eq!(receipt.visit.total_paid, Decimal::new(150, 0));
        assert_eq!(receipt.visit.total_due, Decimal::ZERO);
        assert_eq!(receipt.visit.payment_status, PaymentStatus::Paid);

        let strict = Fixture::new(BillingConfig {
            allow_overpayment: false,
            ..BillingConfig::default()
        });
        let visit = strict.visit(100);
        let result = strict
            .ledger()
            .record_payment(PaymentRequest::new(&visit.id, Decimal::new(150, 0), "cash"));
        assert!(matches!(result, Err(BillingError::InvalidAmount(_))));
    }

    #[test]
    fn test_idempotent_retry_and_conflict() {
        let fx = Fixture::new(BillingConfig::default());
        let visit = fx.visit(500);
        let ledger = fx.ledger();

        let request = PaymentRequest::new(&visit.id, Decimal::new(200, 0), "cash").with_idempotency_key("k1");
        let first = ledger.record_payment(request.clone()).unwrap();
        let retry = ledger.record_payment(request).unwrap();

        assert!(retry.replayed);
        assert_eq!(retry.payment.id, first.payment.id);
        assert_eq!(retry.visit.total_paid, Decimal::new(200, 0));
        assert_eq!(fx.db.list_payments_for_visit(&visit.id).unwrap().len(), 1);
        assert_eq!(fx.outbox.take().len(), 1);

        let different = PaymentRequest::new(&visit.id, Decimal::new(250, 0), "cash").with_idempotency_key("k1");
        assert!(matches!(
            ledger.record_payment(different),
            Err(BillingError::IdempotencyConflict(_))
        ));
    }

    #[test]
    fn test_drifted_total_is_invariant_violation() {
        let fx = Fixture::new(BillingConfig::default());
        let mut visit = fx.visit(500);
        // Simulate a stored total that no longer matches the payment rows
        visit.apply_total_paid(Decimal::new(50, 0));
        fx.db.update_visit(&visit).unwrap();

        let result = fx
            .ledger()
            .record_payment(PaymentRequest::new(&visit.id, Decimal::new(100, 0), "cash"));
        assert!(matches!(result, Err(BillingError::InvariantViolation(_))));
        // Rolled back: no payment row, no voucher
        assert!(fx.db.list_payments_for_visit(&visit.id).unwrap().is_empty());
        assert!(fx
            .db
            .list_vouchers_for_account(SourceAccount::Hospital)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_fingerprint_depends_on_request() {
        let a = PaymentRequest::new("v1", Decimal::new(100, 0), "cash");
        let b = PaymentRequest::new("v1", Decimal::new(10000, 2), "cash");
        let c = PaymentRequest::new("v1", Decimal::new(100, 0), "card");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
