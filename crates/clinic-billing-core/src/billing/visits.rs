//! Visit registration, deletion and lookups.

use rust_decimal::Decimal;

use super::cost::{CostBreakdown, CostCalculator};
use super::events::{publish_committed, EventPublisher, VisitEvent, VisitEventType, VisitView};
use super::ledger::{invariant_violation, PaymentLedger, PaymentRequest};
use super::{load_visit, BillingError, BillingResult};
use crate::config::BillingConfig;
use crate::db::Database;
use crate::models::{AccountVoucher, AuditEntry, Doctor, Payment, SourceAccount, Visit};
use crate::money::{DiscountType, Money};

/// Arguments for `register_visit`.
#[derive(Debug, Clone)]
pub struct RegisterVisitRequest {
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// Taken at the desk during registration; zero means none
    pub initial_payment_amount: Money,
    /// Method for the initial payment (defaults to the settlement method)
    pub method_id: Option<String>,
    pub chief_complaint: Option<String>,
    /// Account credited for this visit (defaults to the configured service line)
    pub service_line: Option<SourceAccount>,
}

impl RegisterVisitRequest {
    pub fn new(patient_id: impl Into<String>, doctor_id: Option<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            doctor_id,
            discount_type: DiscountType::None,
            discount_value: Decimal::ZERO,
            initial_payment_amount: Decimal::ZERO,
            method_id: None,
            chief_complaint: None,
            service_line: None,
        }
    }

    pub fn with_discount(mut self, discount_type: DiscountType, value: Decimal) -> Self {
        self.discount_type = discount_type;
        self.discount_value = value;
        self
    }

    pub fn with_initial_payment(mut self, amount: Money, method_id: impl Into<String>) -> Self {
        self.initial_payment_amount = amount;
        self.method_id = Some(method_id.into());
        self
    }
}

/// A freshly registered visit and the payment taken with it, if any.
#[derive(Debug, Clone)]
pub struct Registration {
    pub visit: Visit,
    pub initial_payment: Option<Payment>,
}

/// Visit lifecycle outside the status machine.
pub struct VisitService<'a> {
    db: &'a Database,
    config: &'a BillingConfig,
    publisher: &'a dyn EventPublisher,
    calculator: CostCalculator,
}

impl<'a> VisitService<'a> {
    pub fn new(db: &'a Database, config: &'a BillingConfig, publisher: &'a dyn EventPublisher) -> Self {
        Self {
            db,
            config,
            publisher,
            calculator: CostCalculator::new(config.registration_fee),
        }
    }

    /// Preview the charges for a visit without writing anything.
    pub fn estimate_cost(
        &self,
        doctor_id: Option<&str>,
        discount_type: DiscountType,
        discount_value: Decimal,
    ) -> BillingResult<CostBreakdown> {
        let fee = self.doctor(doctor_id)?.map(|d| d.consultation_fee);
        self.calculator.compute(fee, discount_type, discount_value)
    }

    /// Create a visit, taking the initial payment in the same transaction.
    pub fn register_visit(&self, request: RegisterVisitRequest) -> BillingResult<Registration> {
        if request.initial_payment_amount < Decimal::ZERO {
            return Err(BillingError::InvalidAmount(format!(
                "Initial payment cannot be negative, got {}",
                request.initial_payment_amount
            )));
        }

        let tx = self.db.begin_immediate()?;

        if self.db.get_patient(&request.patient_id)?.is_none() {
            return Err(BillingError::NotFound(format!("patient {}", request.patient_id)));
        }
        let doctor = self.doctor(request.doctor_id.as_deref())?;
        let costs = self.calculator.compute(
            doctor.as_ref().map(|d| d.consultation_fee),
            request.discount_type,
            request.discount_value,
        )?;

        let mut visit = Visit::new(
            request.patient_id.clone(),
            doctor.map(|d| d.id),
            &costs,
            request.service_line.unwrap_or(self.config.default_service_line),
        );
        visit.chief_complaint = request.chief_complaint.clone();
        visit
            .check_invariants(Decimal::ZERO)
            .map_err(|reason| invariant_violation(&visit.id, reason))?;
        self.db.insert_visit(&visit)?;
        self.db.append_audit(
            &visit.id,
            "registered",
            Some(&format!("final amount {}", crate::money::format_money(visit.final_amount))),
        )?;

        let initial_payment = if request.initial_payment_amount > Decimal::ZERO {
            let method_id = request
                .method_id
                .clone()
                .unwrap_or_else(|| self.config.settlement_method_id.clone());
            let ledger = PaymentLedger::new(self.db, self.config, self.publisher);
            let payment = PaymentRequest::new(visit.id.clone(), request.initial_payment_amount, method_id)
                .with_notes("Paid at registration");
            let (payment, _) = ledger.record_locked(&mut visit, &payment)?;
            Some(payment)
        } else {
            None
        };

        tx.commit()?;

        tracing::info!(
            visit_id = %visit.id,
            patient_id = %visit.patient_id,
            final_amount = %visit.final_amount,
            total_paid = %visit.total_paid,
            payment_status = visit.payment_status.as_str(),
            "Registered visit"
        );
        publish_committed(self.db, self.publisher, VisitEventType::Created, visit.clone());

        Ok(Registration { visit, initial_payment })
    }

    /// Delete a visit. Each payment is counter-posted and removed; clinical records are
    /// kept as standalone records. Returns the reversal vouchers.
    pub fn delete_visit(&self, visit_id: &str) -> BillingResult<Vec<AccountVoucher>> {
        let tx = self.db.begin_immediate()?;
        let visit = load_visit(self.db, visit_id)?;
        let view = VisitView::load(self.db, visit.clone())?;

        let reversals = self.delete_locked(&visit)?;

        tx.commit()?;

        tracing::info!(
            visit_id = %visit.id,
            reversals = reversals.len(),
            "Deleted visit"
        );
        self.publisher.publish(VisitEvent {
            event_type: VisitEventType::Deleted,
            visit: view,
        });
        Ok(reversals)
    }

    /// Delete a patient with all of their visits and clinical records.
    pub fn delete_patient(&self, patient_id: &str) -> BillingResult<Vec<AccountVoucher>> {
        let tx = self.db.begin_immediate()?;
        if self.db.get_patient(patient_id)?.is_none() {
            return Err(BillingError::NotFound(format!("patient {}", patient_id)));
        }

        let visits = self.db.list_visits_for_patient(patient_id)?;
        let mut views = Vec::with_capacity(visits.len());
        let mut reversals = Vec::new();
        for visit in &visits {
            views.push(VisitView::load(self.db, visit.clone())?);
            reversals.extend(self.delete_locked(visit)?);
        }
        self.db.delete_clinical_records_for_patient(patient_id)?;
        self.db.delete_patient(patient_id)?;

        tx.commit()?;

        tracing::info!(
            patient_id = %patient_id,
            visits = visits.len(),
            reversals = reversals.len(),
            "Deleted patient"
        );
        for view in views {
            self.publisher.publish(VisitEvent {
                event_type: VisitEventType::Deleted,
                visit: view,
            });
        }
        Ok(reversals)
    }

    pub fn get_visit(&self, visit_id: &str) -> BillingResult<Visit> {
        load_visit(self.db, visit_id)
    }

    /// Visit with patient and doctor names resolved.
    pub fn visit_view(&self, visit_id: &str) -> BillingResult<VisitView> {
        VisitView::load(self.db, load_visit(self.db, visit_id)?)
    }

    pub fn visits_for_patient(&self, patient_id: &str) -> BillingResult<Vec<Visit>> {
        Ok(self.db.list_visits_for_patient(patient_id)?)
    }

    /// Visits that can still be completed.
    pub fn open_visits(&self) -> BillingResult<Vec<Visit>> {
        Ok(self.db.list_open_visits()?)
    }

    pub fn vouchers_for_reference(&self, reference_id: &str) -> BillingResult<Vec<AccountVoucher>> {
        Ok(self.db.list_vouchers_for_reference(reference_id)?)
    }

    /// Credits minus debits for a reference.
    pub fn net_balance(&self, reference_id: &str) -> BillingResult<Money> {
        Ok(self.db.net_balance_for_reference(reference_id)?)
    }

    pub fn audit_log(&self, visit_id: &str) -> BillingResult<Vec<AuditEntry>> {
        Ok(self.db.list_audit_for_visit(visit_id)?)
    }

    fn delete_locked(&self, visit: &Visit) -> BillingResult<Vec<AccountVoucher>> {
        let ledger = PaymentLedger::new(self.db, self.config, self.publisher);
        let reversals = ledger.reverse_visit_payments(visit)?;
        self.db.unlink_clinical_records(&visit.id)?;
        self.db.delete_visit_row(&visit.id)?;
        self.db.append_audit(
            &visit.id,
            "deleted",
            Some(&format!("{} payment(s) reversed", reversals.len())),
        )?;
        Ok(reversals)
    }

    fn doctor(&self, doctor_id: Option<&str>) -> BillingResult<Option<Doctor>> {
        match doctor_id {
            None => Ok(None),
            Some(id) => self
                .db
                .get_doctor(id)?
                .filter(|d| d.active)
                .map(Some)
                .ok_or_else(|| BillingError::NotFound(format!("doctor {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::Outbox;
    use crate::models::{Patient, PaymentStatus, VisionTest, VoucherType};

    struct Fixture {
        db: Database,
        config: BillingConfig,
        outbox: Outbox,
        patient: Patient,
        doctor: Doctor,
    }

    impl Fixture {
        fn new(config: BillingConfig) -> Self {
            let db = Database::open_in_memory().unwrap();
            let patient = Patient::new("Farida".into());
            db.insert_patient(&patient).unwrap();
            let doctor = Doctor::new("Dr. Rahman".into(), Decimal::new(500, 0));
            db.upsert_doctor(&doctor).unwrap();
            Self {
                db,
                config,
                outbox: Outbox::new(),
                patient,
                doctor,
            }
        }

        fn service(&self) -> VisitService<'_> {
            VisitService::new(&self.db, &self.config, &self.outbox)
        }
    }

    #[test]
    fn test_estimate_uses_doctor_fee_and_registration_fee() {
        let fx = Fixture::new(BillingConfig {
            registration_fee: Decimal::new(100, 0),
            ..BillingConfig::default()
        });
        let costs = fx
            .service()
            .estimate_cost(Some(&fx.doctor.id), DiscountType::Percentage, Decimal::new(10, 0))
            .unwrap();
        assert_eq!(costs.total_amount, Decimal::new(600, 0));
        assert_eq!(costs.discount_amount, Decimal::new(60, 0));
        assert_eq!(costs.final_amount, Decimal::new(540, 0));

        let no_doctor = fx.service().estimate_cost(None, DiscountType::None, Decimal::ZERO).unwrap();
        assert_eq!(no_doctor.final_amount, Decimal::new(100, 0));

        assert!(matches!(
            fx.service().estimate_cost(Some("ghost"), DiscountType::None, Decimal::ZERO),
            Err(BillingError::NotFound(_))
        ));
    }

    #[test]
    fn test_register_with_initial_payment() {
        let fx = Fixture::new(BillingConfig::default());
        let request = RegisterVisitRequest::new(&fx.patient.id, Some(fx.doctor.id.clone()))
            .with_initial_payment(Decimal::new(200, 0), "card");
        let registration = fx.service().register_visit(request).unwrap();

        let visit = registration.visit;
        assert_eq!(visit.final_amount, Decimal::new(500, 0));
        assert_eq!(visit.total_due, Decimal::new(300, 0));
        assert_eq!(visit.payment_status, PaymentStatus::Partial);
        assert_eq!(registration.initial_payment.unwrap().payment_method_id, "card");

        let events = fx.outbox.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, VisitEventType::Created);
        assert_eq!(events[0].visit.doctor_name.as_deref(), Some("Dr. Rahman"));
    }

    #[test]
    fn test_register_rolls_back_on_bad_method() {
        let fx = Fixture::new(BillingConfig::default());
        let request = RegisterVisitRequest::new(&fx.patient.id, None)
            .with_initial_payment(Decimal::new(200, 0), "barter");
        assert!(matches!(
            fx.service().register_visit(request),
            Err(BillingError::NotFound(_))
        ));
        assert!(fx.db.list_visits_for_patient(&fx.patient.id).unwrap().is_empty());
        assert!(fx.outbox.is_empty());
    }

    #[test]
    fn test_register_unknown_patient() {
        let fx = Fixture::new(BillingConfig::default());
        assert!(matches!(
            fx.service().register_visit(RegisterVisitRequest::new("ghost", None)),
            Err(BillingError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_visit_reverses_payments() {
        let fx = Fixture::new(BillingConfig::default());
        let service = fx.service();
        let registration = service
            .register_visit(
                RegisterVisitRequest::new(&fx.patient.id, Some(fx.doctor.id.clone()))
                    .with_initial_payment(Decimal::new(500, 0), "cash"),
            )
            .unwrap();
        let visit = registration.visit;
        let payment = registration.initial_payment.unwrap();
        fx.db
            .insert_vision_test(&VisionTest::new(fx.patient.id.clone(), Some(visit.id.clone())))
            .unwrap();
        fx.outbox.take();

        let reversals = service.delete_visit(&visit.id).unwrap();

        assert_eq!(reversals.len(), 1);
        assert_eq!(reversals[0].voucher_type, VoucherType::Debit);
        assert_eq!(service.net_balance(&payment.id).unwrap(), Decimal::ZERO);
        assert!(fx.db.get_visit(&visit.id).unwrap().is_none());
        assert!(fx.db.list_payments_for_visit(&visit.id).unwrap().is_empty());
        assert!(!fx.db.visit_has_vision_test(&visit.id).unwrap());

        let events = fx.outbox.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, VisitEventType::Deleted);

        let actions: Vec<String> = service
            .audit_log(&visit.id)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["registered", "payment_recorded", "deleted"]);
    }

    #[test]
    fn test_delete_patient_removes_everything() {
        let fx = Fixture::new(BillingConfig::default());
        let service = fx.service();
        for _ in 0..2 {
            service
                .register_visit(
                    RegisterVisitRequest::new(&fx.patient.id, None)
                        .with_initial_payment(Decimal::new(50, 0), "cash"),
                )
                .unwrap();
        }
        fx.outbox.take();

        let reversals = service.delete_patient(&fx.patient.id).unwrap();

        assert_eq!(reversals.len(), 2);
        assert!(fx.db.get_patient(&fx.patient.id).unwrap().is_none());
        assert_eq!(fx.outbox.take().len(), 2);
        for reversal in &reversals {
            let reference = reversal.source_reference_id.as_deref().unwrap();
            assert_eq!(service.net_balance(reference).unwrap(), Decimal::ZERO);
        }
    }
}
