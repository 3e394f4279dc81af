//! End-to-end billing scenarios against an in-memory database.

use std::str::FromStr;

use rust_decimal::Decimal;

use clinic_billing_core::billing::{
    BillingError, BulkCompletion, CompletionRequest, CompletionType, Outbox, PaymentLedger,
    PaymentRequest, RegisterVisitRequest, VisitEventType, VisitService, VisitStatusMachine,
};
use clinic_billing_core::config::BillingConfig;
use clinic_billing_core::db::Database;
use clinic_billing_core::models::{
    Doctor, OverallStatus, Patient, PaymentStatus, SourceAccount, StepStatus, TransactionType,
    Visit, VoucherType,
};
use clinic_billing_core::money::DiscountType;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct Clinic {
    db: Database,
    config: BillingConfig,
    outbox: Outbox,
    patient: Patient,
}

impl Clinic {
    fn new() -> Self {
        Self::with_config(BillingConfig::default())
    }

    fn with_config(config: BillingConfig) -> Self {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Anwar Hossain".to_string()).with_phone("01811111111");
        db.insert_patient(&patient).unwrap();
        Self {
            db,
            config,
            outbox: Outbox::new(),
            patient,
        }
    }

    fn doctor(&self, fee: &str) -> Doctor {
        let doctor = Doctor::new("Dr. Chowdhury".to_string(), d(fee));
        self.db.upsert_doctor(&doctor).unwrap();
        doctor
    }

    fn visits(&self) -> VisitService<'_> {
        VisitService::new(&self.db, &self.config, &self.outbox)
    }

    fn ledger(&self) -> PaymentLedger<'_> {
        PaymentLedger::new(&self.db, &self.config, &self.outbox)
    }

    fn machine(&self) -> VisitStatusMachine<'_> {
        VisitStatusMachine::new(&self.db, &self.config, &self.outbox)
    }

    fn register(&self, fee: &str, discount_type: DiscountType, discount_value: &str) -> Visit {
        let doctor = self.doctor(fee);
        self.visits()
            .register_visit(
                RegisterVisitRequest::new(&self.patient.id, Some(doctor.id))
                    .with_discount(discount_type, d(discount_value)),
            )
            .unwrap()
            .visit
    }

    fn pay(&self, visit: &Visit, amount: &str) -> Visit {
        self.ledger()
            .record_payment(PaymentRequest::new(&visit.id, d(amount), "cash"))
            .unwrap()
            .visit
    }
}

#[test]
fn test_scenario_a_no_discount() {
    let clinic = Clinic::new();
    let visit = clinic.register("500", DiscountType::None, "0");

    assert_eq!(visit.total_amount, d("500"));
    assert_eq!(visit.discount_amount, d("0"));
    assert_eq!(visit.final_amount, d("500"));
    assert_eq!(visit.total_due, d("500"));
    assert_eq!(visit.payment_status, PaymentStatus::Pending);
    assert_eq!(visit.overall_status, OverallStatus::Pending);
}

#[test]
fn test_scenario_b_percentage_clamped() {
    let clinic = Clinic::new();
    let visit = clinic.register("1000", DiscountType::Percentage, "120");

    assert_eq!(visit.discount_amount, d("1000"));
    assert_eq!(visit.final_amount, d("0"));
}

#[test]
fn test_scenario_c_amount_clamped() {
    let clinic = Clinic::new();
    let visit = clinic.register("800", DiscountType::Amount, "1000");

    assert_eq!(visit.discount_amount, d("800"));
    assert_eq!(visit.final_amount, d("0"));
}

#[test]
fn test_registration_fee_added_to_total() {
    let clinic = Clinic::with_config(BillingConfig {
        registration_fee: d("200"),
        ..BillingConfig::default()
    });
    let visit = clinic.register("500", DiscountType::Percentage, "10");

    assert_eq!(visit.registration_fee, d("200"));
    assert_eq!(visit.total_amount, d("700"));
    assert_eq!(visit.discount_amount, d("70"));
    assert_eq!(visit.final_amount, d("630"));
}

#[test]
fn test_estimate_matches_registration() {
    let clinic = Clinic::new();
    let doctor = clinic.doctor("750");
    let estimate = clinic
        .visits()
        .estimate_cost(Some(&doctor.id), DiscountType::Percentage, d("33.33"))
        .unwrap();
    let visit = clinic
        .visits()
        .register_visit(
            RegisterVisitRequest::new(&clinic.patient.id, Some(doctor.id))
                .with_discount(DiscountType::Percentage, d("33.33")),
        )
        .unwrap()
        .visit;

    assert_eq!(estimate.discount_amount, visit.discount_amount);
    assert_eq!(estimate.final_amount, visit.final_amount);
    assert_eq!(estimate.discount_amount, d("249.98"));
}

#[test]
fn test_scenario_d_partial_then_paid() {
    let clinic = Clinic::new();
    let visit = clinic.register("500", DiscountType::None, "0");

    let visit = clinic.pay(&visit, "200");
    assert_eq!(visit.payment_status, PaymentStatus::Partial);
    assert_eq!(visit.total_due, d("300"));

    let visit = clinic.pay(&visit, "300");
    assert_eq!(visit.payment_status, PaymentStatus::Paid);
    assert_eq!(visit.total_due, d("0"));
    assert_eq!(visit.total_paid, d("500"));

    let vouchers = clinic
        .db
        .list_vouchers_for_account(SourceAccount::Hospital)
        .unwrap();
    assert_eq!(vouchers.len(), 2);
    assert!(vouchers.iter().all(|v| v.voucher_type == VoucherType::Credit
        && v.source_transaction_type == TransactionType::Income));
    assert_eq!(vouchers[0].voucher_no, "HSP-000001");
    assert_eq!(vouchers[1].voucher_no, "HSP-000002");
}

#[test]
fn test_scenario_e_simple_complete_without_evidence() {
    let clinic = Clinic::new();
    let visit = clinic.register("500", DiscountType::None, "0");
    let visit = clinic.pay(&visit, "500");
    assert!(!clinic.db.visit_has_vision_test(&visit.id).unwrap());

    let done = clinic
        .machine()
        .complete_visit(&visit.id, &CompletionRequest::new(CompletionType::SimpleComplete))
        .unwrap();

    assert_eq!(done.vision_test_status, StepStatus::Completed);
    assert_eq!(done.prescription_status, StepStatus::Completed);
    assert_eq!(done.overall_status, OverallStatus::Completed);
}

#[test]
fn test_unpaid_visit_waits_on_payment() {
    let clinic = Clinic::new();
    let visit = clinic.register("500", DiscountType::None, "0");

    let after_steps = clinic
        .machine()
        .complete_visit(&visit.id, &CompletionRequest::new(CompletionType::SimpleComplete))
        .unwrap();
    assert_eq!(after_steps.overall_status, OverallStatus::Prescription);

    let paid = clinic.pay(&after_steps, "500");
    assert_eq!(paid.overall_status, OverallStatus::Completed);
}

#[test]
fn test_scenario_f_bulk_with_completed_and_pending() {
    let clinic = Clinic::new();
    let v1 = clinic.register("0", DiscountType::None, "0");
    let v2 = clinic.register("0", DiscountType::None, "0");
    let simple = CompletionRequest::new(CompletionType::SimpleComplete);
    clinic.machine().complete_visit(&v1.id, &simple).unwrap();

    let report = BulkCompletion::new(&clinic.db, &clinic.config, &clinic.outbox)
        .bulk_complete(&[v1.id.clone(), v2.id.clone()], &simple);

    assert_eq!(report.skipped, vec![v1.id.clone()]);
    assert_eq!(report.succeeded, vec![v2.id.clone()]);
    assert!(report.failed.is_empty());
    assert_eq!(
        clinic.db.get_visit(&v2.id).unwrap().unwrap().overall_status,
        OverallStatus::Completed
    );
}

#[test]
fn test_scenario_f_unpaid_visit_reports_what_it_reached() {
    let clinic = Clinic::new();
    let v1 = clinic.register("0", DiscountType::None, "0");
    let v2 = clinic.register("500", DiscountType::None, "0");
    let simple = CompletionRequest::new(CompletionType::SimpleComplete);
    clinic.machine().complete_visit(&v1.id, &simple).unwrap();

    let bulk = BulkCompletion::new(&clinic.db, &clinic.config, &clinic.outbox);
    let ids = vec![v1.id.clone(), v2.id.clone()];
    let report = bulk.bulk_complete(&ids, &simple);

    assert_eq!(report.skipped, vec![v1.id.clone()]);
    assert!(report.succeeded.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.incomplete.len(), 1);
    assert_eq!(report.incomplete[0].id, v2.id);
    assert!(report.incomplete[0].reason.starts_with("Payment outstanding"));
    assert_eq!(report.total(), 2);

    let stored = clinic.db.get_visit(&v2.id).unwrap().unwrap();
    assert_eq!(stored.overall_status, OverallStatus::Prescription);
    assert_eq!(stored.vision_test_status, StepStatus::Completed);
    assert_eq!(bulk.selectable(&ids).unwrap(), vec![v2.id.clone()]);

    // the same batch with settlement finishes it
    let report = bulk.bulk_complete(&ids, &simple.clone().settling_due());
    assert_eq!(report.succeeded, vec![v2.id.clone()]);
    assert!(report.incomplete.is_empty());
    assert_eq!(
        clinic.db.get_visit(&v2.id).unwrap().unwrap().overall_status,
        OverallStatus::Completed
    );
}

#[test]
fn test_bulk_settlement_records_remaining_due() {
    let clinic = Clinic::new();
    let visit = clinic.register("900", DiscountType::None, "0");
    clinic.pay(&visit, "400");

    let report = BulkCompletion::new(&clinic.db, &clinic.config, &clinic.outbox).bulk_complete(
        &[visit.id.clone()],
        &CompletionRequest::new(CompletionType::SimpleComplete).settling_due(),
    );
    assert_eq!(report.succeeded, vec![visit.id.clone()]);

    let payments = clinic.db.list_payments_for_visit(&visit.id).unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[1].amount, d("500"));
    let settled = clinic.db.get_visit(&visit.id).unwrap().unwrap();
    assert_eq!(settled.total_paid, d("900"));
    assert_eq!(settled.payment_status, PaymentStatus::Paid);
    assert_eq!(settled.overall_status, OverallStatus::Completed);
    assert_eq!(
        clinic.db.net_balance_for_reference(&payments[1].id).unwrap(),
        d("500")
    );
}

#[test]
fn test_mark_vision_twice_equals_once() {
    let clinic = Clinic::new();
    let visit = clinic.register("500", DiscountType::None, "0");
    clinic
        .machine()
        .record_vision_test(&clinic.patient.id, None)
        .unwrap();
    // Standalone test does not count as evidence for the visit
    assert!(matches!(
        clinic.machine().mark_vision_test_complete(&visit.id),
        Err(BillingError::MissingEvidence(_))
    ));

    let (_, linked) = clinic
        .machine()
        .record_vision_test(&clinic.patient.id, Some(&visit.id))
        .unwrap();
    let once = linked.unwrap();
    let twice = clinic.machine().mark_vision_test_complete(&visit.id).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.overall_status, OverallStatus::VisionTest);
}

#[test]
fn test_delete_round_trip_leaves_zero_balance() {
    let clinic = Clinic::new();
    let visit = clinic.register("1200", DiscountType::None, "0");
    clinic.pay(&visit, "200");
    clinic.pay(&visit, "450.50");
    let payments = clinic.db.list_payments_for_visit(&visit.id).unwrap();

    let reversals = clinic.visits().delete_visit(&visit.id).unwrap();

    assert_eq!(reversals.len(), 2);
    for payment in &payments {
        assert_eq!(
            clinic.visits().net_balance(&payment.id).unwrap(),
            Decimal::ZERO
        );
        let vouchers = clinic.visits().vouchers_for_reference(&payment.id).unwrap();
        assert_eq!(vouchers.len(), 2);
        assert_eq!(vouchers[1].source_voucher_no.as_deref(), Some(vouchers[0].voucher_no.as_str()));
        assert!(vouchers[1].narration.contains("Payment Reversal"));
    }
    assert!(matches!(
        clinic.visits().get_visit(&visit.id),
        Err(BillingError::NotFound(_))
    ));
}

#[test]
fn test_events_once_per_commit() {
    let clinic = Clinic::new();
    let visit = clinic.register("500", DiscountType::None, "0");
    clinic.pay(&visit, "500");
    let _ = clinic
        .ledger()
        .record_payment(PaymentRequest::new(&visit.id, d("-5"), "cash"));
    clinic
        .machine()
        .complete_visit(&visit.id, &CompletionRequest::new(CompletionType::SimpleComplete))
        .unwrap();
    clinic
        .machine()
        .complete_visit(&visit.id, &CompletionRequest::new(CompletionType::SimpleComplete))
        .unwrap();
    clinic.visits().delete_visit(&visit.id).unwrap();

    let kinds: Vec<VisitEventType> = clinic
        .outbox
        .take()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            VisitEventType::Created,
            VisitEventType::Updated,
            VisitEventType::Updated,
            VisitEventType::Deleted,
        ]
    );
}

#[test]
fn test_idempotency_key_across_retries() {
    let clinic = Clinic::new();
    let visit = clinic.register("500", DiscountType::None, "0");
    let request = PaymentRequest::new(&visit.id, d("250"), "card").with_idempotency_key("till-7-0042");

    let first = clinic.ledger().record_payment(request.clone()).unwrap();
    let second = clinic.ledger().record_payment(request).unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.payment.id, second.payment.id);
    assert_eq!(
        clinic.db.get_visit(&visit.id).unwrap().unwrap().total_paid,
        d("250")
    );
}

#[test]
fn test_overpayment_rejected_when_disabled() {
    let clinic = Clinic::with_config(BillingConfig {
        allow_overpayment: false,
        ..BillingConfig::default()
    });
    let visit = clinic.register("300", DiscountType::None, "0");
    clinic.pay(&visit, "300");

    let result = clinic
        .ledger()
        .record_payment(PaymentRequest::new(&visit.id, d("0.01"), "cash"));
    assert!(matches!(result, Err(BillingError::InvalidAmount(_))));
}

#[test]
fn test_service_line_routes_vouchers() {
    let clinic = Clinic::new();
    let doctor = clinic.doctor("1500");
    let mut request = RegisterVisitRequest::new(&clinic.patient.id, Some(doctor.id))
        .with_initial_payment(d("1500"), "card");
    request.service_line = Some(SourceAccount::Optics);
    let registration = clinic.visits().register_visit(request).unwrap();

    assert_eq!(registration.visit.service_line, SourceAccount::Optics);
    let vouchers = clinic.db.list_vouchers_for_account(SourceAccount::Optics).unwrap();
    assert_eq!(vouchers.len(), 1);
    assert_eq!(vouchers[0].voucher_no, "OPT-000001");
    assert!(vouchers[0].narration.starts_with("Optics Income - Patient Payment"));
}
