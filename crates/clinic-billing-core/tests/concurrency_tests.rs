//! Two connections writing to one database file.

use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rust_decimal::Decimal;

use clinic_billing_core::billing::{
    BillingError, NoopPublisher, PaymentLedger, PaymentRequest, RegisterVisitRequest, VisitService,
};
use clinic_billing_core::config::BillingConfig;
use clinic_billing_core::db::Database;
use clinic_billing_core::models::{Doctor, Patient, PaymentStatus};

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Create a database file with one patient and one unpaid visit of 1000.
fn seed(path: &std::path::Path) -> String {
    let db = Database::open(path).unwrap();
    let config = BillingConfig::default();
    let patient = Patient::new("Concurrent Patient".to_string());
    db.insert_patient(&patient).unwrap();
    let doctor = Doctor::new("Dr. Parallel".to_string(), d("1000"));
    db.upsert_doctor(&doctor).unwrap();

    VisitService::new(&db, &config, &NoopPublisher)
        .register_visit(RegisterVisitRequest::new(&patient.id, Some(doctor.id)))
        .unwrap()
        .visit
        .id
}

#[test]
fn test_parallel_payments_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = Arc::new(dir.path().join("clinic.db"));
    let visit_id = Arc::new(seed(&path));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = Arc::clone(&path);
            let visit_id = Arc::clone(&visit_id);
            thread::spawn(move || {
                let db = Database::open_with_busy_timeout(path.as_path(), Duration::from_secs(10)).unwrap();
                let config = BillingConfig::default();
                let ledger = PaymentLedger::new(&db, &config, &NoopPublisher);
                for _ in 0..10 {
                    ledger
                        .record_payment(PaymentRequest::new(visit_id.as_str(), d("50"), "cash"))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let db = Database::open(path.as_path()).unwrap();
    let visit = db.get_visit(&visit_id).unwrap().unwrap();
    assert_eq!(db.list_payments_for_visit(&visit_id).unwrap().len(), 20);
    assert_eq!(visit.total_paid, d("1000"));
    assert_eq!(visit.total_due, Decimal::ZERO);
    assert_eq!(visit.payment_status, PaymentStatus::Paid);
}

#[test]
fn test_lock_timeout_is_concurrent_modification() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");
    let visit_id = seed(&path);

    let holder = Database::open(&path).unwrap();
    let waiter = Database::open_with_busy_timeout(&path, Duration::from_millis(50)).unwrap();
    let guard = holder.begin_immediate().unwrap();

    let config = BillingConfig::default();
    let result = PaymentLedger::new(&waiter, &config, &NoopPublisher)
        .record_payment(PaymentRequest::new(&visit_id, d("100"), "cash"));
    assert!(matches!(result, Err(BillingError::ConcurrentModification(_))));

    drop(guard);
    let receipt = PaymentLedger::new(&waiter, &config, &NoopPublisher)
        .record_payment(PaymentRequest::new(&visit_id, d("100"), "cash"))
        .unwrap();
    assert_eq!(receipt.visit.total_paid, d("100"));
}
