//! Clinic Billing Core Library
//!
//! Local-first visit billing and status lifecycle for an eye clinic front desk.
//!
//! # Architecture
//!
//! ```text
//!  registerVisit ──► Cost Calculator ──► Visit (pending, unpaid)
//!                                           │
//!        recordPayment ──► Payment Ledger ──┤──► Voucher Poster ──► account_vouchers
//!                                           │                        (append-only)
//!  evidence / completeVisit ──► Visit Status Machine
//!                                           │
//!       bulkCompleteVisits ──► Bulk Orchestrator (one transaction per visit)
//!                                           │
//!                                      COMMIT
//!                                           │
//!                                           ▼
//!                                  VisitEvent ──► Outbox ──► host notification channel
//! ```
//!
//! # Core Principle
//!
//! **Derived fields are never set directly.** `total_paid`, `total_due`, `payment_status`
//! and `overall_status` are recomputed from payments and clinical steps inside the same
//! transaction that changes them.
//!
//! # Modules
//!
//! - [`money`]: Decimal money and discount arithmetic
//! - [`models`]: Domain types (Visit, Payment, AccountVoucher, etc.)
//! - [`db`]: SQLite persistence
//! - [`billing`]: Cost calculator, status machine, payment ledger, voucher poster, bulk completion
//! - [`endpoints`]: Named operations and their web paths
//! - [`config`]: Environment-driven configuration
//! - [`logging`]: Subscriber setup for hosts

pub mod billing;
pub mod config;
pub mod db;
pub mod endpoints;
pub mod logging;
pub mod models;
pub mod money;

// Re-export commonly used types
pub use billing::{
    BillingError, BulkCompletion, BulkCompletionReport, BulkFailure, CompletionRequest, CompletionType,
    CostBreakdown, CostCalculator, EventPublisher, Outbox, PaymentLedger, PaymentRequest,
    RegisterVisitRequest, VisitEvent, VisitService, VisitStatusMachine, VoucherPoster,
};
pub use config::BillingConfig;
pub use db::Database;
pub use endpoints::{EndpointResolver, Operation};
pub use models::{
    AccountVoucher, Doctor, OverallStatus, Patient, Payment, PaymentStatus, SourceAccount,
    StepStatus, Visit,
};
pub use money::{DiscountType, Money};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Missing evidence: {0}")]
    MissingEvidence(String),

    #[error("Idempotency key conflict: {0}")]
    IdempotencyConflict(String),
}

impl From<BillingError> for ClinicError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::NotFound(m) => ClinicError::NotFound(m),
            BillingError::InvalidAmount(m) => ClinicError::InvalidAmount(m),
            BillingError::InvariantViolation(m) => ClinicError::InvariantViolation(m),
            BillingError::ConcurrentModification(m) => ClinicError::ConcurrentModification(m),
            BillingError::MissingEvidence(m) => ClinicError::MissingEvidence(m),
            BillingError::IdempotencyConflict(m) => ClinicError::IdempotencyConflict(m),
            BillingError::InvalidRequest(m) => ClinicError::InvalidInput(m),
            BillingError::Database(e) => ClinicError::DatabaseError(e.to_string()),
        }
    }
}

impl From<db::DbError> for ClinicError {
    fn from(e: db::DbError) -> Self {
        BillingError::from(e).into()
    }
}

impl From<endpoints::EndpointError> for ClinicError {
    fn from(e: endpoints::EndpointError) -> Self {
        ClinicError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path. Configuration comes from the environment.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ClinicCore>, ClinicError> {
    let config = BillingConfig::from_env();
    let db = Database::open_with_busy_timeout(&path, config.busy_timeout)?;
    Ok(Arc::new(ClinicCore::new(db, config)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicCore>, ClinicError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(ClinicCore::new(db, BillingConfig::from_env())))
}

/// Install the global tracing subscriber. Fails if one is already installed.
#[uniffi::export]
pub fn init_logging(level: String, json: bool) -> Result<(), ClinicError> {
    logging::init_logging(&level, json).map_err(|e| ClinicError::InvalidInput(e.to_string()))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe billing core for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    db: Arc<Mutex<Database>>,
    config: BillingConfig,
    outbox: Outbox,
}

impl ClinicCore {
    pub fn new(db: Database, config: BillingConfig) -> Self {
        let outbox = Outbox::with_capacity(config.event_queue_capacity);
        Self {
            db: Arc::new(Mutex::new(db)),
            config,
            outbox,
        }
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Patient and Reference Data
    // =========================================================================

    /// Register a new patient.
    pub fn create_patient(&self, name: String, phone: Option<String>) -> Result<FfiPatient, ClinicError> {
        if name.trim().is_empty() {
            return Err(ClinicError::InvalidInput("patient name is required".into()));
        }
        let db = self.db.lock()?;
        let mut patient = Patient::new(name);
        patient.phone = phone;
        db.insert_patient(&patient)?;
        Ok(patient.into())
    }

    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, ClinicError> {
        let db = self.db.lock()?;
        Ok(db.get_patient(&patient_id)?.map(|p| p.into()))
    }

    /// Add or update a doctor.
    pub fn upsert_doctor(&self, doctor: FfiDoctor) -> Result<(), ClinicError> {
        let doctor = Doctor::try_from(doctor)?;
        let db = self.db.lock()?;
        db.upsert_doctor(&doctor)?;
        Ok(())
    }

    /// Doctors available for new visits.
    pub fn list_doctors(&self) -> Result<Vec<FfiDoctor>, ClinicError> {
        let db = self.db.lock()?;
        Ok(db.list_active_doctors()?.into_iter().map(|d| d.into()).collect())
    }

    // =========================================================================
    // Visit Operations
    // =========================================================================

    /// Preview the charges for a visit.
    pub fn estimate_cost(
        &self,
        doctor_id: Option<String>,
        discount_type: String,
        discount_value: String,
    ) -> Result<FfiCostBreakdown, ClinicError> {
        let discount_value = parse_decimal("discount_value", &discount_value)?;
        let db = self.db.lock()?;
        let service = VisitService::new(&db, &self.config, &self.outbox);
        let costs = service.estimate_cost(
            doctor_id.as_deref(),
            DiscountType::parse_lenient(&discount_type),
            discount_value,
        )?;
        Ok(costs.into())
    }

    /// Create a visit, optionally taking a first payment.
    pub fn register_visit(&self, request: FfiRegisterVisitRequest) -> Result<FfiRegistration, ClinicError> {
        let request = RegisterVisitRequest::try_from(request)?;
        let db = self.db.lock()?;
        let registration = VisitService::new(&db, &self.config, &self.outbox).register_visit(request)?;
        Ok(FfiRegistration {
            visit: registration.visit.into(),
            initial_payment: registration.initial_payment.map(|p| p.into()),
        })
    }

    pub fn get_visit(&self, visit_id: String) -> Result<FfiVisit, ClinicError> {
        let db = self.db.lock()?;
        let visit = VisitService::new(&db, &self.config, &self.outbox).get_visit(&visit_id)?;
        Ok(visit.into())
    }

    pub fn list_visits_for_patient(&self, patient_id: String) -> Result<Vec<FfiVisit>, ClinicError> {
        let db = self.db.lock()?;
        let visits = VisitService::new(&db, &self.config, &self.outbox).visits_for_patient(&patient_id)?;
        Ok(visits.into_iter().map(|v| v.into()).collect())
    }

    /// Visits that are not completed yet.
    pub fn list_open_visits(&self) -> Result<Vec<FfiVisit>, ClinicError> {
        let db = self.db.lock()?;
        let visits = VisitService::new(&db, &self.config, &self.outbox).open_visits()?;
        Ok(visits.into_iter().map(|v| v.into()).collect())
    }

    /// Delete a visit, reversing its payments. Returns the reversal vouchers.
    pub fn delete_visit(&self, visit_id: String) -> Result<Vec<FfiVoucher>, ClinicError> {
        let db = self.db.lock()?;
        let reversals = VisitService::new(&db, &self.config, &self.outbox).delete_visit(&visit_id)?;
        Ok(reversals.into_iter().map(|v| v.into()).collect())
    }

    /// Delete a patient and everything attached to them.
    pub fn delete_patient(&self, patient_id: String) -> Result<Vec<FfiVoucher>, ClinicError> {
        let db = self.db.lock()?;
        let reversals = VisitService::new(&db, &self.config, &self.outbox).delete_patient(&patient_id)?;
        Ok(reversals.into_iter().map(|v| v.into()).collect())
    }

    // =========================================================================
    // Payment Operations
    // =========================================================================

    /// Record a payment against a visit.
    pub fn record_payment(&self, request: FfiPaymentRequest) -> Result<FfiPaymentReceipt, ClinicError> {
        let request = PaymentRequest::try_from(request)?;
        let db = self.db.lock()?;
        let receipt = PaymentLedger::new(&db, &self.config, &self.outbox).record_payment(request)?;
        Ok(FfiPaymentReceipt {
            payment: receipt.payment.into(),
            visit: receipt.visit.into(),
            voucher: receipt.voucher.map(|v| v.into()),
            replayed: receipt.replayed,
        })
    }

    pub fn payments_for_visit(&self, visit_id: String) -> Result<Vec<FfiPayment>, ClinicError> {
        let db = self.db.lock()?;
        let payments = PaymentLedger::new(&db, &self.config, &self.outbox).payments_for_visit(&visit_id)?;
        Ok(payments.into_iter().map(|p| p.into()).collect())
    }

    pub fn vouchers_for_reference(&self, reference_id: String) -> Result<Vec<FfiVoucher>, ClinicError> {
        let db = self.db.lock()?;
        let vouchers = VisitService::new(&db, &self.config, &self.outbox).vouchers_for_reference(&reference_id)?;
        Ok(vouchers.into_iter().map(|v| v.into()).collect())
    }

    /// Credits minus debits for a reference, as a decimal string.
    pub fn net_balance(&self, reference_id: String) -> Result<String, ClinicError> {
        let db = self.db.lock()?;
        let balance = VisitService::new(&db, &self.config, &self.outbox).net_balance(&reference_id)?;
        Ok(money::format_money(balance))
    }

    // =========================================================================
    // Status Operations
    // =========================================================================

    pub fn mark_vision_test_complete(&self, visit_id: String) -> Result<FfiVisit, ClinicError> {
        let db = self.db.lock()?;
        let visit = VisitStatusMachine::new(&db, &self.config, &self.outbox).mark_vision_test_complete(&visit_id)?;
        Ok(visit.into())
    }

    pub fn mark_prescription_complete(&self, visit_id: String) -> Result<FfiVisit, ClinicError> {
        let db = self.db.lock()?;
        let visit = VisitStatusMachine::new(&db, &self.config, &self.outbox).mark_prescription_complete(&visit_id)?;
        Ok(visit.into())
    }

    /// Store a vision test. Returns the linked visit after its step completed, if any.
    pub fn record_vision_test(
        &self,
        patient_id: String,
        visit_id: Option<String>,
    ) -> Result<Option<FfiVisit>, ClinicError> {
        let db = self.db.lock()?;
        let (_, visit) = VisitStatusMachine::new(&db, &self.config, &self.outbox)
            .record_vision_test(&patient_id, visit_id.as_deref())?;
        Ok(visit.map(|v| v.into()))
    }

    /// Store a prescription. Returns the linked visit after its step completed, if any.
    pub fn record_prescription(
        &self,
        patient_id: String,
        visit_id: Option<String>,
    ) -> Result<Option<FfiVisit>, ClinicError> {
        let db = self.db.lock()?;
        let (_, visit) = VisitStatusMachine::new(&db, &self.config, &self.outbox)
            .record_prescription(&patient_id, visit_id.as_deref())?;
        Ok(visit.map(|v| v.into()))
    }

    pub fn complete_visit(&self, visit_id: String, request: FfiCompletionRequest) -> Result<FfiVisit, ClinicError> {
        let request = CompletionRequest::try_from(request)?;
        let db = self.db.lock()?;
        let visit = VisitStatusMachine::new(&db, &self.config, &self.outbox).complete_visit(&visit_id, &request)?;
        Ok(visit.into())
    }

    pub fn reopen_visit(&self, visit_id: String, reason: String) -> Result<FfiVisit, ClinicError> {
        let db = self.db.lock()?;
        let visit = VisitStatusMachine::new(&db, &self.config, &self.outbox).reopen_visit(&visit_id, &reason)?;
        Ok(visit.into())
    }

    /// Complete many visits; each succeeds or fails on its own.
    pub fn bulk_complete_visits(
        &self,
        visit_ids: Vec<String>,
        request: FfiCompletionRequest,
    ) -> Result<FfiBulkReport, ClinicError> {
        let request = CompletionRequest::try_from(request)?;
        let db = self.db.lock()?;
        let report = BulkCompletion::new(&db, &self.config, &self.outbox).bulk_complete(&visit_ids, &request);
        Ok(report.into())
    }

    /// Ids from `visit_ids` that are not completed yet.
    pub fn selectable_visit_ids(&self, visit_ids: Vec<String>) -> Result<Vec<String>, ClinicError> {
        let db = self.db.lock()?;
        Ok(BulkCompletion::new(&db, &self.config, &self.outbox).selectable(&visit_ids)?)
    }

    pub fn audit_log(&self, visit_id: String) -> Result<Vec<FfiAuditEntry>, ClinicError> {
        let db = self.db.lock()?;
        let entries = VisitService::new(&db, &self.config, &self.outbox).audit_log(&visit_id)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    // =========================================================================
    // Events and Endpoints
    // =========================================================================

    /// Drain visit events committed since the last call, oldest first.
    ///
    /// The host should call this after every mutating call (or on a timer). The queue
    /// keeps at most `event_queue_capacity` events; older undrained ones are dropped
    /// with a warning.
    pub fn take_events(&self) -> Vec<FfiVisitEvent> {
        self.outbox.take().into_iter().map(|e| e.into()).collect()
    }

    /// Resolve an operation name to its HTTP method and path.
    pub fn endpoint_for(&self, operation: String, id: Option<String>) -> Result<FfiEndpoint, ClinicError> {
        let op = Operation::parse(&operation)
            .ok_or_else(|| ClinicError::InvalidInput(format!("unknown operation {}", operation)))?;
        let endpoint = EndpointResolver::new(self.config.api_base.clone()).resolve(op, id.as_deref())?;
        Ok(FfiEndpoint {
            method: endpoint.method.as_str().to_string(),
            path: endpoint.path,
        })
    }
}

// =========================================================================
// Argument Parsing
// =========================================================================

fn parse_money_arg(field: &str, value: &str) -> Result<Money, ClinicError> {
    money::parse_money(value)
        .ok_or_else(|| ClinicError::InvalidInput(format!("{} is not a valid amount: {:?}", field, value)))
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, ClinicError> {
    if value.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(value.trim())
        .map_err(|_| ClinicError::InvalidInput(format!("{} is not a number: {:?}", field, value)))
}

fn parse_date(field: &str, value: &str) -> Result<chrono::NaiveDate, ClinicError> {
    chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ClinicError::InvalidInput(format!("{} must be YYYY-MM-DD: {:?}", field, value)))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            phone: patient.phone,
            age: patient.age,
            gender: patient.gender,
            address: patient.address,
        }
    }
}

/// FFI-safe doctor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctor {
    pub id: String,
    pub name: String,
    pub specialization: Option<String>,
    pub consultation_fee: String,
    pub active: bool,
}

impl From<Doctor> for FfiDoctor {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name,
            specialization: doctor.specialization,
            consultation_fee: money::format_money(doctor.consultation_fee),
            active: doctor.active,
        }
    }
}

impl TryFrom<FfiDoctor> for Doctor {
    type Error = ClinicError;

    fn try_from(doctor: FfiDoctor) -> Result<Self, Self::Error> {
        let fee = parse_money_arg("consultation_fee", &doctor.consultation_fee)?;
        if fee < Decimal::ZERO {
            return Err(ClinicError::InvalidAmount("consultation fee cannot be negative".into()));
        }
        Ok(Doctor {
            id: doctor.id,
            name: doctor.name,
            specialization: doctor.specialization,
            consultation_fee: fee,
            active: doctor.active,
        })
    }
}

/// FFI-safe cost breakdown. Money fields are decimal strings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCostBreakdown {
    pub registration_fee: String,
    pub doctor_fee: String,
    pub total_amount: String,
    pub discount_type: String,
    pub discount_value: String,
    pub discount_amount: String,
    pub final_amount: String,
}

impl From<CostBreakdown> for FfiCostBreakdown {
    fn from(costs: CostBreakdown) -> Self {
        Self {
            registration_fee: money::format_money(costs.registration_fee),
            doctor_fee: money::format_money(costs.doctor_fee),
            total_amount: money::format_money(costs.total_amount),
            discount_type: costs.discount_type.as_str().to_string(),
            discount_value: costs.discount_value.normalize().to_string(),
            discount_amount: money::format_money(costs.discount_amount),
            final_amount: money::format_money(costs.final_amount),
        }
    }
}

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub service_line: String,
    pub registration_fee: String,
    pub doctor_fee: String,
    pub total_amount: String,
    pub discount_type: String,
    pub discount_value: String,
    pub discount_amount: String,
    pub final_amount: String,
    pub total_paid: String,
    pub total_due: String,
    pub payment_status: String,
    pub vision_test_status: String,
    pub prescription_status: String,
    pub overall_status: String,
    pub chief_complaint: Option<String>,
    pub visit_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Visit> for FfiVisit {
    fn from(visit: Visit) -> Self {
        Self {
            id: visit.id,
            patient_id: visit.patient_id,
            doctor_id: visit.doctor_id,
            service_line: visit.service_line.as_str().to_string(),
            registration_fee: money::format_money(visit.registration_fee),
            doctor_fee: money::format_money(visit.doctor_fee),
            total_amount: money::format_money(visit.total_amount),
            discount_type: visit.discount_type.as_str().to_string(),
            discount_value: visit.discount_value.normalize().to_string(),
            discount_amount: money::format_money(visit.discount_amount),
            final_amount: money::format_money(visit.final_amount),
            total_paid: money::format_money(visit.total_paid),
            total_due: money::format_money(visit.total_due),
            payment_status: visit.payment_status.as_str().to_string(),
            vision_test_status: visit.vision_test_status.as_str().to_string(),
            prescription_status: visit.prescription_status.as_str().to_string(),
            overall_status: visit.overall_status.as_str().to_string(),
            chief_complaint: visit.chief_complaint,
            visit_notes: visit.visit_notes,
            created_at: visit.created_at,
            updated_at: visit.updated_at,
        }
    }
}

/// FFI-safe visit registration request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegisterVisitRequest {
    pub patient_id: String,
    pub doctor_id: Option<String>,
    /// none, percentage or amount (anything else means none)
    pub discount_type: String,
    pub discount_value: String,
    /// "0" or empty for no initial payment
    pub initial_payment_amount: String,
    pub method_id: Option<String>,
    pub chief_complaint: Option<String>,
    /// hospital, medicine or optics
    pub service_line: Option<String>,
}

impl TryFrom<FfiRegisterVisitRequest> for RegisterVisitRequest {
    type Error = ClinicError;

    fn try_from(request: FfiRegisterVisitRequest) -> Result<Self, Self::Error> {
        let initial_payment_amount = if request.initial_payment_amount.trim().is_empty() {
            Decimal::ZERO
        } else {
            parse_money_arg("initial_payment_amount", &request.initial_payment_amount)?
        };
        let service_line = request
            .service_line
            .map(|s| {
                SourceAccount::parse(s.trim())
                    .ok_or_else(|| ClinicError::InvalidInput(format!("unknown service line {:?}", s)))
            })
            .transpose()?;

        Ok(RegisterVisitRequest {
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            discount_type: DiscountType::parse_lenient(&request.discount_type),
            discount_value: parse_decimal("discount_value", &request.discount_value)?,
            initial_payment_amount,
            method_id: request.method_id,
            chief_complaint: request.chief_complaint,
            service_line,
        })
    }
}

/// FFI-safe visit registration result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegistration {
    pub visit: FfiVisit,
    pub initial_payment: Option<FfiPayment>,
}

/// FFI-safe payment request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPaymentRequest {
    pub visit_id: String,
    pub amount: String,
    pub method_id: String,
    /// YYYY-MM-DD, defaults to today
    pub payment_date: Option<String>,
    pub notes: Option<String>,
    pub received_by: Option<String>,
    pub idempotency_key: Option<String>,
}

impl TryFrom<FfiPaymentRequest> for PaymentRequest {
    type Error = ClinicError;

    fn try_from(request: FfiPaymentRequest) -> Result<Self, Self::Error> {
        Ok(PaymentRequest {
            amount: parse_money_arg("amount", &request.amount)?,
            payment_date: request
                .payment_date
                .map(|d| parse_date("payment_date", &d))
                .transpose()?,
            visit_id: request.visit_id,
            method_id: request.method_id,
            notes: request.notes,
            received_by: request.received_by,
            idempotency_key: request.idempotency_key,
        })
    }
}

/// FFI-safe payment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPayment {
    pub id: String,
    pub visit_id: String,
    pub amount: String,
    pub payment_method_id: String,
    pub payment_date: String,
    pub notes: Option<String>,
    pub received_by: Option<String>,
    pub created_at: String,
}

impl From<Payment> for FfiPayment {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            visit_id: payment.visit_id,
            amount: money::format_money(payment.amount),
            payment_method_id: payment.payment_method_id,
            payment_date: payment.payment_date,
            notes: payment.notes,
            received_by: payment.received_by,
            created_at: payment.created_at,
        }
    }
}

/// FFI-safe payment result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPaymentReceipt {
    pub payment: FfiPayment,
    pub visit: FfiVisit,
    pub voucher: Option<FfiVoucher>,
    pub replayed: bool,
}

/// FFI-safe account voucher.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVoucher {
    pub id: String,
    pub voucher_no: String,
    pub voucher_type: String,
    pub amount: String,
    pub narration: String,
    pub source_account: String,
    pub source_transaction_type: String,
    pub source_voucher_no: Option<String>,
    pub source_reference_id: Option<String>,
    pub created_at: String,
}

impl From<AccountVoucher> for FfiVoucher {
    fn from(voucher: AccountVoucher) -> Self {
        Self {
            id: voucher.id,
            voucher_no: voucher.voucher_no,
            voucher_type: voucher.voucher_type.as_str().to_string(),
            amount: money::format_money(voucher.amount),
            narration: voucher.narration,
            source_account: voucher.source_account.as_str().to_string(),
            source_transaction_type: voucher.source_transaction_type.as_str().to_string(),
            source_voucher_no: voucher.source_voucher_no,
            source_reference_id: voucher.source_reference_id,
            created_at: voucher.created_at,
        }
    }
}

/// FFI-safe completion request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCompletionRequest {
    /// vision_only, prescription_only, both or simple_complete
    pub completion_type: String,
    pub notes: Option<String>,
    pub skip_vision: bool,
    pub skip_prescription: bool,
    pub settle_due: bool,
}

impl TryFrom<FfiCompletionRequest> for CompletionRequest {
    type Error = ClinicError;

    fn try_from(request: FfiCompletionRequest) -> Result<Self, Self::Error> {
        let completion_type = CompletionType::parse(request.completion_type.trim()).ok_or_else(|| {
            ClinicError::InvalidInput(format!("unknown completion type {:?}", request.completion_type))
        })?;
        Ok(CompletionRequest {
            completion_type,
            notes: request.notes,
            skip_vision: request.skip_vision,
            skip_prescription: request.skip_prescription,
            settle_due: request.settle_due,
        })
    }
}

/// FFI-safe bulk completion failure.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBulkFailure {
    pub id: String,
    pub reason: String,
}

/// FFI-safe bulk completion report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBulkReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub incomplete: Vec<FfiBulkFailure>,
    pub failed: Vec<FfiBulkFailure>,
}

impl From<BulkFailure> for FfiBulkFailure {
    fn from(failure: BulkFailure) -> Self {
        Self {
            id: failure.id,
            reason: failure.reason,
        }
    }
}

impl From<BulkCompletionReport> for FfiBulkReport {
    fn from(report: BulkCompletionReport) -> Self {
        Self {
            succeeded: report.succeeded,
            skipped: report.skipped,
            incomplete: report.incomplete.into_iter().map(|f| f.into()).collect(),
            failed: report.failed.into_iter().map(|f| f.into()).collect(),
        }
    }
}

/// FFI-safe audit entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAuditEntry {
    pub visit_id: String,
    pub action: String,
    pub detail: Option<String>,
    pub created_at: String,
}

impl From<models::AuditEntry> for FfiAuditEntry {
    fn from(entry: models::AuditEntry) -> Self {
        Self {
            visit_id: entry.visit_id,
            action: entry.action,
            detail: entry.detail,
            created_at: entry.created_at,
        }
    }
}

/// FFI-safe visit event.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitEvent {
    /// created, updated or deleted
    pub event_type: String,
    pub visit: FfiVisit,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
}

impl From<VisitEvent> for FfiVisitEvent {
    fn from(event: VisitEvent) -> Self {
        Self {
            event_type: event.event_type.as_str().to_string(),
            visit: event.visit.visit.into(),
            patient_name: event.visit.patient_name,
            doctor_name: event.visit.doctor_name,
        }
    }
}

/// FFI-safe endpoint.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEndpoint {
    pub method: String,
    pub path: String,
}
