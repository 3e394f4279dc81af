//! SQLite schema definition.

/// Complete database schema for the clinic billing core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients & Doctors
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT,
    age INTEGER,
    gender TEXT,
    address TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

CREATE TABLE IF NOT EXISTS doctors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    specialization TEXT,
    consultation_fee TEXT NOT NULL DEFAULT '0',   -- decimal text
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS payment_methods (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

INSERT OR IGNORE INTO payment_methods (id, name, active) VALUES ('cash', 'Cash', 1);
INSERT OR IGNORE INTO payment_methods (id, name, active) VALUES ('card', 'Card', 1);
INSERT OR IGNORE INTO payment_methods (id, name, active) VALUES ('mobile_banking', 'Mobile Banking', 1);

-- ============================================================================
-- Visits (money columns are decimal text, derived columns kept in sync by the core)
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    doctor_id TEXT REFERENCES doctors(id),
    service_line TEXT NOT NULL DEFAULT 'hospital'
        CHECK (service_line IN ('hospital', 'medicine', 'optics')),
    registration_fee TEXT NOT NULL,
    doctor_fee TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    discount_type TEXT NOT NULL DEFAULT 'none'
        CHECK (discount_type IN ('none', 'percentage', 'amount')),
    discount_value TEXT NOT NULL DEFAULT '0',
    discount_amount TEXT NOT NULL,
    final_amount TEXT NOT NULL,
    total_paid TEXT NOT NULL DEFAULT '0',
    total_due TEXT NOT NULL,
    payment_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (payment_status IN ('pending', 'partial', 'paid')),
    vision_test_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (vision_test_status IN ('pending', 'completed')),
    prescription_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (prescription_status IN ('pending', 'completed')),
    overall_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (overall_status IN ('pending', 'vision_test', 'prescription', 'completed')),
    vision_test_completed_at TEXT,
    prescription_completed_at TEXT,
    chief_complaint TEXT,
    visit_notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_visits_patient ON visits(patient_id);
CREATE INDEX IF NOT EXISTS idx_visits_overall ON visits(overall_status);

-- ============================================================================
-- Payments (append-only per visit; removed only together with their visit)
-- ============================================================================

CREATE TABLE IF NOT EXISTS payments (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    amount TEXT NOT NULL,
    payment_method_id TEXT NOT NULL REFERENCES payment_methods(id),
    payment_date TEXT NOT NULL,
    notes TEXT,
    received_by TEXT,
    idempotency_key TEXT UNIQUE,
    request_fingerprint TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_payments_visit ON payments(visit_id);

CREATE TRIGGER IF NOT EXISTS payments_no_update BEFORE UPDATE ON payments
BEGIN
    SELECT RAISE(ABORT, 'Payments are immutable');
END;

-- ============================================================================
-- Account Vouchers (Append-Only - never updated or deleted)
-- ============================================================================

-- No foreign keys: vouchers outlive the payments and visits they reference
CREATE TABLE IF NOT EXISTS account_vouchers (
    id TEXT PRIMARY KEY,
    voucher_no TEXT NOT NULL UNIQUE,
    voucher_type TEXT NOT NULL CHECK (voucher_type IN ('Debit', 'Credit')),
    amount TEXT NOT NULL,
    narration TEXT NOT NULL,
    source_account TEXT NOT NULL,
    source_transaction_type TEXT NOT NULL
        CHECK (source_transaction_type IN ('income', 'expense', 'fund_in', 'fund_out')),
    source_voucher_no TEXT,
    source_reference_id TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_vouchers_reference ON account_vouchers(source_reference_id);
CREATE INDEX IF NOT EXISTS idx_vouchers_account ON account_vouchers(source_account);

CREATE TRIGGER IF NOT EXISTS account_vouchers_no_update BEFORE UPDATE ON account_vouchers
BEGIN
    SELECT RAISE(ABORT, 'Vouchers are append-only');
END;

CREATE TRIGGER IF NOT EXISTS account_vouchers_no_delete BEFORE DELETE ON account_vouchers
BEGIN
    SELECT RAISE(ABORT, 'Vouchers are append-only');
END;

-- ============================================================================
-- Clinical evidence (weakly linked to visits)
-- ============================================================================

CREATE TABLE IF NOT EXISTS vision_tests (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    visit_id TEXT REFERENCES visits(id),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_vision_tests_visit ON vision_tests(visit_id);

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    visit_id TEXT REFERENCES visits(id),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_visit ON prescriptions(visit_id);

-- ============================================================================
-- Audit trail (kept after the visit is deleted)
-- ============================================================================

CREATE TABLE IF NOT EXISTS visit_audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    visit_id TEXT NOT NULL,
    action TEXT NOT NULL,
    detail TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_audit_visit ON visit_audit_log(visit_id);
"#;
