//! Visit database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{money_from_sql, money_to_sql, Database, DbError, DbResult};
use crate::models::{OverallStatus, PaymentStatus, SourceAccount, StepStatus, Visit};
use crate::money::DiscountType;

const VISIT_COLUMNS: &str = r#"
    id, patient_id, doctor_id, service_line,
    registration_fee, doctor_fee, total_amount, discount_type, discount_value,
    discount_amount, final_amount, total_paid, total_due,
    payment_status, vision_test_status, prescription_status, overall_status,
    vision_test_completed_at, prescription_completed_at,
    chief_complaint, visit_notes, created_at, updated_at
"#;

impl Database {
    /// Insert a new visit.
    pub fn insert_visit(&self, visit: &Visit) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO visits ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                VISIT_COLUMNS
            ),
            params![
                visit.id,
                visit.patient_id,
                visit.doctor_id,
                visit.service_line.as_str(),
                money_to_sql(visit.registration_fee),
                money_to_sql(visit.doctor_fee),
                money_to_sql(visit.total_amount),
                visit.discount_type.as_str(),
                money_to_sql(visit.discount_value),
                money_to_sql(visit.discount_amount),
                money_to_sql(visit.final_amount),
                money_to_sql(visit.total_paid),
                money_to_sql(visit.total_due),
                visit.payment_status.as_str(),
                visit.vision_test_status.as_str(),
                visit.prescription_status.as_str(),
                visit.overall_status.as_str(),
                visit.vision_test_completed_at,
                visit.prescription_completed_at,
                visit.chief_complaint,
                visit.visit_notes,
                visit.created_at,
                visit.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Persist the mutable part of a visit (totals, statuses, notes).
    ///
    /// Fees and discount are fixed at registration and never rewritten.
    pub fn update_visit(&self, visit: &Visit) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE visits SET
                total_paid = ?2,
                total_due = ?3,
                payment_status = ?4,
                vision_test_status = ?5,
                prescription_status = ?6,
                overall_status = ?7,
                vision_test_completed_at = ?8,
                prescription_completed_at = ?9,
                visit_notes = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
            params![
                visit.id,
                money_to_sql(visit.total_paid),
                money_to_sql(visit.total_due),
                visit.payment_status.as_str(),
                visit.vision_test_status.as_str(),
                visit.prescription_status.as_str(),
                visit.overall_status.as_str(),
                visit.vision_test_completed_at,
                visit.prescription_completed_at,
                visit.visit_notes,
                visit.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM visits WHERE id = ?", VISIT_COLUMNS),
                [id],
                visit_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List visits for a patient, newest first.
    pub fn list_visits_for_patient(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        self.query_visits(
            &format!(
                "SELECT {} FROM visits WHERE patient_id = ? ORDER BY created_at DESC",
                VISIT_COLUMNS
            ),
            [patient_id],
        )
    }

    /// List visits that are not yet completed, oldest first.
    pub fn list_open_visits(&self) -> DbResult<Vec<Visit>> {
        self.query_visits(
            &format!(
                "SELECT {} FROM visits WHERE overall_status != 'completed' ORDER BY created_at",
                VISIT_COLUMNS
            ),
            [],
        )
    }

    /// Delete a visit row. Payments must already be gone.
    pub fn delete_visit_row(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM visits WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    fn query_visits<P: rusqlite::Params>(&self, sql: &str, params: P) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, visit_row)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }
}

fn visit_row(row: &Row<'_>) -> rusqlite::Result<VisitRow> {
    Ok(VisitRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        service_line: row.get(3)?,
        registration_fee: row.get(4)?,
        doctor_fee: row.get(5)?,
        total_amount: row.get(6)?,
        discount_type: row.get(7)?,
        discount_value: row.get(8)?,
        discount_amount: row.get(9)?,
        final_amount: row.get(10)?,
        total_paid: row.get(11)?,
        total_due: row.get(12)?,
        payment_status: row.get(13)?,
        vision_test_status: row.get(14)?,
        prescription_status: row.get(15)?,
        overall_status: row.get(16)?,
        vision_test_completed_at: row.get(17)?,
        prescription_completed_at: row.get(18)?,
        chief_complaint: row.get(19)?,
        visit_notes: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}

/// Intermediate row struct for database mapping.
struct VisitRow {
    id: String,
    patient_id: String,
    doctor_id: Option<String>,
    service_line: String,
    registration_fee: String,
    doctor_fee: String,
    total_amount: String,
    discount_type: String,
    discount_value: String,
    discount_amount: String,
    final_amount: String,
    total_paid: String,
    total_due: String,
    payment_status: String,
    vision_test_status: String,
    prescription_status: String,
    overall_status: String,
    vision_test_completed_at: Option<String>,
    prescription_completed_at: Option<String>,
    chief_complaint: Option<String>,
    visit_notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<VisitRow> for Visit {
    type Error = DbError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        Ok(Visit {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            service_line: SourceAccount::parse(&row.service_line).ok_or_else(|| {
                DbError::Constraint(format!("Unknown service line: {}", row.service_line))
            })?,
            registration_fee: money_from_sql("registration_fee", &row.registration_fee)?,
            doctor_fee: money_from_sql("doctor_fee", &row.doctor_fee)?,
            total_amount: money_from_sql("total_amount", &row.total_amount)?,
            discount_type: string_to_discount_type(&row.discount_type)?,
            discount_value: money_from_sql("discount_value", &row.discount_value)?,
            discount_amount: money_from_sql("discount_amount", &row.discount_amount)?,
            final_amount: money_from_sql("final_amount", &row.final_amount)?,
            total_paid: money_from_sql("total_paid", &row.total_paid)?,
            total_due: money_from_sql("total_due", &row.total_due)?,
            payment_status: string_to_payment_status(&row.payment_status)?,
            vision_test_status: string_to_step_status(&row.vision_test_status)?,
            prescription_status: string_to_step_status(&row.prescription_status)?,
            overall_status: string_to_overall_status(&row.overall_status)?,
            vision_test_completed_at: row.vision_test_completed_at,
            prescription_completed_at: row.prescription_completed_at,
            chief_complaint: row.chief_complaint,
            visit_notes: row.visit_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn string_to_discount_type(s: &str) -> Result<DiscountType, DbError> {
    match s {
        "none" => Ok(DiscountType::None),
        "percentage" => Ok(DiscountType::Percentage),
        "amount" => Ok(DiscountType::Amount),
        _ => Err(DbError::Constraint(format!("Unknown discount type: {}", s))),
    }
}

fn string_to_payment_status(s: &str) -> Result<PaymentStatus, DbError> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "partial" => Ok(PaymentStatus::Partial),
        "paid" => Ok(PaymentStatus::Paid),
        _ => Err(DbError::Constraint(format!("Unknown payment status: {}", s))),
    }
}

fn string_to_step_status(s: &str) -> Result<StepStatus, DbError> {
    match s {
        "pending" => Ok(StepStatus::Pending),
        "completed" => Ok(StepStatus::Completed),
        _ => Err(DbError::Constraint(format!("Unknown step status: {}", s))),
    }
}

fn string_to_overall_status(s: &str) -> Result<OverallStatus, DbError> {
    match s {
        "pending" => Ok(OverallStatus::Pending),
        "vision_test" => Ok(OverallStatus::VisionTest),
        "prescription" => Ok(OverallStatus::Prescription),
        "completed" => Ok(OverallStatus::Completed),
        _ => Err(DbError::Constraint(format!("Unknown overall status: {}", s))),
    }
}
