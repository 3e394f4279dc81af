//! Payment database operations.

use rust_decimal::Decimal;
use rusqlite::{params, OptionalExtension, Row};

use super::{money_from_sql, money_to_sql, Database, DbError, DbResult};
use crate::models::Payment;
use crate::money;

const PAYMENT_COLUMNS: &str = r#"
    id, visit_id, amount, payment_method_id, payment_date, notes, received_by,
    idempotency_key, request_fingerprint, created_at
"#;

impl Database {
    /// Insert a payment. Payments are never updated afterwards.
    pub fn insert_payment(&self, payment: &Payment) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO payments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                PAYMENT_COLUMNS
            ),
            params![
                payment.id,
                payment.visit_id,
                money_to_sql(payment.amount),
                payment.payment_method_id,
                payment.payment_date,
                payment.notes,
                payment.received_by,
                payment.idempotency_key,
                payment.request_fingerprint,
                payment.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get the payment that used an idempotency key, if any.
    pub fn get_payment_by_idempotency_key(&self, key: &str) -> DbResult<Option<Payment>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM payments WHERE idempotency_key = ?", PAYMENT_COLUMNS),
                [key],
                payment_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List payments for a visit in the order they were taken.
    pub fn list_payments_for_visit(&self, visit_id: &str) -> DbResult<Vec<Payment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM payments WHERE visit_id = ? ORDER BY created_at, rowid",
            PAYMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([visit_id], payment_row)?;

        let mut payments = Vec::new();
        for row in rows {
            payments.push(row?.try_into()?);
        }
        Ok(payments)
    }

    /// Sum of all payment amounts for a visit.
    pub fn sum_payments_for_visit(&self, visit_id: &str) -> DbResult<Decimal> {
        let payments = self.list_payments_for_visit(visit_id)?;
        money::checked_sum(payments.iter().map(|p| p.amount))
            .ok_or_else(|| DbError::Constraint(format!("payment sum for visit {} overflows", visit_id)))
    }

    /// Remove a payment row. Only valid once its credit has been counter-posted.
    pub fn delete_payment(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM payments WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn payment_row(row: &Row<'_>) -> rusqlite::Result<PaymentRow> {
    Ok(PaymentRow {
        id: row.get(0)?,
        visit_id: row.get(1)?,
        amount: row.get(2)?,
        payment_method_id: row.get(3)?,
        payment_date: row.get(4)?,
        notes: row.get(5)?,
        received_by: row.get(6)?,
        idempotency_key: row.get(7)?,
        request_fingerprint: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Intermediate row struct for database mapping.
struct PaymentRow {
    id: String,
    visit_id: String,
    amount: String,
    payment_method_id: String,
    payment_date: String,
    notes: Option<String>,
    received_by: Option<String>,
    idempotency_key: Option<String>,
    request_fingerprint: Option<String>,
    created_at: String,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            visit_id: row.visit_id,
            amount: money_from_sql("amount", &row.amount)?,
            payment_method_id: row.payment_method_id,
            payment_date: row.payment_date,
            notes: row.notes,
            received_by: row.received_by,
            idempotency_key: row.idempotency_key,
            request_fingerprint: row.request_fingerprint,
            created_at: row.created_at,
        })
    }
}
