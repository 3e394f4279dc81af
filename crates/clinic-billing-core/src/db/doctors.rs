//! Doctor and payment method database operations.

use rusqlite::{params, OptionalExtension};

use super::{money_from_sql, money_to_sql, Database, DbError, DbResult};
use crate::models::{Doctor, PaymentMethod};

impl Database {
    /// Insert or replace a doctor.
    pub fn upsert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO doctors (id, name, specialization, consultation_fee, active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                specialization = excluded.specialization,
                consultation_fee = excluded.consultation_fee,
                active = excluded.active
            "#,
            params![
                doctor.id,
                doctor.name,
                doctor.specialization,
                money_to_sql(doctor.consultation_fee),
                doctor.active,
            ],
        )?;
        Ok(())
    }

    /// Get a doctor by ID.
    pub fn get_doctor(&self, id: &str) -> DbResult<Option<Doctor>> {
        self.conn
            .query_row(
                "SELECT id, name, specialization, consultation_fee, active FROM doctors WHERE id = ?",
                [id],
                |row| {
                    Ok(DoctorRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        specialization: row.get(2)?,
                        consultation_fee: row.get(3)?,
                        active: row.get(4)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List active doctors by name.
    pub fn list_active_doctors(&self) -> DbResult<Vec<Doctor>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, specialization, consultation_fee, active
            FROM doctors
            WHERE active = 1
            ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(DoctorRow {
                id: row.get(0)?,
                name: row.get(1)?,
                specialization: row.get(2)?,
                consultation_fee: row.get(3)?,
                active: row.get(4)?,
            })
        })?;

        let mut doctors = Vec::new();
        for row in rows {
            doctors.push(row?.try_into()?);
        }
        Ok(doctors)
    }

    /// Insert or replace a payment method.
    pub fn upsert_payment_method(&self, method: &PaymentMethod) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO payment_methods (id, name, active) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, active = excluded.active
            "#,
            params![method.id, method.name, method.active],
        )?;
        Ok(())
    }

    /// Get a payment method by ID.
    pub fn get_payment_method(&self, id: &str) -> DbResult<Option<PaymentMethod>> {
        self.conn
            .query_row(
                "SELECT id, name, active FROM payment_methods WHERE id = ?",
                [id],
                |row| {
                    Ok(PaymentMethod {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        active: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// List active payment methods.
    pub fn list_payment_methods(&self) -> DbResult<Vec<PaymentMethod>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, active FROM payment_methods WHERE active = 1 ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(PaymentMethod {
                id: row.get(0)?,
                name: row.get(1)?,
                active: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// Intermediate row struct for database mapping.
struct DoctorRow {
    id: String,
    name: String,
    specialization: Option<String>,
    consultation_fee: String,
    active: bool,
}

impl TryFrom<DoctorRow> for Doctor {
    type Error = DbError;

    fn try_from(row: DoctorRow) -> Result<Self, Self::Error> {
        Ok(Doctor {
            id: row.id,
            name: row.name,
            specialization: row.specialization,
            consultation_fee: money_from_sql("consultation_fee", &row.consultation_fee)?,
            active: row.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_upsert_and_get_doctor() {
        let db = Database::open_in_memory().unwrap();
        let mut doctor = Doctor::new("Dr. Hasan".into(), Decimal::new(50000, 2));
        db.upsert_doctor(&doctor).unwrap();

        let retrieved = db.get_doctor(&doctor.id).unwrap().unwrap();
        assert_eq!(retrieved.consultation_fee, Decimal::new(500, 0));

        doctor.active = false;
        db.upsert_doctor(&doctor).unwrap();
        assert!(db.list_active_doctors().unwrap().is_empty());
    }

    #[test]
    fn test_seeded_payment_methods() {
        let db = Database::open_in_memory().unwrap();
        let methods = db.list_payment_methods().unwrap();
        assert_eq!(methods.len(), 3);
        assert!(db.get_payment_method("cash").unwrap().is_some());
        assert!(db.get_payment_method("barter").unwrap().is_none());
    }
}
