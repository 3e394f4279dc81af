//! Vision test and prescription database operations.

use rusqlite::params;

use super::{Database, DbResult};
use crate::models::{Prescription, VisionTest};

impl Database {
    /// Insert a vision test record.
    pub fn insert_vision_test(&self, test: &VisionTest) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO vision_tests (id, patient_id, visit_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![test.id, test.patient_id, test.visit_id, test.created_at],
        )?;
        Ok(())
    }

    /// Insert a prescription record.
    pub fn insert_prescription(&self, prescription: &Prescription) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO prescriptions (id, patient_id, visit_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                prescription.id,
                prescription.patient_id,
                prescription.visit_id,
                prescription.created_at
            ],
        )?;
        Ok(())
    }

    /// Whether any vision test is linked to the visit.
    pub fn visit_has_vision_test(&self, visit_id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM vision_tests WHERE visit_id = ?",
            [visit_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether any prescription is linked to the visit.
    pub fn visit_has_prescription(&self, visit_id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM prescriptions WHERE visit_id = ?",
            [visit_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Detach clinical records from a visit that is about to be deleted.
    /// They stay on file as standalone records.
    pub fn unlink_clinical_records(&self, visit_id: &str) -> DbResult<usize> {
        let tests = self.conn.execute(
            "UPDATE vision_tests SET visit_id = NULL WHERE visit_id = ?",
            [visit_id],
        )?;
        let prescriptions = self.conn.execute(
            "UPDATE prescriptions SET visit_id = NULL WHERE visit_id = ?",
            [visit_id],
        )?;
        Ok(tests + prescriptions)
    }

    /// Delete every clinical record belonging to a patient.
    pub fn delete_clinical_records_for_patient(&self, patient_id: &str) -> DbResult<usize> {
        let tests = self
            .conn
            .execute("DELETE FROM vision_tests WHERE patient_id = ?", [patient_id])?;
        let prescriptions = self
            .conn
            .execute("DELETE FROM prescriptions WHERE patient_id = ?", [patient_id])?;
        Ok(tests + prescriptions)
    }
}
