//! Visit audit trail.

use rusqlite::params;

use super::{Database, DbResult};
use crate::models::AuditEntry;

impl Database {
    /// Append an audit entry for a visit.
    pub fn append_audit(&self, visit_id: &str, action: &str, detail: Option<&str>) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO visit_audit_log (visit_id, action, detail, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![visit_id, action, detail, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Audit entries for a visit, oldest first.
    pub fn list_audit_for_visit(&self, visit_id: &str) -> DbResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, visit_id, action, detail, created_at
            FROM visit_audit_log
            WHERE visit_id = ?
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([visit_id], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                visit_id: row.get(1)?,
                action: row.get(2)?,
                detail: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
