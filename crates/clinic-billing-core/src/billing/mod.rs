//! Visit billing and status lifecycle.
//!
//! A visit is priced by the cost calculator, then moved through its steps by the
//! status machine. The status machine and the payment ledger call each other when a
//! completion settles the due. The ledger hands every payment to the voucher poster,
//! and bulk completion runs the status machine once per visit.
//!
//! Every state-changing call runs in one immediate SQLite transaction and publishes
//! its event only after `COMMIT`.

mod bulk;
mod cost;
mod events;
mod ledger;
mod status;
mod visits;
mod voucher;

pub use bulk::*;
pub use cost::*;
pub use events::*;
pub use ledger::*;
pub use status::*;
pub use visits::*;
pub use voucher::*;

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::Visit;

/// Billing errors.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Missing evidence: {0}")]
    MissingEvidence(String),

    #[error("Idempotency key conflict: {0}")]
    IdempotencyConflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for BillingError {
    fn from(e: DbError) -> Self {
        if e.is_lock_contention() {
            return BillingError::ConcurrentModification(e.to_string());
        }
        match e {
            DbError::NotFound(what) => BillingError::NotFound(what),
            other => BillingError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for BillingError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::from(e).into()
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

/// Fetch a visit or fail with `NotFound`.
pub(crate) fn load_visit(db: &Database, visit_id: &str) -> BillingResult<Visit> {
    db.get_visit(visit_id)?
        .ok_or_else(|| BillingError::NotFound(format!("visit {}", visit_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    #[test]
    fn test_busy_maps_to_concurrent_modification() {
        let busy = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None);
        assert!(matches!(
            BillingError::from(busy),
            BillingError::ConcurrentModification(_)
        ));

        let other = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(BillingError::from(other), BillingError::Database(_)));
    }
}
