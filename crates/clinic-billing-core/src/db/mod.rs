//! Database layer for the clinic billing core.

mod audit;
mod clinical;
mod doctors;
mod patients;
mod payments;
mod schema;
mod visits;
mod vouchers;

pub use schema::*;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use thiserror::Error;

/// Default wait for SQLite's write lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl DbError {
    /// True when SQLite gave up waiting for a lock.
    pub fn is_lock_contention(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open database at path with an explicit lock wait.
    pub fn open_with_busy_timeout<P: AsRef<Path>>(path: P, timeout: Duration) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction that takes SQLite's write lock immediately.
    ///
    /// Statements issued through `&self` while the returned guard is alive run inside
    /// it. Dropping the guard without `commit()` rolls everything back.
    pub fn begin_immediate(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

/// Money is stored as decimal text.
pub(crate) fn money_to_sql(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(crate) fn money_from_sql(column: &str, value: &str) -> DbResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| DbError::Constraint(format!("Invalid decimal in {}: {} ({})", column, value, e)))
}
