//! Store adapter
//!
//! The core reaches the relational store only through the `Store` trait.
//! `SqliteStore` is the production implementation: one connection behind a
//! reentrant lock, so every statement from every thread is serialized and a
//! transaction body can issue statements on the thread that opened it.

use std::time::{Duration, Instant};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::deadline::Deadline;
use crate::error::{ExecutionError, RuntimeError, StoreTimeoutError};

/// SQLite VM instructions between deadline checks
const PROGRESS_INTERVAL: i32 = 1_000;

/// Longest single wait for the connection lock before the deadline and
/// token are looked at again
const LOCK_SLICE: Duration = Duration::from_millis(10);

/// Column value as returned by the store, before conversion to a `Value`
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl RawValue {
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "NULL",
            RawValue::Integer(_) => "INTEGER",
            RawValue::Real(_) => "REAL",
            RawValue::Text(_) => "TEXT",
            RawValue::Blob(_) => "BLOB",
        }
    }
}

impl From<ValueRef<'_>> for RawValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => RawValue::Null,
            ValueRef::Integer(i) => RawValue::Integer(i),
            ValueRef::Real(f) => RawValue::Real(f),
            ValueRef::Text(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => RawValue::Text(text),
                Err(e) => RawValue::Blob(e.into_bytes()),
            },
            ValueRef::Blob(bytes) => RawValue::Blob(bytes.to_vec()),
        }
    }
}

/// One result row, index-aligned with the selected columns
pub type Row = Vec<RawValue>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Timeout(#[from] StoreTimeoutError),
}

impl StoreError {
    /// Attach the statement (and batch position) that failed
    pub fn into_runtime(self, statement: &str, record: Option<usize>) -> RuntimeError {
        match self {
            StoreError::Timeout(e) => RuntimeError::StoreTimeout(e),
            StoreError::Sqlite(e) => ExecutionError::Rejected {
                statement: statement.to_string(),
                record,
                message: e.to_string(),
            }
            .into(),
        }
    }
}

/// How a transaction body wants its transaction to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEnd {
    Commit,
    Rollback,
}

/// Synchronous statement interface to the relational store
pub trait Store: Send + Sync {
    /// Run a query and collect every row
    fn query(&self, sql: &str, deadline: &Deadline) -> Result<Vec<Row>, StoreError>;

    /// Run one statement, returning the number of rows it changed
    fn execute(&self, sql: &str, deadline: &Deadline) -> Result<usize, StoreError>;

    /// Run a semicolon-separated script (schema setup, seeding)
    fn execute_batch(&self, sql: &str, deadline: &Deadline) -> Result<(), StoreError>;

    fn table_exists(&self, table: &str, deadline: &Deadline) -> Result<bool, StoreError>;

    /// Run `body` inside one transaction. Statements the body issues through
    /// the store it is handed belong to the transaction. `deadline` bounds
    /// waiting for the connection, BEGIN and COMMIT; a rollback always runs.
    fn in_transaction(
        &self,
        deadline: &Deadline,
        body: &mut dyn FnMut(&dyn Store) -> TransactionEnd,
    ) -> Result<TransactionEnd, StoreError>;
}

pub struct SqliteStore {
    conn: ReentrantMutex<Connection>,
}

impl SqliteStore {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let conn = if config.path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        info!(path = %config.path, "store opened");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(&StoreConfig::in_memory())
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: ReentrantMutex::new(conn),
        }
    }

    /// Take the connection lock, giving up once `deadline` expires or its
    /// token is cancelled. Reentrant: the owning thread gets it at once.
    fn acquire(&self, sql: &str, deadline: &Deadline) -> Result<ReentrantMutexGuard<'_, Connection>, StoreError> {
        loop {
            deadline.check(sql)?;
            let slice = match deadline.instant() {
                Some(at) => at.saturating_duration_since(Instant::now()).min(LOCK_SLICE),
                None => LOCK_SLICE,
            };
            if let Some(conn) = self.conn.try_lock_for(slice) {
                deadline.check(sql)?;
                return Ok(conn);
            }
        }
    }

    /// Run `f` with the deadline armed on the connection's progress handler
    fn guarded<T>(
        &self,
        sql: &str,
        deadline: &Deadline,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        deadline.check(sql)?;
        debug!(sql, "store call");

        let conn = self.acquire(sql, deadline)?;
        let watch = deadline.clone();
        conn.progress_handler(
            PROGRESS_INTERVAL,
            Some(move || watch.interruption().is_some()),
        );
        let result = f(&conn);
        conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::OperationInterrupted => {
                match deadline.interruption() {
                    Some(reason) => StoreTimeoutError {
                        statement: sql.to_string(),
                        reason,
                    }
                    .into(),
                    None => StoreError::Sqlite(e),
                }
            }
            other => StoreError::Sqlite(other),
        })
    }

    fn rollback(&self) -> Result<(), StoreError> {
        self.guarded("ROLLBACK", &Deadline::none(), |conn| conn.execute_batch("ROLLBACK"))
    }
}

impl Store for SqliteStore {
    fn query(&self, sql: &str, deadline: &Deadline) -> Result<Vec<Row>, StoreError> {
        self.guarded(sql, deadline, |conn| {
            let mut stmt = conn.prepare(sql)?;
            let width = stmt.column_count();
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(RawValue::from(row.get_ref(i)?));
                }
                out.push(values);
            }
            Ok(out)
        })
    }

    fn execute(&self, sql: &str, deadline: &Deadline) -> Result<usize, StoreError> {
        self.guarded(sql, deadline, |conn| conn.execute(sql, []))
    }

    fn execute_batch(&self, sql: &str, deadline: &Deadline) -> Result<(), StoreError> {
        self.guarded(sql, deadline, |conn| conn.execute_batch(sql))
    }

    fn table_exists(&self, table: &str, deadline: &Deadline) -> Result<bool, StoreError> {
        let sql = "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE";
        let count: i64 = self.guarded(sql, deadline, |conn| conn.query_row(sql, [table], |row| row.get(0)))?;
        Ok(count > 0)
    }

    fn in_transaction(
        &self,
        deadline: &Deadline,
        body: &mut dyn FnMut(&dyn Store) -> TransactionEnd,
    ) -> Result<TransactionEnd, StoreError> {
        // Held across the body so no other thread interleaves statements
        let _conn = self.acquire("BEGIN", deadline)?;
        self.guarded("BEGIN", deadline, |conn| conn.execute_batch("BEGIN"))?;
        let end = body(self);
        match end {
            TransactionEnd::Commit => {
                if let Err(e) = self.guarded("COMMIT", deadline, |conn| conn.execute_batch("COMMIT")) {
                    if let Err(rollback) = self.rollback() {
                        warn!(error = %rollback, "rollback after failed commit also failed");
                    }
                    return Err(e);
                }
            }
            TransactionEnd::Rollback => self.rollback()?,
        }
        Ok(end)
    }
}
