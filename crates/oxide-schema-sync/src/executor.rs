//! The connection/executor abstraction.
//!
//! The engine needs exactly three things from a live connection: execute a
//! statement returning the affected-row count, run a query returning rows,
//! and begin/commit/rollback a transaction. [`Executor`] captures that and
//! nothing more, which keeps the engine testable behind wrappers and free
//! of any driver-specific type inspection. A SQLite implementation over
//! `sqlx` is bundled.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, Row as _, SqliteConnection, TypeInfo, ValueRef};
use tokio_util::sync::CancellationToken;

/// A single value read from a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
    /// Binary value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns true for SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as text, when it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as an integer. Text values holding an integer are
    /// parsed, since catalog queries on some backends report numbers as
    /// strings.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as owned text, when it is text.
    #[must_use]
    pub fn into_string(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One result row.
pub type Row = Vec<SqlValue>;

/// Failure reported by an executor implementation.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ExecutorError {
    /// The backend's error message.
    pub message: String,
}

impl ExecutorError {
    /// Creates a new executor error.
    #[must_use]
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Minimal abstraction over a live database connection.
///
/// One executor represents one connection; the engine never opens a second
/// one implicitly. A caller-supplied transaction is modeled by handing the
/// engine an executor whose [`Executor::in_transaction`] already reports
/// true — every statement the engine issues then joins that transaction.
#[async_trait]
pub trait Executor: Send {
    /// Executes a statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str) -> std::result::Result<u64, ExecutorError>;

    /// Runs a query, returning all result rows.
    async fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, ExecutorError>;

    /// Begins a transaction.
    async fn begin(&mut self) -> std::result::Result<(), ExecutorError>;

    /// Commits the open transaction.
    async fn commit(&mut self) -> std::result::Result<(), ExecutorError>;

    /// Rolls back the open transaction.
    async fn rollback(&mut self) -> std::result::Result<(), ExecutorError>;

    /// Returns whether a transaction is currently open.
    fn in_transaction(&self) -> bool;
}

/// Per-operation options: statement timeout and cooperative cancellation.
///
/// The timeout applies to each statement individually and passes through
/// unchanged. Cancellation is checked before issuing the next statement,
/// never by aborting one already in flight.
#[derive(Debug, Clone, Default)]
pub struct OpOptions {
    /// Per-statement timeout.
    pub statement_timeout: Option<Duration>,
    /// Cooperative cancellation signal.
    pub cancellation: Option<CancellationToken>,
}

impl OpOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-statement timeout.
    #[must_use]
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns true when the cancellation signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// [`Executor`] implementation over a single `sqlx` SQLite connection.
pub struct SqliteExecutor {
    conn: SqliteConnection,
    in_tx: bool,
}

impl SqliteExecutor {
    /// Connects to the given SQLite URL (e.g. `sqlite::memory:`).
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be established.
    pub async fn connect(url: &str) -> std::result::Result<Self, ExecutorError> {
        let conn = SqliteConnection::connect(url)
            .await
            .map_err(ExecutorError::new)?;
        Ok(Self { conn, in_tx: false })
    }

    /// Wraps an already-open connection.
    #[must_use]
    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self { conn, in_tx: false }
    }

    fn decode_row(row: &SqliteRow) -> std::result::Result<Row, ExecutorError> {
        let mut values = Vec::with_capacity(row.len());
        for i in 0..row.len() {
            let raw = row.try_get_raw(i).map_err(ExecutorError::new)?;
            if raw.is_null() {
                values.push(SqlValue::Null);
                continue;
            }
            let type_info = raw.type_info();
            let value = match type_info.name() {
                "INTEGER" => SqlValue::Integer(row.try_get(i).map_err(ExecutorError::new)?),
                "REAL" => SqlValue::Real(row.try_get(i).map_err(ExecutorError::new)?),
                "BLOB" => SqlValue::Blob(row.try_get(i).map_err(ExecutorError::new)?),
                _ => SqlValue::Text(row.try_get(i).map_err(ExecutorError::new)?),
            };
            values.push(value);
        }
        Ok(values)
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    async fn execute(&mut self, sql: &str) -> std::result::Result<u64, ExecutorError> {
        let result = sqlx::query(sql)
            .execute(&mut self.conn)
            .await
            .map_err(ExecutorError::new)?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, ExecutorError> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(ExecutorError::new)?;
        rows.iter().map(Self::decode_row).collect()
    }

    async fn begin(&mut self) -> std::result::Result<(), ExecutorError> {
        if self.in_tx {
            return Err(ExecutorError::new("transaction already open"));
        }
        self.execute("BEGIN").await?;
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> std::result::Result<(), ExecutorError> {
        if !self.in_tx {
            return Err(ExecutorError::new("no open transaction"));
        }
        self.in_tx = false;
        self.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> std::result::Result<(), ExecutorError> {
        if !self.in_tx {
            return Err(ExecutorError::new("no open transaction"));
        }
        self.in_tx = false;
        self.execute("ROLLBACK").await?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory() -> SqliteExecutor {
        SqliteExecutor::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_execute_and_query() {
        let mut exec = memory().await;
        exec.execute("CREATE TABLE t (a INTEGER, b TEXT, c REAL, d BLOB)")
            .await
            .unwrap();
        let affected = exec
            .execute("INSERT INTO t VALUES (1, 'one', 1.5, x'01'), (2, NULL, 2.5, x'02')")
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let rows = exec.query("SELECT a, b, c, d FROM t ORDER BY a").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], SqlValue::Integer(1));
        assert_eq!(rows[0][1], SqlValue::Text("one".to_string()));
        assert_eq!(rows[0][2], SqlValue::Real(1.5));
        assert_eq!(rows[0][3], SqlValue::Blob(vec![1]));
        assert!(rows[1][1].is_null());
    }

    #[tokio::test]
    async fn test_transaction_rollback() {
        let mut exec = memory().await;
        exec.execute("CREATE TABLE t (a INTEGER)").await.unwrap();
        exec.begin().await.unwrap();
        assert!(exec.in_transaction());
        exec.execute("INSERT INTO t VALUES (1)").await.unwrap();
        exec.rollback().await.unwrap();
        assert!(!exec.in_transaction());

        let rows = exec.query("SELECT COUNT(*) FROM t").await.unwrap();
        assert_eq!(rows[0][0], SqlValue::Integer(0));
    }

    #[tokio::test]
    async fn test_nested_begin_rejected() {
        let mut exec = memory().await;
        exec.begin().await.unwrap();
        assert!(exec.begin().await.is_err());
        exec.rollback().await.unwrap();
    }

    #[test]
    fn test_sql_value_coercions() {
        assert_eq!(SqlValue::Integer(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Text("7".to_string()).as_i64(), Some(7));
        assert_eq!(SqlValue::Text("x".to_string()).as_i64(), None);
        assert_eq!(SqlValue::Null.as_str(), None);
    }

    #[test]
    fn test_op_options_cancellation() {
        let token = CancellationToken::new();
        let opts = OpOptions::new().cancellation(token.clone());
        assert!(!opts.is_cancelled());
        token.cancel();
        assert!(opts.is_cancelled());
    }
}
