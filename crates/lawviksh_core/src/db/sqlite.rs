//! Embedded SQLite backend.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections lazily.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before the connection is used.
//!
//! # Invariants
//! - Open connections have `foreign_keys=ON`.
//! - Open connections have migrations fully applied.
//! - Outside an explicit unit of work SQLite autocommits per statement.

use super::backend::{is_read_statement, BackendKind, StorageBackend};
use super::migrations::apply_migrations;
use super::value::{ExecOutcome, Row, SqlValue};
use super::{ConnectionError, DbError, DbResult, ExecutionError, ExecutionErrorKind, NativeError};
use crate::logging::log_excerpt;
use log::{error, info, warn};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode, ToSql};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the embedded database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    File(PathBuf),
    /// Private in-memory database; its content is lost on disconnect.
    Memory,
}

impl SqliteLocation {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// SQLite implementation of [`StorageBackend`].
pub struct SqliteBackend {
    location: SqliteLocation,
    conn: Option<Connection>,
}

impl SqliteBackend {
    /// Backend for a database file. Nothing is opened until first use.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: SqliteLocation::File(path.into()),
            conn: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: SqliteLocation::Memory,
            conn: None,
        }
    }

    pub fn location(&self) -> &SqliteLocation {
        &self.location
    }

    fn connection(&mut self) -> DbResult<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.open()?,
        };
        Ok(self.conn.insert(conn))
    }

    fn open(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        let mode = self.location.mode();
        info!("event=db_open module=db status=start backend=sqlite mode={mode}");

        let mut conn = match open_connection(&self.location) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=db status=error backend=sqlite mode={mode} duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        if let Err(err) = bootstrap_connection(&mut conn) {
            error!(
                "event=db_open module=db status=error backend=sqlite mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        info!(
            "event=db_open module=db status=ok backend=sqlite mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(conn)
    }

    fn run_control(&mut self, statement: &str) -> DbResult<()> {
        let conn = self.connection()?;
        conn.execute_batch(statement)
            .map_err(|err| sqlite_execution_error(statement, err))
    }
}

impl StorageBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn connect(&mut self) -> DbResult<()> {
        if self.conn.is_none() {
            self.conn = Some(self.open()?);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> DbResult<ExecOutcome> {
        let conn = self.connection()?;
        run_statement(conn, statement, params).map_err(|err| {
            log_execution_failure(&err);
            err
        })
    }

    fn last_insert_id(&mut self) -> DbResult<i64> {
        Ok(self.connection()?.last_insert_rowid())
    }

    fn begin(&mut self) -> DbResult<()> {
        // Write lock is held from BEGIN, not from the first write.
        self.run_control("BEGIN IMMEDIATE;")
    }

    fn commit(&mut self) -> DbResult<()> {
        self.run_control("COMMIT;")
    }

    fn rollback(&mut self) -> DbResult<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        self.run_control("ROLLBACK;")
    }

    fn in_transaction(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|conn| !conn.is_autocommit())
    }

    fn disconnect(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        match conn.close() {
            Ok(()) => info!(
                "event=db_close module=db status=ok backend=sqlite mode={}",
                self.location.mode()
            ),
            Err((_conn, err)) => warn!(
                "event=db_close module=db status=error backend=sqlite mode={} error={}",
                self.location.mode(),
                err
            ),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Integer(value) => ValueRef::Integer(*value),
            SqlValue::Real(value) => ValueRef::Real(*value),
            SqlValue::Text(value) => ValueRef::Text(value.as_bytes()),
            SqlValue::Blob(value) => ValueRef::Blob(value),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

fn open_connection(location: &SqliteLocation) -> DbResult<Connection> {
    let opened = match location {
        SqliteLocation::File(path) => {
            ensure_parent_dir(path)?;
            Connection::open(path)
        }
        SqliteLocation::Memory => Connection::open_in_memory(),
    };

    opened.map_err(|err| {
        DbError::Connection(ConnectionError {
            backend: BackendKind::Sqlite,
            source: NativeError::Sqlite(err),
        })
    })
}

fn ensure_parent_dir(path: &Path) -> DbResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|err| {
                DbError::Connection(ConnectionError {
                    backend: BackendKind::Sqlite,
                    source: NativeError::Io(err),
                })
            }),
        _ => Ok(()),
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| sqlite_execution_error("PRAGMA foreign_keys = ON;", err))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|err| sqlite_execution_error("busy_timeout", err))?;
    apply_migrations(conn)
}

fn run_statement(conn: &Connection, statement: &str, params: &[SqlValue]) -> DbResult<ExecOutcome> {
    let fail = |err| sqlite_execution_error(statement, err);
    let mut stmt = conn.prepare_cached(statement).map_err(fail)?;

    if !is_read_statement(statement) {
        let affected = stmt
            .execute(params_from_iter(params.iter()))
            .map_err(fail)?;
        return Ok(ExecOutcome::Affected(affected as u64));
    }

    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = stmt.query(params_from_iter(params.iter())).map_err(fail)?;
    let mut collected = Vec::new();

    while let Some(row) = rows.next().map_err(fail)? {
        let mut values = Vec::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            values.push(value_from_ref(row.get_ref(idx).map_err(fail)?, column)?);
        }
        collected.push(Row::new(Arc::clone(&columns), values));
    }

    Ok(ExecOutcome::Rows(collected))
}

fn value_from_ref(value: ValueRef<'_>, column: &str) -> DbResult<SqlValue> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(value) => SqlValue::Integer(value),
        ValueRef::Real(value) => SqlValue::Real(value),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text.to_string()),
            Err(err) => {
                return Err(DbError::Decode(format!(
                    "column `{column}` holds text that is not valid UTF-8 ({err})"
                )))
            }
        },
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    })
}

/// Logs a failed statement by kind and code only.
fn log_execution_failure(err: &DbError) {
    match err {
        DbError::Execution(failure) if failure.is_unique_violation() => {}
        DbError::Execution(failure) => error!(
            "event=db_execute module=db status=error backend=sqlite statement=\"{}\" kind={} code={}",
            failure.statement,
            failure.kind.as_str(),
            failure.code.as_deref().unwrap_or("none")
        ),
        other => error!(
            "event=db_execute module=db status=error backend=sqlite error={other}"
        ),
    }
}

/// Wraps a rusqlite failure, classifying constraint breaches.
pub(crate) fn sqlite_execution_error(statement: &str, err: rusqlite::Error) -> DbError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation => {
            if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || code.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                ExecutionErrorKind::UniqueViolation
            } else {
                ExecutionErrorKind::ConstraintViolation
            }
        }
        _ => ExecutionErrorKind::Other,
    };
    let code = match &err {
        rusqlite::Error::SqliteFailure(code, _) => Some(code.extended_code.to_string()),
        _ => None,
    };

    DbError::Execution(ExecutionError {
        backend: BackendKind::Sqlite,
        statement: log_excerpt(statement),
        kind,
        code,
        source: NativeError::Sqlite(err),
    })
}
