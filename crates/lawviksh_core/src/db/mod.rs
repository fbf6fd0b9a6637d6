//! Storage backend adapter, schema manager and the shared connection handle.
//!
//! # Responsibility
//! - Give uniform statement execution over the embedded (SQLite) and
//!   networked (PostgreSQL) engines.
//! - Own connection lifecycle and unit-of-work boundaries.
//! - Create the relational schema on first connect of the embedded engine.
//!
//! # Invariants
//! - Backend-native failures are wrapped, never swallowed.
//! - Application reads/writes only happen on a connection whose schema
//!   migrations have succeeded (embedded engine).

use std::error::Error;
use std::fmt::{Display, Formatter};

mod backend;
mod database;
pub mod migrations;
#[cfg(feature = "postgres")]
mod postgres;
mod sqlite;
mod value;

pub use backend::{is_read_statement, BackendKind, StorageBackend};
pub use database::Database;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
pub use sqlite::{SqliteBackend, SqliteLocation};
pub use value::{ExecOutcome, Row, SqlValue};

pub type DbResult<T> = Result<T, DbError>;

/// Failure reported by the engine driver itself.
#[derive(Debug)]
pub enum NativeError {
    Sqlite(rusqlite::Error),
    #[cfg(feature = "postgres")]
    Postgres(::postgres::Error),
    Io(std::io::Error),
}

impl Display for NativeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            #[cfg(feature = "postgres")]
            Self::Postgres(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NativeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            #[cfg(feature = "postgres")]
            Self::Postgres(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

/// Backend unreachable or misconfigured.
#[derive(Debug)]
pub struct ConnectionError {
    pub backend: BackendKind,
    pub source: NativeError,
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} connection failed: {}", self.backend, self.source)
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Coarse classification of a failed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// A unique index or primary key rejected the row.
    UniqueViolation,
    /// Any other constraint (check, foreign key, not null).
    ConstraintViolation,
    /// Syntax errors, type mismatches, engine-level failures.
    Other,
}

impl ExecutionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UniqueViolation => "unique_violation",
            Self::ConstraintViolation => "constraint_violation",
            Self::Other => "other",
        }
    }
}

/// Malformed statement or constraint breach.
#[derive(Debug)]
pub struct ExecutionError {
    pub backend: BackendKind,
    /// Truncated, single-line statement text for diagnostics.
    pub statement: String,
    pub kind: ExecutionErrorKind,
    /// Engine error code: SQLSTATE for PostgreSQL, extended result code for SQLite.
    pub code: Option<String>,
    /// Left out of `Display`: native messages can echo row values.
    pub source: NativeError,
}

impl ExecutionError {
    pub fn is_unique_violation(&self) -> bool {
        self.kind == ExecutionErrorKind::UniqueViolation
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.kind,
            ExecutionErrorKind::UniqueViolation | ExecutionErrorKind::ConstraintViolation
        )
    }
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} statement failed (`{}`): {}",
            self.backend,
            self.statement,
            self.kind.as_str()
        )?;
        match &self.code {
            Some(code) => write!(f, " code={code}"),
            None => Ok(()),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug)]
pub enum DbError {
    Connection(ConnectionError),
    Execution(ExecutionError),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The binary was built without support for the configured backend.
    BackendUnavailable(BackendKind),
    /// A result cell could not be read as the requested type.
    Decode(String),
}

impl DbError {
    /// Returns the execution error when this is a unique-constraint breach.
    pub fn as_unique_violation(&self) -> Option<&ExecutionError> {
        match self {
            Self::Execution(err) if err.is_unique_violation() => Some(err),
            _ => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(err) => write!(f, "{err}"),
            Self::Execution(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::BackendUnavailable(kind) => {
                write!(f, "backend `{kind}` is not compiled into this build")
            }
            Self::Decode(message) => write!(f, "cannot decode result row: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection(err) => Some(err),
            Self::Execution(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::BackendUnavailable(_) => None,
            Self::Decode(_) => None,
        }
    }
}

impl From<ConnectionError> for DbError {
    fn from(value: ConnectionError) -> Self {
        Self::Connection(value)
    }
}

impl From<ExecutionError> for DbError {
    fn from(value: ExecutionError) -> Self {
        Self::Execution(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendKind, DbError, ExecutionError, ExecutionErrorKind, NativeError};
    use std::error::Error;

    #[test]
    fn execution_error_display_leaves_out_native_detail() {
        let err = DbError::Execution(ExecutionError {
            backend: BackendKind::Postgres,
            statement: "INSERT INTO users (email) VALUES ($1)".to_string(),
            kind: ExecutionErrorKind::UniqueViolation,
            code: Some("23505".to_string()),
            source: NativeError::Io(std::io::Error::other(
                "duplicate key\nDETAIL: Key (email)=(a@x.com) already exists.",
            )),
        });

        let rendered = err.to_string();
        assert!(rendered.ends_with("unique_violation code=23505"));
        assert!(!rendered.contains("a@x.com"));
        assert!(!rendered.contains('\n'));

        let native = err.source().and_then(|inner| inner.source()).unwrap();
        assert!(native.to_string().contains("DETAIL"));
    }
}
