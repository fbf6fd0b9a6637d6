//! Repository layer: SQL write and read paths over [`Database`].
//!
//! # Responsibility
//! - Decompose aggregates into per-table rows and write them atomically.
//! - Rebuild joined views and statistical rollups from storage.
//!
//! # Invariants
//! - Write paths normalize and validate their input before any SQL runs.
//! - Every fan-out write runs inside one unit of work and is rolled back
//!   before an error is returned.
//! - Read paths reject invalid persisted state instead of masking it.
//!
//! [`Database`]: crate::db::Database

use crate::db::DbError;
use crate::model::feedback::DependentGroupKind;
use crate::model::party::EmailScope;
use crate::model::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod feedback_repo;
pub mod party_repo;

pub type RepoResult<T> = Result<T, PersistenceError>;

/// Statement within a submission write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    InsertRoot,
    RootIdentity,
    InsertGroup(DependentGroupKind),
}

impl Display for WriteStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsertRoot => f.write_str("insert feedback_forms"),
            Self::RootIdentity => f.write_str("read feedback_forms identity"),
            Self::InsertGroup(kind) => write!(f, "insert {}", kind.table()),
        }
    }
}

/// Aggregate-level persistence failure.
#[derive(Debug)]
pub enum PersistenceError {
    Validation(ValidationError),
    Db(DbError),
    /// The root insert reported no affected rows.
    RootNotInserted { affected: u64 },
    Step { step: WriteStep, source: DbError },
    /// The address is already stored in `scope`.
    Duplicate { scope: EmailScope },
    InvalidData(String),
}

impl PersistenceError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::RootNotInserted { affected } => write!(
                f,
                "submission root insert affected {affected} rows; nothing was saved"
            ),
            Self::Step { step, source } => write!(f, "{step} failed: {source}"),
            Self::Duplicate { scope } => {
                write!(f, "email already registered in {}", scope.table())
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Step { source, .. } => Some(source),
            Self::RootNotInserted { .. } | Self::Duplicate { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for PersistenceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for PersistenceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

/// Reads a non-negative count column.
pub(crate) fn count_column(row: &crate::db::Row, column: &str) -> RepoResult<u64> {
    let value = row.required_integer(column)?;
    u64::try_from(value)
        .map_err(|_| PersistenceError::InvalidData(format!("negative count in `{column}`")))
}
