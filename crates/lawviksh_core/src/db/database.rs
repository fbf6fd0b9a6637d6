//! Explicitly owned handle over one storage backend.
//!
//! # Responsibility
//! - Construct the concrete backend once from [`BackendConfig`].
//! - Serialize access to the single connection.
//! - Provide the unit-of-work boundary used by multi-table writes.
//!
//! # Invariants
//! - A unit of work holds the connection lock from `begin` until
//!   `commit`/`rollback`; no other caller can interleave statements.
//! - A unit of work that fails is rolled back before the error is returned.

use super::backend::{BackendKind, StorageBackend};
use super::sqlite::SqliteBackend;
use super::value::{ExecOutcome, Row, SqlValue};
use super::{DbError, DbResult};
use crate::config::BackendConfig;
use log::{error, warn};
use std::sync::{Mutex, MutexGuard};

/// Shared, thread-safe access point to the configured storage engine.
pub struct Database {
    kind: BackendKind,
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl Database {
    /// Builds the configured backend and connects it eagerly, so connection
    /// and schema failures surface at startup.
    pub fn open(config: &BackendConfig) -> DbResult<Self> {
        let backend: Box<dyn StorageBackend> = match config {
            BackendConfig::Sqlite { path } => Box::new(SqliteBackend::file(path.clone())),
            #[cfg(feature = "postgres")]
            BackendConfig::Postgres(network) => {
                Box::new(super::postgres::PostgresBackend::new(network.clone()))
            }
            #[cfg(not(feature = "postgres"))]
            BackendConfig::Postgres(_) => {
                return Err(DbError::BackendUnavailable(BackendKind::Postgres))
            }
        };

        let database = Self::from_backend(backend);
        database.lock().connect()?;
        Ok(database)
    }

    /// Opens a private in-memory SQLite database with the schema applied.
    pub fn open_in_memory() -> DbResult<Self> {
        let database = Self::from_backend(Box::new(SqliteBackend::in_memory()));
        database.lock().connect()?;
        Ok(database)
    }

    /// Wraps an existing backend without connecting it.
    pub fn from_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            kind: backend.kind(),
            backend: Mutex::new(backend),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Runs one auto-committed statement.
    pub fn execute(&self, statement: &str, params: &[SqlValue]) -> DbResult<ExecOutcome> {
        self.lock().execute(statement, params)
    }

    /// Runs one read statement and returns its rows.
    pub fn query(&self, statement: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        self.execute(statement, params)?.into_rows()
    }

    /// Runs `work` inside one unit of work.
    ///
    /// Commits when `work` returns `Ok`; rolls back when it returns `Err` or
    /// when the commit itself fails.
    pub fn unit_of_work<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&mut dyn StorageBackend) -> Result<T, E>,
    {
        let mut guard = self.lock();
        let backend: &mut dyn StorageBackend = &mut **guard;

        backend.begin()?;
        match work(&mut *backend) {
            Ok(value) => match backend.commit() {
                Ok(()) => Ok(value),
                Err(err) => {
                    rollback_logged(backend, "commit_failed");
                    Err(err.into())
                }
            },
            Err(err) => {
                rollback_logged(backend, "work_failed");
                Err(err)
            }
        }
    }

    pub fn disconnect(&self) {
        self.lock().disconnect();
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn StorageBackend>> {
        match self.backend.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                warn!(
                    "event=db_lock module=db status=recovered backend={} open_transaction={}",
                    self.kind,
                    guard.in_transaction()
                );
                if guard.in_transaction() {
                    rollback_logged(&mut **guard, "lock_poisoned");
                }
                self.backend.clear_poison();
                guard
            }
        }
    }
}

fn rollback_logged(backend: &mut dyn StorageBackend, reason: &str) {
    match backend.rollback() {
        Ok(()) => warn!(
            "event=db_rollback module=db status=ok backend={} reason={reason}",
            backend.kind()
        ),
        Err(err) => error!(
            "event=db_rollback module=db status=error backend={} reason={reason} error={err}",
            backend.kind()
        ),
    }
}
