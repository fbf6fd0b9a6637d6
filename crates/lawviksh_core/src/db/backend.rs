//! Backend adapter contract shared by the embedded and networked engines.

use super::{DbResult, ExecOutcome, SqlValue};
use std::fmt::{Display, Formatter};

/// Which concrete engine sits behind a [`StorageBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Embedded, file-backed SQLite.
    Sqlite,
    /// Networked PostgreSQL server.
    Postgres,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform statement execution over one storage engine.
///
/// Statements use numbered placeholders `$1..$n`, introduced in ascending
/// order; both engines bind them positionally from `params`.
///
/// # Contract
/// - `execute` connects lazily (embedded) or re-establishes a dead
///   connection (networked) before running the statement.
/// - Statements starting with `SELECT`/`WITH` return [`ExecOutcome::Rows`];
///   everything else returns [`ExecOutcome::Affected`].
/// - Outside `begin`/`commit` every mutating statement commits on its own.
/// - Engine failures are returned as `DbError`, never swallowed.
pub trait StorageBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Opens the connection if it is not open yet.
    fn connect(&mut self) -> DbResult<()>;

    fn is_connected(&self) -> bool;

    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> DbResult<ExecOutcome>;

    /// Identity generated by the most recent insert on this connection.
    fn last_insert_id(&mut self) -> DbResult<i64>;

    fn begin(&mut self) -> DbResult<()>;

    fn commit(&mut self) -> DbResult<()>;

    /// Rolls back the open unit of work; no-op when none is open.
    fn rollback(&mut self) -> DbResult<()>;

    fn in_transaction(&self) -> bool;

    /// Closes the connection. The next `execute` reconnects.
    fn disconnect(&mut self);
}

/// Returns whether `statement` starts with a read keyword.
pub fn is_read_statement(statement: &str) -> bool {
    let first_word = statement
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or("");

    first_word.eq_ignore_ascii_case("select") || first_word.eq_ignore_ascii_case("with")
}
