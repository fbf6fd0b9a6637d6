//! Schema manager: migration registry and executor for the embedded engine.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically on every fresh connection.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Migration 1 only uses `IF NOT EXISTS` DDL, so it is safe against a
//!   database that already holds the tables without a version stamp.
//!
//! The networked engine is provisioned externally; [`POSTGRES_SCHEMA_SQL`]
//! is the equivalent DDL for it.

use crate::db::sqlite::sqlite_execution_error;
use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_init.sql"),
}];

/// PostgreSQL DDL matching the latest embedded schema.
pub const POSTGRES_SCHEMA_SQL: &str = include_str!("postgres_schema.sql");

/// Tables created by the schema, parents before dependents.
pub const SCHEMA_TABLES: &[&str] = &[
    "users",
    "not_interested_users",
    "feedback_forms",
    "ui_ratings",
    "ux_ratings",
    "suggestions_and_needs",
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .map_err(|err| sqlite_execution_error("BEGIN", err))?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)
            .map_err(|err| sqlite_execution_error(migration.sql, err))?;
        let stamp = format!("PRAGMA user_version = {};", migration.version);
        tx.execute_batch(&stamp)
            .map_err(|err| sqlite_execution_error(&stamp, err))?;
    }
    tx.commit()
        .map_err(|err| sqlite_execution_error("COMMIT", err))?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        current_version, latest
    );
    Ok(())
}

/// Reads `PRAGMA user_version` from an open connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
        .map_err(|err| sqlite_execution_error("PRAGMA user_version;", err))
}
