//! Networked PostgreSQL backend.
//!
//! # Responsibility
//! - Hold one long-lived client and re-establish it when found closed.
//! - Translate neutral [`SqlValue`] parameters and result cells.
//!
//! # Invariants
//! - Schema is provisioned externally (see `migrations::POSTGRES_SCHEMA_SQL`).
//! - A connection lost inside an open unit of work is reported, never
//!   silently replaced: the transaction died with it.

use super::backend::{is_read_statement, BackendKind, StorageBackend};
use super::value::{ExecOutcome, Row, SqlValue};
use super::{ConnectionError, DbError, DbResult, ExecutionError, ExecutionErrorKind, NativeError};
use crate::config::NetworkConfig;
use crate::logging::log_excerpt;
use bytes::BytesMut;
use log::{error, info, warn};
use postgres::error::SqlState;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls};
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

/// PostgreSQL implementation of [`StorageBackend`].
pub struct PostgresBackend {
    config: NetworkConfig,
    client: Option<Client>,
    in_unit: bool,
}

impl PostgresBackend {
    /// Backend for the given server. Nothing is opened until first use.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            client: None,
            in_unit: false,
        }
    }

    fn open(&self) -> DbResult<Client> {
        let started_at = Instant::now();
        info!(
            "event=db_open module=db status=start backend=postgres host={} port={} dbname={}",
            self.config.host, self.config.port, self.config.dbname
        );

        let mut pg_config = postgres::Config::new();
        pg_config
            .host(&self.config.host)
            .port(self.config.port)
            .dbname(&self.config.dbname)
            .user(&self.config.user)
            .connect_timeout(self.config.connect_timeout);
        if !self.config.password.is_empty() {
            pg_config.password(&self.config.password);
        }

        match pg_config.connect(NoTls) {
            Ok(client) => {
                info!(
                    "event=db_open module=db status=ok backend=postgres duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(client)
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error backend=postgres duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(connection_error(err))
            }
        }
    }

    fn client(&mut self) -> DbResult<&mut Client> {
        let alive = match self.client.take() {
            Some(client) if !client.is_closed() => Some(client),
            Some(_) if self.in_unit => {
                self.in_unit = false;
                error!("event=db_reconnect module=db status=error backend=postgres reason=closed_in_transaction");
                return Err(DbError::Connection(ConnectionError {
                    backend: BackendKind::Postgres,
                    source: NativeError::Io(std::io::Error::new(
                        std::io::ErrorKind::ConnectionAborted,
                        "connection closed inside an open unit of work",
                    )),
                }));
            }
            Some(_) => {
                warn!("event=db_reconnect module=db status=start backend=postgres reason=closed");
                None
            }
            None => None,
        };

        let client = match alive {
            Some(client) => client,
            None => self.open()?,
        };
        Ok(self.client.insert(client))
    }

    fn run_control(&mut self, statement: &str) -> DbResult<()> {
        let client = self.client()?;
        client
            .batch_execute(statement)
            .map_err(|err| execution_error(statement, err))
    }
}

impl StorageBackend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn connect(&mut self) -> DbResult<()> {
        self.client().map(|_| ())
    }

    fn is_connected(&self) -> bool {
        self.client
            .as_ref()
            .is_some_and(|client| !client.is_closed())
    }

    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> DbResult<ExecOutcome> {
        let client = self.client()?;
        run_statement(client, statement, params).map_err(|err| {
            let err = execution_error(statement, err);
            log_execution_failure(&err);
            err
        })
    }

    fn last_insert_id(&mut self) -> DbResult<i64> {
        let client = self.client()?;
        let row = client
            .query_one("SELECT lastval()", &[])
            .map_err(|err| execution_error("SELECT lastval()", err))?;
        row.try_get::<_, i64>(0)
            .map_err(|err| execution_error("SELECT lastval()", err))
    }

    fn begin(&mut self) -> DbResult<()> {
        self.run_control("BEGIN")?;
        self.in_unit = true;
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        let result = self.run_control("COMMIT");
        // A failed COMMIT still ends the transaction on the server side.
        self.in_unit = false;
        result
    }

    fn rollback(&mut self) -> DbResult<()> {
        if !self.in_unit {
            return Ok(());
        }
        self.in_unit = false;
        match self.client.as_mut() {
            Some(client) if !client.is_closed() => client
                .batch_execute("ROLLBACK")
                .map_err(|err| execution_error("ROLLBACK", err)),
            _ => Ok(()),
        }
    }

    fn in_transaction(&self) -> bool {
        self.in_unit
    }

    fn disconnect(&mut self) {
        self.in_unit = false;
        let Some(client) = self.client.take() else {
            return;
        };

        match client.close() {
            Ok(()) => info!("event=db_close module=db status=ok backend=postgres"),
            Err(err) => warn!("event=db_close module=db status=error backend=postgres error={err}"),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Integer(value) => {
                if *ty == Type::INT2 {
                    i16::try_from(*value)?.to_sql_checked(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*value)?.to_sql_checked(ty, out)
                } else {
                    value.to_sql_checked(ty, out)
                }
            }
            SqlValue::Real(value) => {
                if *ty == Type::FLOAT4 {
                    (*value as f32).to_sql_checked(ty, out)
                } else {
                    value.to_sql_checked(ty, out)
                }
            }
            SqlValue::Text(value) => value.to_sql_checked(ty, out),
            SqlValue::Blob(value) => value.to_sql_checked(ty, out),
        }
    }

    // Null must bind to any column type; concrete values are re-checked
    // against `ty` inside `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn run_statement(
    client: &mut Client,
    statement: &str,
    params: &[SqlValue],
) -> Result<ExecOutcome, postgres::Error> {
    let bound: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|value| value as &(dyn ToSql + Sync))
        .collect();

    if !is_read_statement(statement) {
        let affected = client.execute(statement, &bound)?;
        return Ok(ExecOutcome::Affected(affected));
    }

    let rows = client.query(statement, &bound)?;
    let Some(first) = rows.first() else {
        return Ok(ExecOutcome::Rows(Vec::new()));
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();

    let mut collected = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(cell_value(row, idx)?);
        }
        collected.push(Row::new(Arc::clone(&columns), values));
    }
    Ok(ExecOutcome::Rows(collected))
}

fn cell_value(row: &postgres::Row, idx: usize) -> Result<SqlValue, postgres::Error> {
    let ty = row.columns()[idx].type_();

    let value = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|value| SqlValue::Integer(i64::from(value)))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|value| SqlValue::Integer(i64::from(value)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Integer)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|value| SqlValue::Real(f64::from(value)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real)
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?
            .map(|value| SqlValue::Integer(i64::from(value)))
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Blob)
    } else {
        row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
    };

    Ok(value.unwrap_or(SqlValue::Null))
}

fn connection_error(err: postgres::Error) -> DbError {
    DbError::Connection(ConnectionError {
        backend: BackendKind::Postgres,
        source: NativeError::Postgres(err),
    })
}

fn execution_error(statement: &str, err: postgres::Error) -> DbError {
    if err.is_closed() {
        return connection_error(err);
    }

    let kind = match err.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => ExecutionErrorKind::UniqueViolation,
        Some(code)
            if *code == SqlState::CHECK_VIOLATION
                || *code == SqlState::FOREIGN_KEY_VIOLATION
                || *code == SqlState::NOT_NULL_VIOLATION =>
        {
            ExecutionErrorKind::ConstraintViolation
        }
        _ => ExecutionErrorKind::Other,
    };

    DbError::Execution(ExecutionError {
        backend: BackendKind::Postgres,
        statement: log_excerpt(statement),
        kind,
        code: err.code().map(|code| code.code().to_string()),
        source: NativeError::Postgres(err),
    })
}

/// Logs a failed statement by SQLSTATE only.
fn log_execution_failure(err: &DbError) {
    match err {
        DbError::Execution(failure) if failure.is_unique_violation() => {}
        DbError::Execution(failure) => error!(
            "event=db_execute module=db status=error backend=postgres statement=\"{}\" kind={} sqlstate={}",
            failure.statement,
            failure.kind.as_str(),
            failure.code.as_deref().unwrap_or("none")
        ),
        DbError::Connection(_) => error!(
            "event=db_execute module=db status=error backend=postgres error_code=connection_lost"
        ),
        other => error!("event=db_execute module=db status=error backend=postgres error={other}"),
    }
}
