//! Registrations and opt-outs.
//!
//! # Invariants
//! - Each save is a single INSERT; a unique-email breach is reported as
//!   [`PersistenceError::Duplicate`], never as a generic failure.
//! - Emails are stored and probed in canonical (trimmed, lowercase) form.
//! - The probed table is chosen from [`EmailScope`], never from caller text.

use crate::db::{Database, DbError, Row, SqlValue};
use crate::model::party::{
    EmailScope, Gender, OptOutParty, OptOutPartyRecord, OptOutReason, PartyId, PartyRole,
    Profession, RegisteredParty, RegisteredPartyRecord,
};
use crate::model::report::{PartyAnalytics, NOT_SPECIFIED};
use crate::model::validation::canonical_email;
use crate::repo::{count_column, now_epoch_ms, PersistenceError, RepoResult};
use crate::sql_params;
use log::{error, info};
use std::collections::BTreeMap;

const INSERT_REGISTERED_SQL: &str = "INSERT INTO users (
    name,
    email,
    phone_number,
    gender,
    profession,
    interest_reason,
    user_type,
    created_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const INSERT_OPT_OUT_SQL: &str = "INSERT INTO not_interested_users (
    name,
    email,
    phone_number,
    gender,
    profession,
    not_interested_reason,
    improvement_suggestions,
    interest_reason,
    created_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";

const LIST_REGISTERED_SQL: &str = "SELECT
    id,
    name,
    email,
    phone_number,
    gender,
    profession,
    interest_reason,
    user_type,
    created_at
FROM users
WHERE user_type = $1
ORDER BY created_at DESC, id DESC";

const LIST_OPT_OUT_SQL: &str = "SELECT
    id,
    name,
    email,
    phone_number,
    gender,
    profession,
    not_interested_reason,
    improvement_suggestions,
    interest_reason,
    created_at
FROM not_interested_users
ORDER BY created_at DESC, id DESC";

const GENDER_DISTRIBUTION_SQL: &str = "SELECT gender AS bucket, COUNT(*) AS total
FROM users
WHERE user_type = $1
GROUP BY gender";

const PROFESSION_DISTRIBUTION_SQL: &str = "SELECT profession AS bucket, COUNT(*) AS total
FROM users
WHERE user_type = $1
GROUP BY profession";

const OPT_OUT_REASONS_SQL: &str = "SELECT not_interested_reason AS bucket, COUNT(*) AS total
FROM not_interested_users
GROUP BY not_interested_reason";

/// Persistence contract for registrations and opt-outs.
pub trait PartyRepository {
    fn save_registered_party(&self, party: &RegisteredParty) -> RepoResult<PartyId>;
    fn save_opt_out_party(&self, party: &OptOutParty) -> RepoResult<PartyId>;
    /// Non-atomic probe; saves detect duplicates on their own.
    fn email_exists(&self, email: &str, scope: EmailScope) -> RepoResult<bool>;
    /// Registrations with `role`, newest first.
    fn list_registered_parties(&self, role: PartyRole) -> RepoResult<Vec<RegisteredPartyRecord>>;
    /// Opt-outs, newest first.
    fn list_opt_out_parties(&self) -> RepoResult<Vec<OptOutPartyRecord>>;
    fn party_analytics(&self) -> RepoResult<PartyAnalytics>;
}

pub struct SqlPartyRepository<'db> {
    db: &'db Database,
}

impl<'db> SqlPartyRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Runs one INSERT and reads back its identity inside one unit of work.
    fn insert_returning_id(
        &self,
        scope: EmailScope,
        statement: &str,
        params: &[SqlValue],
    ) -> RepoResult<PartyId> {
        let result: RepoResult<PartyId> = self.db.unit_of_work(|backend| {
            backend
                .execute(statement, params)
                .map_err(|err| duplicate_or_db(err, scope))?;
            Ok(backend.last_insert_id()?)
        });

        match &result {
            Ok(id) => info!(
                "event=party_save module=repo status=ok backend={} table={} party_id={id}",
                self.db.kind(),
                scope.table()
            ),
            Err(PersistenceError::Duplicate { .. }) => info!(
                "event=party_save module=repo status=duplicate backend={} table={}",
                self.db.kind(),
                scope.table()
            ),
            Err(err) => error!(
                "event=party_save module=repo status=error backend={} table={} error={err}",
                self.db.kind(),
                scope.table()
            ),
        }
        result
    }

    fn distribution(
        &self,
        statement: &str,
        params: &[SqlValue],
    ) -> RepoResult<BTreeMap<String, u64>> {
        let mut buckets = BTreeMap::new();
        for row in self.db.query(statement, params)? {
            let bucket = row
                .text("bucket")?
                .unwrap_or_else(|| NOT_SPECIFIED.to_string());
            *buckets.entry(bucket).or_insert(0) += count_column(&row, "total")?;
        }
        Ok(buckets)
    }
}

impl PartyRepository for SqlPartyRepository<'_> {
    fn save_registered_party(&self, party: &RegisteredParty) -> RepoResult<PartyId> {
        let party = party.normalized()?;
        self.insert_returning_id(
            EmailScope::Users,
            INSERT_REGISTERED_SQL,
            sql_params![
                party.name,
                party.email,
                party.phone_number,
                party.gender.map(Gender::as_str),
                party.profession.map(Profession::as_str),
                party.interest_reason,
                party.role.as_str(),
                now_epoch_ms(),
            ],
        )
    }

    fn save_opt_out_party(&self, party: &OptOutParty) -> RepoResult<PartyId> {
        let party = party.normalized()?;
        self.insert_returning_id(
            EmailScope::OptOuts,
            INSERT_OPT_OUT_SQL,
            sql_params![
                party.name,
                party.email,
                party.phone_number,
                party.gender.map(Gender::as_str),
                party.profession.map(Profession::as_str),
                party.reason.map(OptOutReason::as_str),
                party.improvement_suggestions,
                party.interest_reason,
                now_epoch_ms(),
            ],
        )
    }

    fn email_exists(&self, email: &str, scope: EmailScope) -> RepoResult<bool> {
        let statement = format!(
            "SELECT 1 AS found FROM {} WHERE email = $1 LIMIT 1",
            scope.table()
        );
        let rows = self.db.query(&statement, sql_params![canonical_email(email)])?;
        Ok(!rows.is_empty())
    }

    fn list_registered_parties(&self, role: PartyRole) -> RepoResult<Vec<RegisteredPartyRecord>> {
        self.db
            .query(LIST_REGISTERED_SQL, sql_params![role.as_str()])?
            .iter()
            .map(parse_registered_row)
            .collect()
    }

    fn list_opt_out_parties(&self) -> RepoResult<Vec<OptOutPartyRecord>> {
        self.db
            .query(LIST_OPT_OUT_SQL, sql_params![])?
            .iter()
            .map(parse_opt_out_row)
            .collect()
    }

    fn party_analytics(&self) -> RepoResult<PartyAnalytics> {
        let role = PartyRole::User.as_str();
        let gender_distribution = self.distribution(GENDER_DISTRIBUTION_SQL, sql_params![role])?;
        let profession_distribution =
            self.distribution(PROFESSION_DISTRIBUTION_SQL, sql_params![role])?;
        let not_interested_reasons = self.distribution(OPT_OUT_REASONS_SQL, sql_params![])?;

        Ok(PartyAnalytics {
            total_users: gender_distribution.values().sum(),
            total_not_interested: not_interested_reasons.values().sum(),
            gender_distribution,
            profession_distribution,
            not_interested_reasons,
        })
    }
}

fn duplicate_or_db(err: DbError, scope: EmailScope) -> PersistenceError {
    if err.as_unique_violation().is_some() {
        PersistenceError::Duplicate { scope }
    } else {
        PersistenceError::Db(err)
    }
}

fn parse_registered_row(row: &Row) -> RepoResult<RegisteredPartyRecord> {
    let role = required_text(row, "user_type")?;
    Ok(RegisteredPartyRecord {
        id: row.required_integer("id")?,
        created_at: row.required_integer("created_at")?,
        party: RegisteredParty {
            name: required_text(row, "name")?,
            email: required_text(row, "email")?,
            phone_number: required_text(row, "phone_number")?,
            gender: parse_enum(row, "gender", Gender::parse)?,
            profession: parse_enum(row, "profession", Profession::parse)?,
            interest_reason: row.text("interest_reason")?,
            role: PartyRole::parse(&role).ok_or_else(|| {
                PersistenceError::InvalidData(format!("invalid user_type value `{role}`"))
            })?,
        },
    })
}

fn parse_opt_out_row(row: &Row) -> RepoResult<OptOutPartyRecord> {
    Ok(OptOutPartyRecord {
        id: row.required_integer("id")?,
        created_at: row.required_integer("created_at")?,
        party: OptOutParty {
            name: required_text(row, "name")?,
            email: required_text(row, "email")?,
            phone_number: required_text(row, "phone_number")?,
            gender: parse_enum(row, "gender", Gender::parse)?,
            profession: parse_enum(row, "profession", Profession::parse)?,
            reason: parse_enum(row, "not_interested_reason", OptOutReason::parse)?,
            improvement_suggestions: row.text("improvement_suggestions")?,
            interest_reason: row.text("interest_reason")?,
        },
    })
}

fn required_text(row: &Row, column: &str) -> RepoResult<String> {
    row.text(column)?
        .ok_or_else(|| PersistenceError::InvalidData(format!("column `{column}` is null")))
}

fn parse_enum<T>(row: &Row, column: &str, parse: fn(&str) -> Option<T>) -> RepoResult<Option<T>> {
    row.text(column)?
        .map(|raw| {
            parse(&raw).ok_or_else(|| {
                PersistenceError::InvalidData(format!("invalid {column} value `{raw}`"))
            })
        })
        .transpose()
}
