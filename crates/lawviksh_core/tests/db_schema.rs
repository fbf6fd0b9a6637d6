use lawviksh_core::db::migrations::{latest_version, SCHEMA_TABLES};
use lawviksh_core::db::{Database, DbError, SqlValue};
use lawviksh_core::{sql_params, BackendConfig};
use rusqlite::Connection;

#[test]
fn open_in_memory_creates_every_table() {
    let db = Database::open_in_memory().unwrap();

    for table in SCHEMA_TABLES {
        assert_table_exists(&db, table);
    }
}

#[test]
fn opening_same_file_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("lawviksh.db");
    let config = BackendConfig::Sqlite { path: path.clone() };

    let first = Database::open(&config).unwrap();
    first
        .execute(
            "INSERT INTO feedback_forms (user_email, created_at) VALUES ($1, $2)",
            sql_params!["keep@example.com", 1_i64],
        )
        .unwrap();
    first.disconnect();
    drop(first);

    let second = Database::open(&config).unwrap();
    assert_eq!(count_rows(&second, "feedback_forms"), 1);
    drop(second);

    assert_eq!(schema_version(&Connection::open(&path).unwrap()), latest_version());
}

#[test]
fn schema_applies_over_unversioned_existing_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE feedback_forms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_email TEXT,
            created_at INTEGER NOT NULL
        );
        INSERT INTO feedback_forms (user_email, created_at) VALUES ('old@example.com', 5);",
    )
    .unwrap();
    drop(conn);

    let db = Database::open(&BackendConfig::Sqlite { path: path.clone() }).unwrap();
    assert_eq!(count_rows(&db, "feedback_forms"), 1);
    assert_table_exists(&db, "suggestions_and_needs");
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match Database::open(&BackendConfig::Sqlite { path }) {
        Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("future schema version must not open"),
    }
}

#[test]
fn rating_check_constraint_is_enforced() {
    let db = Database::open_in_memory().unwrap();
    let form_id = insert_root(&db);

    let err = db
        .execute(
            "INSERT INTO ui_ratings (feedback_form_id, visual_design_rating) VALUES ($1, $2)",
            sql_params![form_id, 6_i64],
        )
        .unwrap_err();
    match err {
        DbError::Execution(execution) => {
            assert!(execution.is_constraint_violation());
            assert!(!execution.is_unique_violation());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn dependent_rows_require_an_existing_root() {
    let db = Database::open_in_memory().unwrap();

    let err = db
        .execute(
            "INSERT INTO ux_ratings (feedback_form_id, task_completion_rating) VALUES ($1, $2)",
            sql_params![42_i64, 3_i64],
        )
        .unwrap_err();
    assert!(matches!(err, DbError::Execution(ref e) if e.is_constraint_violation()));
    assert_eq!(count_rows(&db, "ux_ratings"), 0);
}

#[test]
fn deleting_root_cascades_to_dependents() {
    let db = Database::open_in_memory().unwrap();
    let form_id = insert_root(&db);
    db.execute(
        "INSERT INTO suggestions_and_needs (feedback_form_id, liked_features) VALUES ($1, $2)",
        sql_params![form_id, "search"],
    )
    .unwrap();

    db.execute("DELETE FROM feedback_forms WHERE id = $1", sql_params![form_id])
        .unwrap();
    assert_eq!(count_rows(&db, "suggestions_and_needs"), 0);
}

#[test]
fn consent_column_defaults_to_no_and_rejects_other_values() {
    let db = Database::open_in_memory().unwrap();
    let form_id = insert_root(&db);
    db.execute(
        "INSERT INTO suggestions_and_needs (feedback_form_id) VALUES ($1)",
        sql_params![form_id],
    )
    .unwrap();

    let rows = db
        .query(
            "SELECT follow_up_consent FROM suggestions_and_needs WHERE feedback_form_id = $1",
            sql_params![form_id],
        )
        .unwrap();
    assert_eq!(rows[0].text("follow_up_consent").unwrap().as_deref(), Some("no"));

    let second = insert_root(&db);
    assert!(db
        .execute(
            "INSERT INTO suggestions_and_needs (feedback_form_id, follow_up_consent) VALUES ($1, $2)",
            sql_params![second, "maybe"],
        )
        .is_err());
}

#[test]
fn duplicate_user_email_is_a_unique_violation() {
    let db = Database::open_in_memory().unwrap();
    let insert = "INSERT INTO users (name, email, phone_number, created_at) VALUES ($1, $2, $3, $4)";
    db.execute(insert, sql_params!["A", "a@x.com", "1", 1_i64])
        .unwrap();

    let err = db
        .execute(insert, sql_params!["B", "a@x.com", "2", 2_i64])
        .unwrap_err();
    assert!(err.as_unique_violation().is_some());
}

fn insert_root(db: &Database) -> i64 {
    db.execute(
        "INSERT INTO feedback_forms (user_email, created_at) VALUES ($1, $2)",
        &[SqlValue::Null, SqlValue::Integer(1)],
    )
    .unwrap();
    db.query("SELECT MAX(id) AS id FROM feedback_forms", &[])
        .unwrap()[0]
        .required_integer("id")
        .unwrap()
}

fn count_rows(db: &Database, table: &str) -> i64 {
    db.query(&format!("SELECT COUNT(*) AS total FROM {table}"), &[])
        .unwrap()[0]
        .required_integer("total")
        .unwrap()
}

fn assert_table_exists(db: &Database, table: &str) {
    let rows = db
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = $1",
            sql_params![table],
        )
        .unwrap();
    assert_eq!(rows.len(), 1, "missing table `{table}`");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}
