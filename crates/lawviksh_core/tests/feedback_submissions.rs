use lawviksh_core::db::{
    BackendKind, Database, DbResult, ExecOutcome, SqlValue, SqliteBackend, StorageBackend,
};
use lawviksh_core::model::feedback::DependentGroupKind;
use lawviksh_core::{
    sql_params, ExperienceRatings, FeedbackRepository, FeedbackService, FeedbackSubmission,
    FollowUpConsent, PersistenceError, PresentationRatings, Rating, SqlFeedbackRepository,
    SubmissionOutcome, SuggestionsAndConsent, ValidationError, WriteStep,
};
use std::thread;

#[test]
fn empty_submission_writes_only_the_root() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqlFeedbackRepository::new(&db);

    repo.save_submission(&FeedbackSubmission::default())
        .unwrap();

    assert_eq!(count_rows(&db, "feedback_forms"), 1);
    assert_eq!(count_rows(&db, "ui_ratings"), 0);
    assert_eq!(count_rows(&db, "ux_ratings"), 0);
    assert_eq!(count_rows(&db, "suggestions_and_needs"), 0);
}

#[test]
fn whitespace_only_fields_count_as_empty() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqlFeedbackRepository::new(&db);

    let mut submission = FeedbackSubmission::default();
    submission.presentation.visual_design_comments = Some("   ".to_string());
    submission.suggestions.additional_feedback = Some("\n".to_string());
    repo.save_submission(&submission).unwrap();

    assert_eq!(count_rows(&db, "ui_ratings"), 0);
    assert_eq!(count_rows(&db, "suggestions_and_needs"), 0);
}

#[test]
fn each_supplied_group_gets_exactly_one_row_keyed_to_the_root() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqlFeedbackRepository::new(&db);

    let cases: [(&str, FeedbackSubmission); 3] = [
        (
            "ui_ratings",
            FeedbackSubmission {
                presentation: PresentationRatings {
                    ease_of_navigation_rating: rating(2),
                    ..PresentationRatings::default()
                },
                ..FeedbackSubmission::default()
            },
        ),
        (
            "ux_ratings",
            FeedbackSubmission {
                experience: ExperienceRatings {
                    service_quality_comments: Some("friendly".to_string()),
                    ..ExperienceRatings::default()
                },
                ..FeedbackSubmission::default()
            },
        ),
        (
            "suggestions_and_needs",
            FeedbackSubmission {
                suggestions: SuggestionsAndConsent {
                    legal_challenges: Some("court fees".to_string()),
                    ..SuggestionsAndConsent::default()
                },
                ..FeedbackSubmission::default()
            },
        ),
    ];

    for (table, submission) in cases {
        let id = repo.save_submission(&submission).unwrap();
        let rows = db
            .query(
                &format!("SELECT feedback_form_id FROM {table} WHERE feedback_form_id = $1"),
                sql_params![id],
            )
            .unwrap();
        assert_eq!(rows.len(), 1, "expected one `{table}` row for submission {id}");
        assert_eq!(count_rows(&db, table), 1);
    }
    assert_eq!(count_rows(&db, "feedback_forms"), 3);
}

#[test]
fn failing_dependent_insert_leaves_no_rows_behind() {
    for failing in [
        DependentGroupKind::Presentation,
        DependentGroupKind::Experience,
        DependentGroupKind::Suggestions,
    ] {
        let db = Database::open_in_memory().unwrap();
        let table = failing.table();
        db.execute(
            &format!(
                "CREATE TRIGGER reject_group BEFORE INSERT ON {table}
                 BEGIN SELECT RAISE(ABORT, 'forced failure'); END"
            ),
            &[],
        )
        .unwrap();
        let repo = SqlFeedbackRepository::new(&db);

        let err = repo.save_submission(&full_submission()).unwrap_err();

        match err {
            PersistenceError::Step { step, .. } => {
                assert_eq!(step, WriteStep::InsertGroup(failing), "failing {table}");
            }
            other => panic!("unexpected error with failing {table}: {other}"),
        }
        for left in ["feedback_forms", "ui_ratings", "ux_ratings", "suggestions_and_needs"] {
            assert_eq!(count_rows(&db, left), 0, "rows left in {left} after failing {table}");
        }

        // The connection stays usable after the rollback.
        db.execute("DROP TRIGGER reject_group", &[]).unwrap();
        repo.save_submission(&full_submission()).unwrap();
        assert_eq!(count_rows(&db, "feedback_forms"), 1);
    }
}

#[test]
fn root_insert_without_affected_rows_aborts_before_dependents() {
    let db = Database::from_backend(Box::new(SilentRootInsert {
        inner: SqliteBackend::in_memory(),
    }));
    let repo = SqlFeedbackRepository::new(&db);

    let err = repo.save_submission(&full_submission()).unwrap_err();

    assert!(matches!(err, PersistenceError::RootNotInserted { affected: 0 }));
    assert_eq!(count_rows(&db, "ui_ratings"), 0);
    assert_eq!(count_rows(&db, "ux_ratings"), 0);
    assert_eq!(count_rows(&db, "suggestions_and_needs"), 0);
}

#[test]
fn equal_ratings_average_exactly() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqlFeedbackRepository::new(&db);

    for value in [3, 4, 5] {
        let submission = FeedbackSubmission {
            experience: ExperienceRatings {
                task_completion_rating: rating(value),
                ..ExperienceRatings::default()
            },
            ..FeedbackSubmission::default()
        };
        repo.save_submission(&submission).unwrap();
    }
    repo.save_submission(&FeedbackSubmission::default())
        .unwrap();

    let analytics = repo.submission_analytics().unwrap();
    assert_eq!(analytics.average_ratings.task_completion, Some(4.0));
    assert_eq!(analytics.average_ratings.visual_design, None);
    assert_eq!(analytics.total_submissions, 4);
}

#[test]
fn consent_defaults_to_no_when_suggestions_are_written() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqlFeedbackRepository::new(&db);

    let submission = FeedbackSubmission {
        suggestions: SuggestionsAndConsent {
            liked_features: Some("x".to_string()),
            ..SuggestionsAndConsent::default()
        },
        ..FeedbackSubmission::default()
    };
    let id = repo.save_submission(&submission).unwrap();

    let rows = db
        .query(
            "SELECT follow_up_consent FROM suggestions_and_needs WHERE feedback_form_id = $1",
            sql_params![id],
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text("follow_up_consent").unwrap().as_deref(), Some("no"));
}

#[test]
fn out_of_range_ratings_never_reach_storage() {
    assert_eq!(Rating::new(0), Err(ValidationError::RatingOutOfRange(0)));
    assert_eq!(Rating::new(6), Err(ValidationError::RatingOutOfRange(6)));

    for raw in [
        r#"{"visual_design_rating": 0}"#,
        r#"{"service_quality_rating": 6}"#,
    ] {
        assert!(serde_json::from_str::<FeedbackSubmission>(raw).is_err());
    }

    let parsed: FeedbackSubmission =
        serde_json::from_str(r#"{"user_email": "a@x.com", "visual_design_rating": 5}"#).unwrap();
    assert_eq!(parsed.presentation.visual_design_rating, rating(5));
}

#[test]
fn inserted_submission_reads_back_unchanged() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqlFeedbackRepository::new(&db);

    let input = FeedbackSubmission {
        user_email: Some("reader@example.com".to_string()),
        presentation: PresentationRatings {
            visual_design_rating: rating(4),
            visual_design_comments: Some("clean".to_string()),
            ..PresentationRatings::default()
        },
        experience: ExperienceRatings::default(),
        suggestions: SuggestionsAndConsent {
            desired_features: Some("case tracker".to_string()),
            follow_up_consent: Some(FollowUpConsent::Yes),
            follow_up_email: Some("reader@example.com".to_string()),
            ..SuggestionsAndConsent::default()
        },
    };
    let id = repo.save_submission(&input).unwrap();

    let views = repo.list_submissions().unwrap();
    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert_eq!(view.id, id);
    assert_eq!(view.user_email, input.user_email);
    assert!(view.created_at > 0);
    assert_eq!(view.presentation, input.presentation);
    assert_eq!(view.experience, ExperienceRatings::default());
    assert_eq!(view.suggestions, input.suggestions);
}

#[test]
fn service_rejects_consent_without_follow_up_email() {
    let db = Database::open_in_memory().unwrap();
    let service = FeedbackService::new(SqlFeedbackRepository::new(&db));

    let submission = FeedbackSubmission {
        suggestions: SuggestionsAndConsent {
            follow_up_consent: Some(FollowUpConsent::Yes),
            ..SuggestionsAndConsent::default()
        },
        ..FeedbackSubmission::default()
    };
    let outcome = service.submit(&submission);

    assert!(matches!(
        outcome,
        SubmissionOutcome::Rejected(ValidationError::MissingFollowUpEmail)
    ));
    assert!(!outcome.is_success());
    assert_eq!(count_rows(&db, "feedback_forms"), 0);

    let accepted = service.submit(&full_submission());
    assert!(accepted.is_success());
    assert!(accepted.submission_id().is_some());
}

#[test]
fn concurrent_submissions_are_all_committed_whole() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&lawviksh_core::BackendConfig::Sqlite {
        path: dir.path().join("concurrent.db"),
    })
    .unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let repo = SqlFeedbackRepository::new(&db);
                for _ in 0..5 {
                    repo.save_submission(&full_submission()).unwrap();
                }
            });
        }
    });

    assert_eq!(count_rows(&db, "feedback_forms"), 20);
    assert_eq!(count_rows(&db, "ui_ratings"), 20);
    assert_eq!(count_rows(&db, "ux_ratings"), 20);
    assert_eq!(count_rows(&db, "suggestions_and_needs"), 20);
    let orphans = db
        .query(
            "SELECT COUNT(*) AS total FROM ui_ratings ui
             LEFT JOIN feedback_forms f ON f.id = ui.feedback_form_id
             WHERE f.id IS NULL",
            &[],
        )
        .unwrap();
    assert_eq!(orphans[0].integer("total").unwrap(), Some(0));
}

/// Reports zero affected rows for root inserts without running them.
struct SilentRootInsert {
    inner: SqliteBackend,
}

impl StorageBackend for SilentRootInsert {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn connect(&mut self) -> DbResult<()> {
        self.inner.connect()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> DbResult<ExecOutcome> {
        if statement.starts_with("INSERT INTO feedback_forms") {
            return Ok(ExecOutcome::Affected(0));
        }
        self.inner.execute(statement, params)
    }

    fn last_insert_id(&mut self) -> DbResult<i64> {
        self.inner.last_insert_id()
    }

    fn begin(&mut self) -> DbResult<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> DbResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn disconnect(&mut self) {
        self.inner.disconnect();
    }
}

fn full_submission() -> FeedbackSubmission {
    FeedbackSubmission {
        user_email: Some("someone@example.com".to_string()),
        presentation: PresentationRatings {
            visual_design_rating: rating(5),
            mobile_responsiveness_rating: rating(3),
            mobile_responsiveness_comments: Some("menu overlaps on small screens".to_string()),
            ..PresentationRatings::default()
        },
        experience: ExperienceRatings {
            overall_satisfaction_rating: rating(4),
            ..ExperienceRatings::default()
        },
        suggestions: SuggestionsAndConsent {
            improvement_suggestions: Some("faster search".to_string()),
            ..SuggestionsAndConsent::default()
        },
    }
}

fn rating(value: i64) -> Option<Rating> {
    Some(Rating::new(value).unwrap())
}

fn count_rows(db: &Database, table: &str) -> i64 {
    db.query(&format!("SELECT COUNT(*) AS total FROM {table}"), &[])
        .unwrap()[0]
        .required_integer("total")
        .unwrap()
}
