//! Feedback submissions: atomic fan-out writes and joined read-back.
//!
//! # Responsibility
//! - Write one submission root plus 0-3 dependent group rows as a unit.
//! - Rebuild submission views and rating analytics.
//!
//! # Invariants
//! - Either the root and every selected group are committed, or nothing is.
//! - Dependent rows are keyed by the identity generated for their root in
//!   the same unit of work.
//! - Listing order is `created_at DESC, id DESC`.

use crate::db::{Database, Row, StorageBackend};
use crate::model::feedback::{
    DependentGroup, ExperienceRatings, FeedbackSubmission, FollowUpConsent, PresentationRatings,
    Rating, SubmissionId, SubmissionView, SuggestionsAndConsent,
};
use crate::model::report::{ConsentCounts, RatingAverages, SubmissionAnalytics};
use crate::repo::{count_column, now_epoch_ms, PersistenceError, RepoResult, WriteStep};
use crate::sql_params;
use log::{error, info};
use std::time::Instant;

const INSERT_ROOT_SQL: &str = "INSERT INTO feedback_forms (user_email, created_at) VALUES ($1, $2)";

const INSERT_PRESENTATION_SQL: &str = "INSERT INTO ui_ratings (
    feedback_form_id,
    visual_design_rating,
    visual_design_comments,
    ease_of_navigation_rating,
    ease_of_navigation_comments,
    mobile_responsiveness_rating,
    mobile_responsiveness_comments
) VALUES ($1, $2, $3, $4, $5, $6, $7)";

const INSERT_EXPERIENCE_SQL: &str = "INSERT INTO ux_ratings (
    feedback_form_id,
    overall_satisfaction_rating,
    overall_satisfaction_comments,
    task_completion_rating,
    task_completion_comments,
    service_quality_rating,
    service_quality_comments
) VALUES ($1, $2, $3, $4, $5, $6, $7)";

const INSERT_SUGGESTIONS_SQL: &str = "INSERT INTO suggestions_and_needs (
    feedback_form_id,
    liked_features,
    improvement_suggestions,
    desired_features,
    legal_challenges,
    additional_feedback,
    follow_up_consent,
    follow_up_email
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const LIST_SUBMISSIONS_SQL: &str = "SELECT
    f.id,
    f.user_email,
    f.created_at,
    ui.visual_design_rating,
    ui.visual_design_comments,
    ui.ease_of_navigation_rating,
    ui.ease_of_navigation_comments,
    ui.mobile_responsiveness_rating,
    ui.mobile_responsiveness_comments,
    ux.overall_satisfaction_rating,
    ux.overall_satisfaction_comments,
    ux.task_completion_rating,
    ux.task_completion_comments,
    ux.service_quality_rating,
    ux.service_quality_comments,
    s.liked_features,
    s.improvement_suggestions,
    s.desired_features,
    s.legal_challenges,
    s.additional_feedback,
    s.follow_up_consent,
    s.follow_up_email
FROM feedback_forms f
LEFT JOIN ui_ratings ui ON ui.feedback_form_id = f.id
LEFT JOIN ux_ratings ux ON ux.feedback_form_id = f.id
LEFT JOIN suggestions_and_needs s ON s.feedback_form_id = f.id
ORDER BY f.created_at DESC, f.id DESC";

// AVG is cast so both engines return a floating-point cell.
const RATING_AVERAGES_SQL: &str = "SELECT
    (SELECT CAST(AVG(visual_design_rating) AS DOUBLE PRECISION) FROM ui_ratings) AS visual_design,
    (SELECT CAST(AVG(ease_of_navigation_rating) AS DOUBLE PRECISION) FROM ui_ratings) AS ease_of_navigation,
    (SELECT CAST(AVG(mobile_responsiveness_rating) AS DOUBLE PRECISION) FROM ui_ratings) AS mobile_responsiveness,
    (SELECT CAST(AVG(overall_satisfaction_rating) AS DOUBLE PRECISION) FROM ux_ratings) AS overall_satisfaction,
    (SELECT CAST(AVG(task_completion_rating) AS DOUBLE PRECISION) FROM ux_ratings) AS task_completion,
    (SELECT CAST(AVG(service_quality_rating) AS DOUBLE PRECISION) FROM ux_ratings) AS service_quality,
    (SELECT COUNT(*) FROM feedback_forms) AS total_submissions";

const CONSENT_COUNTS_SQL: &str = "SELECT follow_up_consent, COUNT(*) AS total
FROM suggestions_and_needs
WHERE follow_up_consent IS NOT NULL
GROUP BY follow_up_consent";

/// Persistence contract for feedback submissions.
pub trait FeedbackRepository {
    /// Writes the root and every non-empty group atomically.
    fn save_submission(&self, submission: &FeedbackSubmission) -> RepoResult<SubmissionId>;
    /// All submissions, newest first, with absent groups read as nulls.
    fn list_submissions(&self) -> RepoResult<Vec<SubmissionView>>;
    fn submission_analytics(&self) -> RepoResult<SubmissionAnalytics>;
}

/// Feedback repository over either storage engine.
pub struct SqlFeedbackRepository<'db> {
    db: &'db Database,
}

impl<'db> SqlFeedbackRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }
}

impl FeedbackRepository for SqlFeedbackRepository<'_> {
    fn save_submission(&self, submission: &FeedbackSubmission) -> RepoResult<SubmissionId> {
        let submission = submission.normalized();
        submission.validate()?;
        let groups = submission.dependent_groups();

        let started_at = Instant::now();
        let result: RepoResult<SubmissionId> = self.db.unit_of_work(|backend| {
            let affected = backend
                .execute(
                    INSERT_ROOT_SQL,
                    sql_params![submission.user_email.as_deref(), now_epoch_ms()],
                )
                .map_err(|source| PersistenceError::Step {
                    step: WriteStep::InsertRoot,
                    source,
                })?
                .affected_rows()
                .unwrap_or(0);
            if affected == 0 {
                return Err(PersistenceError::RootNotInserted { affected });
            }

            let id = backend
                .last_insert_id()
                .map_err(|source| PersistenceError::Step {
                    step: WriteStep::RootIdentity,
                    source,
                })?;

            for group in &groups {
                insert_group(backend, id, group)?;
            }
            Ok(id)
        });

        match &result {
            Ok(id) => info!(
                "event=submission_save module=repo status=ok backend={} submission_id={id} groups={} duration_ms={}",
                self.db.kind(),
                groups.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=submission_save module=repo status=error backend={} groups={} duration_ms={} error={err}",
                self.db.kind(),
                groups.len(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn list_submissions(&self) -> RepoResult<Vec<SubmissionView>> {
        self.db
            .query(LIST_SUBMISSIONS_SQL, sql_params![])?
            .iter()
            .map(parse_submission_row)
            .collect()
    }

    fn submission_analytics(&self) -> RepoResult<SubmissionAnalytics> {
        let rows = self.db.query(RATING_AVERAGES_SQL, sql_params![])?;
        let row = rows.first().ok_or_else(|| {
            PersistenceError::InvalidData("rating averages query returned no row".to_string())
        })?;

        let average_ratings = RatingAverages {
            visual_design: row.real("visual_design")?,
            ease_of_navigation: row.real("ease_of_navigation")?,
            mobile_responsiveness: row.real("mobile_responsiveness")?,
            overall_satisfaction: row.real("overall_satisfaction")?,
            task_completion: row.real("task_completion")?,
            service_quality: row.real("service_quality")?,
        };
        let total_submissions = count_column(row, "total_submissions")?;

        let mut consent_counts = ConsentCounts::default();
        for row in self.db.query(CONSENT_COUNTS_SQL, sql_params![])? {
            let total = count_column(&row, "total")?;
            match parse_consent(row.text("follow_up_consent")?)? {
                Some(FollowUpConsent::Yes) => consent_counts.yes += total,
                Some(FollowUpConsent::No) => consent_counts.no += total,
                None => {}
            }
        }

        Ok(SubmissionAnalytics {
            average_ratings,
            total_submissions,
            consent_counts,
        })
    }
}

fn insert_group(
    backend: &mut dyn StorageBackend,
    submission_id: SubmissionId,
    group: &DependentGroup<'_>,
) -> RepoResult<()> {
    let outcome = match group {
        DependentGroup::Presentation(ratings) => backend.execute(
            INSERT_PRESENTATION_SQL,
            sql_params![
                submission_id,
                ratings.visual_design_rating.map(i64::from),
                ratings.visual_design_comments.as_deref(),
                ratings.ease_of_navigation_rating.map(i64::from),
                ratings.ease_of_navigation_comments.as_deref(),
                ratings.mobile_responsiveness_rating.map(i64::from),
                ratings.mobile_responsiveness_comments.as_deref(),
            ],
        ),
        DependentGroup::Experience(ratings) => backend.execute(
            INSERT_EXPERIENCE_SQL,
            sql_params![
                submission_id,
                ratings.overall_satisfaction_rating.map(i64::from),
                ratings.overall_satisfaction_comments.as_deref(),
                ratings.task_completion_rating.map(i64::from),
                ratings.task_completion_comments.as_deref(),
                ratings.service_quality_rating.map(i64::from),
                ratings.service_quality_comments.as_deref(),
            ],
        ),
        DependentGroup::Suggestions(suggestions) => backend.execute(
            INSERT_SUGGESTIONS_SQL,
            sql_params![
                submission_id,
                suggestions.liked_features.as_deref(),
                suggestions.improvement_suggestions.as_deref(),
                suggestions.desired_features.as_deref(),
                suggestions.legal_challenges.as_deref(),
                suggestions.additional_feedback.as_deref(),
                suggestions.consent_or_default().as_str(),
                suggestions.follow_up_email.as_deref(),
            ],
        ),
    };

    outcome
        .map(|_| ())
        .map_err(|source| PersistenceError::Step {
            step: WriteStep::InsertGroup(group.kind()),
            source,
        })
}

fn parse_submission_row(row: &Row) -> RepoResult<SubmissionView> {
    Ok(SubmissionView {
        id: row.required_integer("id")?,
        user_email: row.text("user_email")?,
        created_at: row.required_integer("created_at")?,
        presentation: PresentationRatings {
            visual_design_rating: parse_rating(row, "visual_design_rating")?,
            visual_design_comments: row.text("visual_design_comments")?,
            ease_of_navigation_rating: parse_rating(row, "ease_of_navigation_rating")?,
            ease_of_navigation_comments: row.text("ease_of_navigation_comments")?,
            mobile_responsiveness_rating: parse_rating(row, "mobile_responsiveness_rating")?,
            mobile_responsiveness_comments: row.text("mobile_responsiveness_comments")?,
        },
        experience: ExperienceRatings {
            overall_satisfaction_rating: parse_rating(row, "overall_satisfaction_rating")?,
            overall_satisfaction_comments: row.text("overall_satisfaction_comments")?,
            task_completion_rating: parse_rating(row, "task_completion_rating")?,
            task_completion_comments: row.text("task_completion_comments")?,
            service_quality_rating: parse_rating(row, "service_quality_rating")?,
            service_quality_comments: row.text("service_quality_comments")?,
        },
        suggestions: SuggestionsAndConsent {
            liked_features: row.text("liked_features")?,
            improvement_suggestions: row.text("improvement_suggestions")?,
            desired_features: row.text("desired_features")?,
            legal_challenges: row.text("legal_challenges")?,
            additional_feedback: row.text("additional_feedback")?,
            follow_up_consent: parse_consent(row.text("follow_up_consent")?)?,
            follow_up_email: row.text("follow_up_email")?,
        },
    })
}

fn parse_rating(row: &Row, column: &str) -> RepoResult<Option<Rating>> {
    row.integer(column)?
        .map(|value| {
            Rating::new(value).map_err(|err| {
                PersistenceError::InvalidData(format!("column `{column}`: {err}"))
            })
        })
        .transpose()
}

fn parse_consent(value: Option<String>) -> RepoResult<Option<FollowUpConsent>> {
    value
        .map(|raw| {
            FollowUpConsent::parse(&raw).ok_or_else(|| {
                PersistenceError::InvalidData(format!("invalid follow_up_consent value `{raw}`"))
            })
        })
        .transpose()
}
