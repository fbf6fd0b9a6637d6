//! Feedback use-case service.
//!
//! # Responsibility
//! - Turn repository results into caller-facing outcomes.
//! - Compose the summary view from one listing and one analytics pass.
//!
//! # Invariants
//! - Read APIs never fail: storage errors are logged and an empty view is
//!   returned.
//! - `submit` reports success only for a committed submission.

use crate::model::feedback::{FeedbackSubmission, SubmissionId, SubmissionView};
use crate::model::report::{FeedbackSummary, SubmissionAnalytics};
use crate::model::validation::ValidationError;
use crate::repo::feedback_repo::FeedbackRepository;
use crate::repo::PersistenceError;
use log::{error, warn};

/// Number of submissions shown in a summary.
pub const RECENT_SUBMISSIONS_LIMIT: usize = 10;
/// Decimal places kept on summary averages.
pub const SUMMARY_DECIMALS: i32 = 2;

/// Result of one submission attempt.
#[derive(Debug)]
pub enum SubmissionOutcome {
    Accepted(SubmissionId),
    /// Input failed validation; nothing reached storage.
    Rejected(ValidationError),
    /// Storage failed; the unit of work was rolled back.
    Failed(PersistenceError),
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn submission_id(&self) -> Option<SubmissionId> {
        match self {
            Self::Accepted(id) => Some(*id),
            Self::Rejected(_) | Self::Failed(_) => None,
        }
    }
}

pub struct FeedbackService<R: FeedbackRepository> {
    repo: R,
}

impl<R: FeedbackRepository> FeedbackService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn submit(&self, submission: &FeedbackSubmission) -> SubmissionOutcome {
        match self.repo.save_submission(submission) {
            Ok(id) => SubmissionOutcome::Accepted(id),
            Err(PersistenceError::Validation(err)) => {
                warn!("event=submission_submit module=service status=rejected error={err}");
                SubmissionOutcome::Rejected(err)
            }
            Err(err) => SubmissionOutcome::Failed(err),
        }
    }

    /// Every stored submission, newest first.
    pub fn list_submissions(&self) -> Vec<SubmissionView> {
        self.repo.list_submissions().unwrap_or_else(|err| {
            error!("event=submission_list module=service status=error error={err}");
            Vec::new()
        })
    }

    pub fn submission_analytics(&self) -> SubmissionAnalytics {
        self.repo.submission_analytics().unwrap_or_else(|err| {
            error!("event=submission_analytics module=service status=error error={err}");
            SubmissionAnalytics::default()
        })
    }

    /// Newest [`RECENT_SUBMISSIONS_LIMIT`] submissions plus analytics with
    /// averages rounded to [`SUMMARY_DECIMALS`] places.
    pub fn summarize(&self) -> FeedbackSummary {
        let mut recent_submissions = self.list_submissions();
        recent_submissions.truncate(RECENT_SUBMISSIONS_LIMIT);

        let mut analytics = self.submission_analytics();
        analytics.average_ratings = analytics.average_ratings.rounded(SUMMARY_DECIMALS);

        FeedbackSummary {
            recent_submissions,
            analytics,
        }
    }
}
