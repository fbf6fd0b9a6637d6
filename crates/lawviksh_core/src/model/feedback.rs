//! Feedback submission aggregate.
//!
//! # Responsibility
//! - Define the root submission and its three optional record groups.
//! - Decide, once per submission, which groups must be written.
//!
//! # Invariants
//! - A [`Rating`] only exists for values 1..=5; out-of-range input fails at
//!   construction or deserialization, before any storage call.
//! - A group is written iff at least one of its fields is supplied. Blank
//!   text counts as not supplied.
//! - A written suggestions group always carries a consent value; `no` when
//!   the caller left it unset.

use crate::model::validation::{non_blank, validate_email, ValidationError};
use serde::{Deserialize, Serialize};

/// Database identity of a stored submission root.
pub type SubmissionId = i64;

/// Rating on the closed scale 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::RatingOutOfRange(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(value: Rating) -> Self {
        i64::from(value.0)
    }
}

/// Whether the submitter agreed to be contacted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpConsent {
    Yes,
    No,
}

impl FollowUpConsent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

/// Interface ratings (`ui_ratings`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRatings {
    pub visual_design_rating: Option<Rating>,
    pub visual_design_comments: Option<String>,
    pub ease_of_navigation_rating: Option<Rating>,
    pub ease_of_navigation_comments: Option<String>,
    pub mobile_responsiveness_rating: Option<Rating>,
    pub mobile_responsiveness_comments: Option<String>,
}

impl PresentationRatings {
    pub fn is_empty(&self) -> bool {
        self.visual_design_rating.is_none()
            && self.ease_of_navigation_rating.is_none()
            && self.mobile_responsiveness_rating.is_none()
            && non_blank(&self.visual_design_comments).is_none()
            && non_blank(&self.ease_of_navigation_comments).is_none()
            && non_blank(&self.mobile_responsiveness_comments).is_none()
    }

    fn normalized(&self) -> Self {
        Self {
            visual_design_comments: owned_non_blank(&self.visual_design_comments),
            ease_of_navigation_comments: owned_non_blank(&self.ease_of_navigation_comments),
            mobile_responsiveness_comments: owned_non_blank(&self.mobile_responsiveness_comments),
            ..self.clone()
        }
    }
}

/// Experience ratings (`ux_ratings`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceRatings {
    pub overall_satisfaction_rating: Option<Rating>,
    pub overall_satisfaction_comments: Option<String>,
    pub task_completion_rating: Option<Rating>,
    pub task_completion_comments: Option<String>,
    pub service_quality_rating: Option<Rating>,
    pub service_quality_comments: Option<String>,
}

impl ExperienceRatings {
    pub fn is_empty(&self) -> bool {
        self.overall_satisfaction_rating.is_none()
            && self.task_completion_rating.is_none()
            && self.service_quality_rating.is_none()
            && non_blank(&self.overall_satisfaction_comments).is_none()
            && non_blank(&self.task_completion_comments).is_none()
            && non_blank(&self.service_quality_comments).is_none()
    }

    fn normalized(&self) -> Self {
        Self {
            overall_satisfaction_comments: owned_non_blank(&self.overall_satisfaction_comments),
            task_completion_comments: owned_non_blank(&self.task_completion_comments),
            service_quality_comments: owned_non_blank(&self.service_quality_comments),
            ..self.clone()
        }
    }
}

/// Free-text suggestions plus follow-up consent (`suggestions_and_needs`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionsAndConsent {
    pub liked_features: Option<String>,
    pub improvement_suggestions: Option<String>,
    pub desired_features: Option<String>,
    pub legal_challenges: Option<String>,
    pub additional_feedback: Option<String>,
    pub follow_up_consent: Option<FollowUpConsent>,
    pub follow_up_email: Option<String>,
}

impl SuggestionsAndConsent {
    /// An explicit consent answer counts as a supplied field.
    pub fn is_empty(&self) -> bool {
        self.follow_up_consent.is_none()
            && [
                &self.liked_features,
                &self.improvement_suggestions,
                &self.desired_features,
                &self.legal_challenges,
                &self.additional_feedback,
                &self.follow_up_email,
            ]
            .into_iter()
            .all(|field| non_blank(field).is_none())
    }

    /// Consent value stored when this group is written.
    pub fn consent_or_default(&self) -> FollowUpConsent {
        self.follow_up_consent.unwrap_or(FollowUpConsent::No)
    }

    fn normalized(&self) -> Self {
        Self {
            liked_features: owned_non_blank(&self.liked_features),
            improvement_suggestions: owned_non_blank(&self.improvement_suggestions),
            desired_features: owned_non_blank(&self.desired_features),
            legal_challenges: owned_non_blank(&self.legal_challenges),
            additional_feedback: owned_non_blank(&self.additional_feedback),
            follow_up_consent: self.follow_up_consent,
            follow_up_email: owned_non_blank(&self.follow_up_email)
                .map(|email| email.trim().to_string()),
        }
    }
}

/// Which dependent table a group lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependentGroupKind {
    Presentation,
    Experience,
    Suggestions,
}

impl DependentGroupKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Presentation => "ui_ratings",
            Self::Experience => "ux_ratings",
            Self::Suggestions => "suggestions_and_needs",
        }
    }
}

/// A group that passed its presence predicate and must be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependentGroup<'a> {
    Presentation(&'a PresentationRatings),
    Experience(&'a ExperienceRatings),
    Suggestions(&'a SuggestionsAndConsent),
}

impl DependentGroup<'_> {
    pub fn kind(&self) -> DependentGroupKind {
        match self {
            Self::Presentation(_) => DependentGroupKind::Presentation,
            Self::Experience(_) => DependentGroupKind::Experience,
            Self::Suggestions(_) => DependentGroupKind::Suggestions,
        }
    }
}

/// One feedback form as submitted. Serialized flat, one key per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub user_email: Option<String>,
    #[serde(flatten)]
    pub presentation: PresentationRatings,
    #[serde(flatten)]
    pub experience: ExperienceRatings,
    #[serde(flatten)]
    pub suggestions: SuggestionsAndConsent,
}

impl FeedbackSubmission {
    /// Copy with blank text fields cleared to `None` and emails trimmed.
    pub fn normalized(&self) -> Self {
        Self {
            user_email: owned_non_blank(&self.user_email).map(|email| email.trim().to_string()),
            presentation: self.presentation.normalized(),
            experience: self.experience.normalized(),
            suggestions: self.suggestions.normalized(),
        }
    }

    /// Cross-field checks that the rating type cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(email) = non_blank(&self.user_email) {
            validate_email("user_email", email.trim())?;
        }

        match non_blank(&self.suggestions.follow_up_email) {
            Some(email) => validate_email("follow_up_email", email.trim())?,
            None if self.suggestions.follow_up_consent == Some(FollowUpConsent::Yes) => {
                return Err(ValidationError::MissingFollowUpEmail);
            }
            None => {}
        }

        Ok(())
    }

    /// Groups to write, in table order. Evaluated once per write.
    pub fn dependent_groups(&self) -> Vec<DependentGroup<'_>> {
        let mut groups = Vec::with_capacity(3);
        if !self.presentation.is_empty() {
            groups.push(DependentGroup::Presentation(&self.presentation));
        }
        if !self.experience.is_empty() {
            groups.push(DependentGroup::Experience(&self.experience));
        }
        if !self.suggestions.is_empty() {
            groups.push(DependentGroup::Suggestions(&self.suggestions));
        }
        groups
    }
}

/// A stored submission joined with whatever groups exist for it.
///
/// Fields of groups that were never written read back as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionView {
    pub id: SubmissionId,
    pub user_email: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    #[serde(flatten)]
    pub presentation: PresentationRatings,
    #[serde(flatten)]
    pub experience: ExperienceRatings,
    #[serde(flatten)]
    pub suggestions: SuggestionsAndConsent,
}

fn owned_non_blank(value: &Option<String>) -> Option<String> {
    non_blank(value).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{
        DependentGroupKind, FeedbackSubmission, FollowUpConsent, Rating, SuggestionsAndConsent,
    };
    use crate::model::validation::ValidationError;

    fn kinds(submission: &FeedbackSubmission) -> Vec<DependentGroupKind> {
        submission
            .dependent_groups()
            .iter()
            .map(|group| group.kind())
            .collect()
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        assert_eq!(Rating::new(1).unwrap().get(), 1);
        assert_eq!(Rating::new(5).unwrap().get(), 5);
        assert_eq!(Rating::new(0), Err(ValidationError::RatingOutOfRange(0)));
        assert_eq!(Rating::new(6), Err(ValidationError::RatingOutOfRange(6)));
    }

    #[test]
    fn empty_submission_has_no_groups() {
        assert!(kinds(&FeedbackSubmission::default()).is_empty());
    }

    #[test]
    fn blank_comments_do_not_trigger_a_group() {
        let mut submission = FeedbackSubmission::default();
        submission.presentation.visual_design_comments = Some("   ".to_string());
        submission.suggestions.liked_features = Some(String::new());
        assert!(kinds(&submission).is_empty());
        assert!(submission.normalized().presentation.visual_design_comments.is_none());
    }

    #[test]
    fn comment_alone_triggers_its_group() {
        let mut submission = FeedbackSubmission::default();
        submission.experience.task_completion_comments = Some("slow upload".to_string());
        assert_eq!(kinds(&submission), vec![DependentGroupKind::Experience]);
    }

    #[test]
    fn explicit_consent_alone_triggers_suggestions() {
        let suggestions = SuggestionsAndConsent {
            follow_up_consent: Some(FollowUpConsent::No),
            ..SuggestionsAndConsent::default()
        };
        assert!(!suggestions.is_empty());
    }

    #[test]
    fn consent_defaults_to_no() {
        let suggestions = SuggestionsAndConsent {
            liked_features: Some("x".to_string()),
            ..SuggestionsAndConsent::default()
        };
        assert_eq!(suggestions.consent_or_default(), FollowUpConsent::No);
    }

    #[test]
    fn consent_yes_requires_follow_up_email() {
        let mut submission = FeedbackSubmission::default();
        submission.suggestions.follow_up_consent = Some(FollowUpConsent::Yes);
        assert_eq!(
            submission.validate(),
            Err(ValidationError::MissingFollowUpEmail)
        );

        submission.suggestions.follow_up_email = Some("reach@me.org".to_string());
        assert_eq!(submission.validate(), Ok(()));
    }

    #[test]
    fn malformed_emails_are_rejected() {
        let submission = FeedbackSubmission {
            user_email: Some("nobody".to_string()),
            ..FeedbackSubmission::default()
        };
        assert!(matches!(
            submission.validate(),
            Err(ValidationError::InvalidEmail {
                field: "user_email",
                ..
            })
        ));
    }
}
