//! Aggregate read-back shapes: analytics, summaries and the full export.

use crate::model::feedback::SubmissionView;
use crate::model::party::{OptOutPartyRecord, RegisteredPartyRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucket used for rows whose categorical field is null.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Mean of every non-null value per rating field; `None` when a field has
/// no values at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingAverages {
    pub visual_design: Option<f64>,
    pub ease_of_navigation: Option<f64>,
    pub mobile_responsiveness: Option<f64>,
    pub overall_satisfaction: Option<f64>,
    pub task_completion: Option<f64>,
    pub service_quality: Option<f64>,
}

impl RatingAverages {
    /// Copy with every average rounded to `decimals` places.
    pub fn rounded(&self, decimals: i32) -> Self {
        let round = |value: Option<f64>| value.map(|avg| round_to(avg, decimals));
        Self {
            visual_design: round(self.visual_design),
            ease_of_navigation: round(self.ease_of_navigation),
            mobile_responsiveness: round(self.mobile_responsiveness),
            overall_satisfaction: round(self.overall_satisfaction),
            task_completion: round(self.task_completion),
            service_quality: round(self.service_quality),
        }
    }
}

/// Stored consent values, counted over non-null rows only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentCounts {
    pub yes: u64,
    pub no: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAnalytics {
    pub average_ratings: RatingAverages,
    pub total_submissions: u64,
    pub consent_counts: ConsentCounts,
}

/// Newest submissions plus rounded analytics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub recent_submissions: Vec<SubmissionView>,
    pub analytics: SubmissionAnalytics,
}

/// Registration and opt-out rollups.
///
/// Distribution keys are the stored enum strings, with null values counted
/// under [`NOT_SPECIFIED`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyAnalytics {
    pub total_users: u64,
    pub total_not_interested: u64,
    pub gender_distribution: BTreeMap<String, u64>,
    pub profession_distribution: BTreeMap<String, u64>,
    pub not_interested_reasons: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTotals {
    pub total_users: u64,
    pub total_creators: u64,
    pub total_not_interested: u64,
    pub total_feedback: u64,
}

/// Everything the store holds, in one serializable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataExport {
    pub users: Vec<RegisteredPartyRecord>,
    pub creators: Vec<RegisteredPartyRecord>,
    pub not_interested_users: Vec<OptOutPartyRecord>,
    pub feedback: Vec<SubmissionView>,
    pub party_analytics: PartyAnalytics,
    pub feedback_analytics: SubmissionAnalytics,
    pub totals: ExportTotals,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::RatingAverages;

    #[test]
    fn rounded_keeps_two_decimals() {
        let averages = RatingAverages {
            visual_design: Some(3.666_666),
            task_completion: Some(4.0),
            service_quality: Some(2.005_1),
            ..RatingAverages::default()
        };
        let rounded = averages.rounded(2);
        assert_eq!(rounded.visual_design, Some(3.67));
        assert_eq!(rounded.task_completion, Some(4.0));
        assert_eq!(rounded.service_quality, Some(2.01));
        assert_eq!(rounded.ease_of_navigation, None);
    }
}
