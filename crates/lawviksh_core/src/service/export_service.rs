//! Full data export.

use crate::model::party::PartyRole;
use crate::model::report::{DataExport, ExportTotals};
use crate::repo::feedback_repo::FeedbackRepository;
use crate::repo::party_repo::PartyRepository;
use crate::service::feedback_service::FeedbackService;
use crate::service::party_service::PartyService;
use log::info;
use std::time::Instant;

pub struct ExportService<F: FeedbackRepository, P: PartyRepository> {
    feedback: FeedbackService<F>,
    parties: PartyService<P>,
}

impl<F: FeedbackRepository, P: PartyRepository> ExportService<F, P> {
    pub fn new(feedback_repo: F, party_repo: P) -> Self {
        Self {
            feedback: FeedbackService::new(feedback_repo),
            parties: PartyService::new(party_repo),
        }
    }

    /// Snapshot of every listing and rollup. Sections that fail to load are
    /// empty; totals count what was actually exported.
    pub fn export(&self) -> DataExport {
        let started_at = Instant::now();

        let users = self.parties.list_registered_parties(PartyRole::User);
        let creators = self.parties.list_registered_parties(PartyRole::Creator);
        let not_interested_users = self.parties.list_opt_out_parties();
        let feedback = self.feedback.list_submissions();

        let totals = ExportTotals {
            total_users: users.len() as u64,
            total_creators: creators.len() as u64,
            total_not_interested: not_interested_users.len() as u64,
            total_feedback: feedback.len() as u64,
        };

        info!(
            "event=data_export module=service status=ok users={} creators={} not_interested={} feedback={} duration_ms={}",
            totals.total_users,
            totals.total_creators,
            totals.total_not_interested,
            totals.total_feedback,
            started_at.elapsed().as_millis()
        );

        DataExport {
            users,
            creators,
            not_interested_users,
            feedback,
            party_analytics: self.parties.party_analytics(),
            feedback_analytics: self.feedback.submission_analytics(),
            totals,
        }
    }
}
