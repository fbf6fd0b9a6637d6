//! Transactional persistence core for LawViksh submissions.
//! Owns the storage adapters, the schema, atomic fan-out writes and the
//! aggregate read views.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, BackendConfig, ConfigError, NetworkConfig};
pub use db::{BackendKind, Database, DbError, DbResult, StorageBackend};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::feedback::{
    ExperienceRatings, FeedbackSubmission, FollowUpConsent, PresentationRatings, Rating,
    SubmissionId, SubmissionView, SuggestionsAndConsent,
};
pub use model::party::{
    EmailScope, Gender, OptOutParty, OptOutPartyRecord, OptOutReason, PartyId, PartyRole,
    Profession, RegisteredParty, RegisteredPartyRecord,
};
pub use model::report::{
    ConsentCounts, DataExport, ExportTotals, FeedbackSummary, PartyAnalytics, RatingAverages,
    SubmissionAnalytics, NOT_SPECIFIED,
};
pub use model::validation::ValidationError;
pub use repo::feedback_repo::{FeedbackRepository, SqlFeedbackRepository};
pub use repo::party_repo::{PartyRepository, SqlPartyRepository};
pub use repo::{PersistenceError, RepoResult, WriteStep};
pub use service::export_service::ExportService;
pub use service::feedback_service::{FeedbackService, SubmissionOutcome};
pub use service::party_service::{PartyService, RegistrationOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
