//! Registration and opt-out use-case service.

use crate::model::party::{
    EmailScope, OptOutParty, OptOutPartyRecord, PartyId, PartyRole, RegisteredParty,
    RegisteredPartyRecord,
};
use crate::model::report::PartyAnalytics;
use crate::model::validation::ValidationError;
use crate::repo::party_repo::PartyRepository;
use crate::repo::{PersistenceError, RepoResult};
use log::{error, warn};

/// Result of one registration or opt-out attempt.
#[derive(Debug)]
pub enum RegistrationOutcome {
    Registered(PartyId),
    /// The email is already stored for this scope.
    AlreadyExists,
    Rejected(ValidationError),
    Failed(PersistenceError),
}

impl RegistrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Registered(_))
    }

    fn from_result(result: RepoResult<PartyId>) -> Self {
        match result {
            Ok(id) => Self::Registered(id),
            Err(PersistenceError::Duplicate { .. }) => Self::AlreadyExists,
            Err(PersistenceError::Validation(err)) => {
                warn!("event=party_register module=service status=rejected error={err}");
                Self::Rejected(err)
            }
            Err(err) => Self::Failed(err),
        }
    }
}

pub struct PartyService<R: PartyRepository> {
    repo: R,
}

impl<R: PartyRepository> PartyService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn register(&self, party: &RegisteredParty) -> RegistrationOutcome {
        RegistrationOutcome::from_result(self.repo.save_registered_party(party))
    }

    pub fn opt_out(&self, party: &OptOutParty) -> RegistrationOutcome {
        RegistrationOutcome::from_result(self.repo.save_opt_out_party(party))
    }

    /// Probe only; `false` on storage errors.
    pub fn email_exists(&self, email: &str, scope: EmailScope) -> bool {
        self.repo.email_exists(email, scope).unwrap_or_else(|err| {
            error!(
                "event=email_exists module=service status=error table={} error={err}",
                scope.table()
            );
            false
        })
    }

    pub fn list_registered_parties(&self, role: PartyRole) -> Vec<RegisteredPartyRecord> {
        self.repo.list_registered_parties(role).unwrap_or_else(|err| {
            error!(
                "event=party_list module=service status=error role={} error={err}",
                role.as_str()
            );
            Vec::new()
        })
    }

    pub fn list_opt_out_parties(&self) -> Vec<OptOutPartyRecord> {
        self.repo.list_opt_out_parties().unwrap_or_else(|err| {
            error!("event=opt_out_list module=service status=error error={err}");
            Vec::new()
        })
    }

    pub fn party_analytics(&self) -> PartyAnalytics {
        self.repo.party_analytics().unwrap_or_else(|err| {
            error!("event=party_analytics module=service status=error error={err}");
            PartyAnalytics::default()
        })
    }
}
