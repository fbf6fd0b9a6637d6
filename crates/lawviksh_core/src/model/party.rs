//! Registration and opt-out records.
//!
//! # Invariants
//! - Name and phone number are trimmed and never empty once normalized.
//! - Email is trimmed and shaped like an address.
//! - Enum columns only ever hold the values declared here.

use crate::model::validation::{
    canonical_email, non_blank, require_non_blank, validate_email, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Database identity of a stored registration or opt-out row.
pub type PartyId = i64;

/// Role discriminator stored in `users.user_type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    #[default]
    User,
    Creator,
}

impl PartyRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Creator => "creator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "creator" => Some(Self::Creator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
    #[serde(rename = "Prefer not to say")]
    PreferNotToSay,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
            Self::PreferNotToSay => "Prefer not to say",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            "Other" => Some(Self::Other),
            "Prefer not to say" => Some(Self::PreferNotToSay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Profession {
    Student,
    Lawyer,
    Other,
}

impl Profession {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Lawyer => "Lawyer",
            Self::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Student" => Some(Self::Student),
            "Lawyer" => Some(Self::Lawyer),
            "Other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Why someone opted out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptOutReason {
    #[serde(rename = "Too complex")]
    TooComplex,
    #[serde(rename = "Not relevant")]
    NotRelevant,
    Other,
}

impl OptOutReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooComplex => "Too complex",
            Self::NotRelevant => "Not relevant",
            Self::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Too complex" => Some(Self::TooComplex),
            "Not relevant" => Some(Self::NotRelevant),
            "Other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Table probed by the duplicate-email check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailScope {
    /// Registered users and creators share one address space.
    Users,
    OptOuts,
}

impl EmailScope {
    pub fn table(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::OptOuts => "not_interested_users",
        }
    }
}

/// A user or creator registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredParty {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub gender: Option<Gender>,
    pub profession: Option<Profession>,
    pub interest_reason: Option<String>,
    #[serde(rename = "user_type", default)]
    pub role: PartyRole,
}

impl RegisteredParty {
    /// Trimmed, validated copy ready for storage.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let contact = Contact::normalize(&self.name, &self.email, &self.phone_number)?;
        Ok(Self {
            name: contact.name,
            email: contact.email,
            phone_number: contact.phone_number,
            gender: self.gender,
            profession: self.profession,
            interest_reason: non_blank(&self.interest_reason).map(str::to_string),
            role: self.role,
        })
    }
}

/// Someone who declined to proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptOutParty {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub gender: Option<Gender>,
    pub profession: Option<Profession>,
    #[serde(rename = "not_interested_reason")]
    pub reason: Option<OptOutReason>,
    pub improvement_suggestions: Option<String>,
    pub interest_reason: Option<String>,
}

impl OptOutParty {
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let contact = Contact::normalize(&self.name, &self.email, &self.phone_number)?;
        Ok(Self {
            name: contact.name,
            email: contact.email,
            phone_number: contact.phone_number,
            gender: self.gender,
            profession: self.profession,
            reason: self.reason,
            improvement_suggestions: non_blank(&self.improvement_suggestions).map(str::to_string),
            interest_reason: non_blank(&self.interest_reason).map(str::to_string),
        })
    }
}

/// Stored registration row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredPartyRecord {
    pub id: PartyId,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    #[serde(flatten)]
    pub party: RegisteredParty,
}

/// Stored opt-out row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptOutPartyRecord {
    pub id: PartyId,
    pub created_at: i64,
    #[serde(flatten)]
    pub party: OptOutParty,
}

struct Contact {
    name: String,
    email: String,
    phone_number: String,
}

impl Contact {
    fn normalize(name: &str, email: &str, phone_number: &str) -> Result<Self, ValidationError> {
        let name = require_non_blank("name", name)?;
        let email = canonical_email(&require_non_blank("email", email)?);
        validate_email("email", &email)?;
        let phone_number = require_non_blank("phone_number", phone_number)?;
        Ok(Self {
            name,
            email,
            phone_number,
        })
    }
}
