//! Core use-case services.
//!
//! # Responsibility
//! - Map repository results to success/failure outcomes.
//! - Compose read views (summary, export) from repository reads.
//!
//! # Invariants
//! - Services stay storage-agnostic; they only see repository traits.

pub mod export_service;
pub mod feedback_service;
pub mod party_service;
