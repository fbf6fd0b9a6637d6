//! Value types handed to and returned from the persistence layer.

pub mod feedback;
pub mod party;
pub mod report;
pub mod validation;
