//! Error types for the tontine core.

use thiserror::Error;

use crate::models::{CycleId, UserId};

/// Result type for tontine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by tontine operations.
///
/// Every variant is a recoverable condition reported to the caller. An
/// operation that returns an error has not written anything.
#[derive(Debug, Error)]
pub enum Error {
    /// The user already has a membership row in this group.
    #[error("user {0} is already a member of this group")]
    DuplicateMember(UserId),

    /// Every seat of the group is taken by a pending or active member.
    #[error("group is full ({max_members} members)")]
    GroupFull { max_members: u32 },

    /// The entity is not in a state that allows the requested change.
    #[error("invalid {entity} transition: expected {expected}, got {actual}")]
    InvalidTransition {
        entity: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// The acting user may not perform this operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An invitation needs a usable email address or phone number.
    #[error("invitation needs an email address or a phone number")]
    InvalidTarget,

    /// No outstanding payment exists for this member in this cycle.
    #[error("no payment expected from {member} in cycle {cycle}")]
    NotExpected { cycle: CycleId, member: UserId },

    /// The payment was already recorded with a different timestamp.
    #[error("payment from {member} in cycle {cycle} is already recorded")]
    AlreadyPaid { cycle: CycleId, member: UserId },

    /// Every active member already holds a payout slot.
    #[error("rotation exhausted: every active member already has a payout slot")]
    RotationExhausted,

    /// The member still has an unfunded payout in progress.
    #[error("{0} is the recipient of an active cycle that is not funded yet")]
    CannotRemoveRecipientWithUnpaidCycle(UserId),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn transition(
        entity: &'static str,
        expected: &'static str,
        actual: impl ToString,
    ) -> Self {
        Error::InvalidTransition {
            entity,
            expected,
            actual: actual.to_string(),
        }
    }
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(Error::Storage("busy".into()).to_string(), "Storage error: busy");
        assert_eq!(Error::NotFound("group g".into()).to_string(), "Not found: group g");
        assert_eq!(
            Error::transition("cycle", "active", "skipped").to_string(),
            "invalid cycle transition: expected active, got skipped"
        );
    }
}
