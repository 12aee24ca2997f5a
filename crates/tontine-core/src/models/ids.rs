//! Identifiers for groups, members, invitations and cycles.
//!
//! Group ids and invitation tokens are random. Member and cycle ids are
//! composite: a member is the pair (group, user) and a cycle is the pair
//! (group, ordinal), so the uniqueness rules of the model are enforced by
//! the storage keys themselves.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Random 128-bit token, hex encoded.
pub(crate) fn random_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Opaque group identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(random_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a user in the external identity service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// User ids become part of storage keys, so they must be non-empty and
    /// free of the `:` separator.
    pub fn validate(&self) -> Result<()> {
        if self.0.trim().is_empty() {
            return Err(Error::InvalidInput("user id is empty".into()));
        }
        if self.0.contains(':') {
            return Err(Error::InvalidInput(format!(
                "user id {:?} contains ':'",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A membership: one user inside one group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId {
    pub group: GroupId,
    pub user: UserId,
}

impl MemberId {
    pub fn new(group: GroupId, user: UserId) -> Self {
        Self { group, user }
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.user)
    }
}

/// A rotation slot, numbered from 1 within its group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CycleId {
    pub group: GroupId,
    pub ordinal: u32,
}

impl CycleId {
    pub fn new(group: GroupId, ordinal: u32) -> Self {
        Self { group, ordinal }
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.group, self.ordinal)
    }
}

/// An invitation token scoped to its group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvitationId {
    pub group: GroupId,
    pub token: String,
}

impl InvitationId {
    pub fn new(group: GroupId, token: impl Into<String>) -> Self {
        Self {
            group,
            token: token.into(),
        }
    }

    pub(crate) fn generate(group: GroupId) -> Self {
        Self::new(group, random_token())
    }
}

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/invite/{}", self.group, self.token)
    }
}
