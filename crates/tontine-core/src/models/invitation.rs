//! Invitations to join a group, addressed by email and/or phone.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{GroupId, InvitationId, UserId};
use crate::error::{Error, Result};

/// Invitation lifecycle. Everything but `Pending` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Declined => write!(f, "declined"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Where to reach the invitee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteTarget {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl InviteTarget {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            phone: None,
        }
    }

    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            email: None,
            phone: Some(phone.into()),
        }
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Trim both fields, drop empty ones and check the email shape.
    pub(crate) fn normalized(self) -> Result<Self> {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let email = clean(self.email);
        let phone = clean(self.phone);

        if let Some(email) = &email {
            match email.split_once('@') {
                Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
                _ => return Err(Error::InvalidTarget),
            }
        }
        if email.is_none() && phone.is_none() {
            return Err(Error::InvalidTarget);
        }
        Ok(Self { email, phone })
    }
}

/// An outstanding or resolved invitation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invitation {
    pub id: InvitationId,

    pub email: Option<String>,

    pub phone: Option<String>,

    /// Member who sent the invitation
    pub invited_by: UserId,

    pub status: InvitationStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// User that accepted, once accepted
    pub accepted_by: Option<UserId>,
}

impl Invitation {
    pub(crate) fn new(
        group: GroupId,
        target: InviteTarget,
        invited_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvitationId::generate(group),
            email: target.email,
            phone: target.phone,
            invited_by,
            status: InvitationStatus::Pending,
            created_at: now,
            updated_at: now,
            accepted_by: None,
        }
    }

    /// Pending and strictly older than `ttl`.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.status == InvitationStatus::Pending && now - self.created_at > ttl
    }
}

/// How the invitee answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Accept, joining as `user`
    Accept { user: UserId },
    Decline,
}
