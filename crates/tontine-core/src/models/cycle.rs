//! Cycle model - one rotation slot with one recipient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CycleId, UserId};

/// Cycle lifecycle: scheduled → active → completed, or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Scheduled,
    Active,
    Completed,
    Skipped,
}

impl CycleStatus {
    /// Completed or skipped; the rotation has moved past this slot.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cycle {
    pub id: CycleId,

    /// Target period; contributions are due at this instant
    pub cycle_month: DateTime<Utc>,

    pub recipient: Option<UserId>,

    pub status: CycleStatus,

    pub created_at: DateTime<Utc>,

    pub activated_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    pub skip_reason: Option<String>,
}

impl Cycle {
    pub(crate) fn scheduled(
        id: CycleId,
        cycle_month: DateTime<Utc>,
        recipient: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            cycle_month,
            recipient: Some(recipient),
            status: CycleStatus::Scheduled,
            created_at: now,
            activated_at: None,
            completed_at: None,
            skip_reason: None,
        }
    }

    pub fn is_recipient(&self, user: &UserId) -> bool {
        self.recipient.as_ref() == Some(user)
    }

    /// The cycle's period has started.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.cycle_month
    }
}
