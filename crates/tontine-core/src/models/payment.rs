//! Contribution rows: one per (cycle, contributing member).

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CycleId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    /// Past due plus grace; still payable
    Late,
}

impl PaymentStatus {
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Late)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Late => write!(f, "late"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub cycle: CycleId,

    /// Contributor (never the cycle's recipient)
    pub member: UserId,

    /// Always the group's contribution amount
    pub amount: Decimal,

    pub status: PaymentStatus,

    pub due_at: DateTime<Utc>,

    pub paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub(crate) fn pending(
        cycle: CycleId,
        member: UserId,
        amount: Decimal,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            cycle,
            member,
            amount,
            status: PaymentStatus::Pending,
            due_at,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Still pending once the grace window after the due date has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        self.status == PaymentStatus::Pending && now.signed_duration_since(self.due_at) >= grace
    }
}

/// Money expected and collected for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub expected: Decimal,
    pub collected: Decimal,
}

impl Pot {
    pub fn of(payments: &[Payment]) -> Self {
        let expected = payments.iter().map(|p| p.amount).sum();
        let collected = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .map(|p| p.amount)
            .sum();
        Self {
            expected,
            collected,
        }
    }

    pub fn outstanding(&self) -> Decimal {
        self.expected - self.collected
    }
}
