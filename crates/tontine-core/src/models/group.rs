//! Group model - one savings circle and its fixed terms.

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::GroupId;
use crate::error::{Error, Result};

/// Currency used when the founder does not pick one.
pub const DEFAULT_CURRENCY: &str = "MAD";

/// Smallest rotation that makes sense: one payer, one recipient.
pub const MIN_MEMBERS: u32 = 2;

/// How often a cycle comes around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Biweekly,
    #[default]
    Monthly,
    Quarterly,
}

impl Frequency {
    /// Move `from` forward by `periods` periods. Month arithmetic clamps to
    /// the last day of shorter months (Jan 31 + 1 month = Feb 28/29), so
    /// dates are always counted from the same anchor.
    pub fn advance(self, from: DateTime<Utc>, periods: u32) -> Option<DateTime<Utc>> {
        let weeks = |n: u32| Duration::try_weeks(i64::from(periods) * i64::from(n));
        match self {
            Self::Weekly => from.checked_add_signed(weeks(1)?),
            Self::Biweekly => from.checked_add_signed(weeks(2)?),
            Self::Monthly => from.checked_add_months(Months::new(periods)),
            Self::Quarterly => from.checked_add_months(Months::new(periods.checked_mul(3)?)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly => write!(f, "weekly"),
            Self::Biweekly => write!(f, "biweekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Quarterly => write!(f, "quarterly"),
        }
    }
}

/// Recipient ordering requested by the founder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationOrder {
    /// First to join, first to receive.
    #[default]
    FirstJoined,
    /// Random order, fixed when the group is created.
    Shuffled,
}

/// Recipient ordering as stored on the group. The shuffle seed is drawn
/// once at creation and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RotationPolicy {
    FirstJoined,
    Shuffled { seed: u64 },
}

impl RotationPolicy {
    fn from_order(order: RotationOrder) -> Self {
        match order {
            RotationOrder::FirstJoined => Self::FirstJoined,
            RotationOrder::Shuffled => Self::Shuffled {
                seed: rand::random(),
            },
        }
    }
}

/// What happens to a recipient whose cycle gets skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// The slot is gone; the member will not be paid out.
    #[default]
    Forfeit,
    /// The member goes back to the end of the queue.
    Requeue,
}

/// A savings group.
///
/// The admin is not stored here: it is the group's single member with
/// role admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: GroupId,

    pub name: String,

    pub description: Option<String>,

    /// Fixed contribution per member per cycle
    pub amount: Decimal,

    /// Three-letter currency code
    pub currency: String,

    pub frequency: Frequency,

    /// Upper bound on the rotation length
    pub max_members: u32,

    pub rotation: RotationPolicy,

    pub skip_policy: SkipPolicy,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Bumped by every transaction that mutates anything in the group
    #[serde(default)]
    pub revision: u64,
}

impl Group {
    pub(crate) fn create(new: NewGroup, now: DateTime<Utc>) -> Self {
        Self {
            id: GroupId::generate(),
            name: new.name.trim().to_string(),
            description: new.description,
            amount: new.amount.normalize(),
            currency: new.currency,
            frequency: new.frequency,
            max_members: new.max_members,
            rotation: RotationPolicy::from_order(new.rotation),
            skip_policy: new.skip_policy,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Target period of the first cycle: one period after creation.
    pub fn first_cycle_month(&self) -> Result<DateTime<Utc>> {
        self.cycle_month(1)
    }

    /// Target period of the `period`-th slot, counted from creation.
    pub fn cycle_month(&self, period: u32) -> Result<DateTime<Utc>> {
        self.frequency
            .advance(self.created_at, period)
            .ok_or_else(|| Error::InvalidInput("cycle date out of range".into()))
    }
}

/// Input for creating a group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub frequency: Frequency,
    pub max_members: u32,
    pub rotation: RotationOrder,
    pub skip_policy: SkipPolicy,
}

impl NewGroup {
    /// Create group input with required fields and defaults elsewhere.
    pub fn new(name: impl Into<String>, amount: Decimal, max_members: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            frequency: Frequency::default(),
            max_members,
            rotation: RotationOrder::default(),
            skip_policy: SkipPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    #[must_use]
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: RotationOrder) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_amount(self.amount)?;
        validate_currency(&self.currency)?;
        validate_max_members(self.max_members)
    }
}

/// Admin edits to a group. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub max_members: Option<u32>,
}

impl GroupPatch {
    pub(crate) fn touches_terms(&self) -> bool {
        self.amount.is_some() || self.max_members.is_some()
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("group name is empty".into()));
    }
    Ok(())
}

pub(crate) fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidInput(format!(
            "contribution amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_currency(code: &str) -> Result<()> {
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(Error::InvalidInput(format!(
            "currency {code:?} is not a three-letter code"
        )));
    }
    Ok(())
}

pub(crate) fn validate_max_members(max_members: u32) -> Result<()> {
    if max_members < MIN_MEMBERS {
        return Err(Error::InvalidInput(format!(
            "a group needs at least {MIN_MEMBERS} members, got {max_members}"
        )));
    }
    Ok(())
}
