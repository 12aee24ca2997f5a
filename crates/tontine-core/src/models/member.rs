//! Membership rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::ids::{GroupId, MemberId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Member => write!(f, "member"),
        }
    }
}

/// Membership lifecycle: pending → active → removed | left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pending,
    Active,
    /// Excluded by the admin
    Removed,
    /// Left on their own
    Left,
}

impl MemberStatus {
    /// Pending and active members both hold a seat.
    pub fn holds_seat(self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Removed => write!(f, "removed"),
            Self::Left => write!(f, "left"),
        }
    }
}

/// A user's membership in one group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub group_id: GroupId,

    pub user_id: UserId,

    pub role: Role,

    pub status: MemberStatus,

    pub created_at: DateTime<Utc>,

    /// Set when the member becomes active
    pub joined_at: Option<DateTime<Utc>>,

    /// Set when the member is removed or leaves
    pub exited_at: Option<DateTime<Utc>>,
}

impl Member {
    /// A join request or accepted invitation awaiting confirmation.
    pub(crate) fn pending(group_id: GroupId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            group_id,
            user_id,
            role: Role::Member,
            status: MemberStatus::Pending,
            created_at: now,
            joined_at: None,
            exited_at: None,
        }
    }

    /// The founder: admin and active from the start.
    pub(crate) fn founder(group_id: GroupId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            group_id,
            user_id,
            role: Role::Admin,
            status: MemberStatus::Active,
            created_at: now,
            joined_at: Some(now),
            exited_at: None,
        }
    }

    pub fn id(&self) -> MemberId {
        MemberId::new(self.group_id.clone(), self.user_id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    /// The acting admin of the group.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin && self.is_active()
    }
}

/// Join order: `joined_at` ascending, ties broken by user id. Members that
/// never joined sort last.
pub fn join_order(a: &Member, b: &Member) -> Ordering {
    match (a.joined_at, b.joined_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.user_id.cmp(&b.user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn member(user: &str, joined: Option<i64>) -> Member {
        let now = Utc.timestamp_opt(0, 0).unwrap();
        let mut m = Member::pending(GroupId::new("g"), UserId::new(user), now);
        if let Some(secs) = joined {
            m.status = MemberStatus::Active;
            m.joined_at = Some(Utc.timestamp_opt(secs, 0).unwrap());
        }
        m
    }

    #[test]
    fn founder_is_active_admin() {
        let now = Utc::now();
        let m = Member::founder(GroupId::new("g"), UserId::new("ada"), now);
        assert!(m.is_admin());
        assert_eq!(m.joined_at, Some(now));
        assert_eq!(m.id(), MemberId::new(GroupId::new("g"), UserId::new("ada")));
    }

    #[test]
    fn seats() {
        assert!(MemberStatus::Pending.holds_seat());
        assert!(MemberStatus::Active.holds_seat());
        assert!(!MemberStatus::Removed.holds_seat());
        assert!(!MemberStatus::Left.holds_seat());
    }

    #[test]
    fn join_order_uses_time_then_user() {
        let mut members = vec![
            member("carol", Some(20)),
            member("bob", Some(10)),
            member("alice", Some(10)),
            member("dave", None),
        ];
        members.sort_by(join_order);
        let order: Vec<_> = members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(order, ["alice", "bob", "carol", "dave"]);
    }
}
