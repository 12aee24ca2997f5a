//! Group Aggregator: read-only summaries for dashboards.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::identity::{Directory, Profile};
use crate::ledger::progress_percent;
use crate::models::{
    join_order, CycleStatus, Group, GroupId, Member, MemberId, MemberStatus, Pot, Role, UserId,
};
use crate::notify::Notifier;
use crate::scheduler::waiting_order;
use crate::service::Tontine;
use crate::store::{Store, Tx};

/// Where a group stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: Group,
    pub active_members: usize,
    /// Pending and active members
    pub total_members: usize,
    pub max_members: u32,
    pub completed_cycles: usize,
    /// Percent of `max_members` payouts completed
    pub progress: u8,
    /// Due date of the running cycle
    pub next_payment: Option<DateTime<Utc>>,
    pub current_recipient: Option<UserId>,
    /// Totals of the running cycle
    pub pot: Option<Pot>,
    /// Started, nothing open, and nobody left to pay out
    pub finished: bool,
}

/// One line of a user's dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Membership {
    pub role: Role,
    pub status: MemberStatus,
    pub summary: GroupSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub member: Member,
    pub profile: Option<Profile>,
}

fn summarize(tx: &mut Tx<'_>, group: Group) -> Result<GroupSummary> {
    let members = tx.members(&group.id)?;
    let cycles = tx.cycles(&group.id)?;

    let completed_cycles = cycles
        .iter()
        .filter(|c| c.status == CycleStatus::Completed)
        .count();
    let active = cycles.iter().find(|c| c.status == CycleStatus::Active);
    let pot = match active {
        Some(cycle) => Some(Pot::of(&tx.payments(&cycle.id)?)),
        None => None,
    };

    let live = cycles
        .iter()
        .filter(|c| c.status != CycleStatus::Skipped)
        .count();
    let finished = !cycles.is_empty()
        && cycles.iter().all(|c| c.status.is_resolved())
        && (live >= group.max_members as usize
            || waiting_order(&group, &members, &cycles).is_empty());

    Ok(GroupSummary {
        active_members: members.iter().filter(|m| m.is_active()).count(),
        total_members: members.iter().filter(|m| m.status.holds_seat()).count(),
        max_members: group.max_members,
        completed_cycles,
        progress: progress_percent(completed_cycles, group.max_members),
        next_payment: active.map(|c| c.cycle_month),
        current_recipient: active.and_then(|c| c.recipient.clone()),
        pot,
        finished,
        group,
    })
}

impl<S: Store, N: Notifier> Tontine<S, N> {
    /// Counts, progress and the running cycle of one group. A group without
    /// cycles reports zero progress and no next payment.
    pub fn summary(&self, group: &GroupId) -> Result<GroupSummary> {
        self.read(|tx| {
            let group = tx.require_group(group)?;
            summarize(tx, group)
        })
    }

    /// A summary of every group the user belongs to, with their role and
    /// status there.
    pub fn dashboard(&self, user: &UserId) -> Result<Vec<Membership>> {
        self.read(|tx| {
            let mut lines = Vec::new();
            for id in tx.user_groups(user)? {
                let member = tx.require_member(&MemberId::new(id.clone(), user.clone()))?;
                let group = tx.require_group(&id)?;
                lines.push(Membership {
                    role: member.role,
                    status: member.status,
                    summary: summarize(tx, group)?,
                });
            }
            lines.sort_by(|a, b| b.summary.group.created_at.cmp(&a.summary.group.created_at));
            Ok(lines)
        })
    }

    /// Members in join order with their display profiles. A directory
    /// failure leaves that member without a profile.
    pub fn roster(&self, group: &GroupId, directory: &impl Directory) -> Result<Vec<RosterEntry>> {
        let mut members = self.members(group)?;
        members.sort_by(join_order);

        Ok(members
            .into_iter()
            .map(|member| {
                let profile = match directory.profile(&member.user_id) {
                    Ok(profile) => profile,
                    Err(e) => {
                        warn!(user = %member.user_id, error = %e, "profile lookup failed");
                        None
                    }
                };
                RosterEntry { member, profile }
            })
            .collect())
    }
}
