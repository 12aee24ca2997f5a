//! Membership Registry.
//!
//! A member is pending until the admin confirms them, active while they take
//! part in the rotation, and removed or left once they exit. Pending and
//! active members both hold a seat; a group never has more seats taken than
//! `max_members`. The admin is whichever active member carries the admin
//! role, and there is exactly one.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::ActivationPolicy;
use crate::error::{Error, Result};
use crate::ledger;
use crate::models::{
    join_order, CycleStatus, Group, GroupId, GroupPatch, Member, MemberId, MemberStatus, NewGroup,
    Role, UserId,
};
use crate::models::{validate_amount, validate_max_members, validate_name};
use crate::notify::{Notifier, Outbox};
use crate::scheduler;
use crate::service::Tontine;
use crate::store::{Store, Tx};

/// The acting user's membership, if they are the group's admin.
pub(crate) fn require_admin(tx: &mut Tx<'_>, group: &GroupId, acting: &UserId) -> Result<Member> {
    tx.member(&MemberId::new(group.clone(), acting.clone()))?
        .filter(Member::is_admin)
        .ok_or_else(|| Error::Forbidden(format!("{acting} is not the admin of group {group}")))
}

fn seats_taken(members: &[Member]) -> usize {
    members.iter().filter(|m| m.status.holds_seat()).count()
}

/// Insert a pending member, enforcing uniqueness and the seat limit.
pub(crate) fn admit(
    tx: &mut Tx<'_>,
    group: &Group,
    user: &UserId,
    role: Role,
    now: DateTime<Utc>,
) -> Result<Member> {
    user.validate()?;
    if role == Role::Admin {
        return Err(Error::Forbidden(
            "the admin role is only granted at group creation or by transfer".into(),
        ));
    }

    let id = MemberId::new(group.id.clone(), user.clone());
    if tx.member(&id)?.is_some() {
        return Err(Error::DuplicateMember(user.clone()));
    }
    if seats_taken(&tx.members(&group.id)?) >= group.max_members as usize {
        return Err(Error::GroupFull {
            max_members: group.max_members,
        });
    }

    let member = Member::pending(group.id.clone(), user.clone(), now);
    tx.put_member(&member)?;
    Ok(member)
}

/// Pending → active. Starts the rotation when this fills the group,
/// otherwise lets a running rotation pick the newcomer up.
pub(crate) fn confirm(
    tx: &mut Tx<'_>,
    outbox: &mut Outbox,
    group: &Group,
    mut member: Member,
    policy: ActivationPolicy,
    now: DateTime<Utc>,
) -> Result<Member> {
    if member.status != MemberStatus::Pending {
        return Err(Error::transition("member", "pending", member.status));
    }
    member.status = MemberStatus::Active;
    member.joined_at = Some(now);
    tx.put_member(&member)?;
    info!(member = %member.id(), "member activated");

    start_if_full(tx, outbox, group, policy, now)?;
    Ok(member)
}

fn start_if_full(
    tx: &mut Tx<'_>,
    outbox: &mut Outbox,
    group: &Group,
    policy: ActivationPolicy,
    now: DateTime<Utc>,
) -> Result<()> {
    if tx.cycles(&group.id)?.is_empty() {
        let active = tx.members(&group.id)?.iter().filter(|m| m.is_active()).count();
        if active >= group.max_members as usize {
            scheduler::begin(tx, outbox, group, policy, now)?;
        }
        return Ok(());
    }
    scheduler::settle(tx, outbox, group, policy, now)?;
    Ok(())
}

impl<S: Store, N: Notifier> Tontine<S, N> {
    /// Create a group. The founder becomes its active admin.
    pub fn create_group(
        &self,
        new: NewGroup,
        founder: UserId,
        now: DateTime<Utc>,
    ) -> Result<Group> {
        new.validate()?;
        founder.validate()?;

        let group = Group::create(new, now);
        let admin = Member::founder(group.id.clone(), founder, now);

        let created = self.mutate("create_group", |tx, _| {
            let mut group = group.clone();
            tx.save_group(&mut group, now)?;
            tx.put_member(&admin)?;
            Ok(group)
        })?;

        info!(group = %created.id, founder = %admin.user_id, "group created");
        Ok(created)
    }

    /// Add a pending member. This is also the join-request path; the admin
    /// confirms with [`activate_member`](Self::activate_member).
    pub fn add_member(
        &self,
        group: &GroupId,
        user: &UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Member> {
        self.mutate("add_member", |tx, _| {
            let mut group = tx.require_group(group)?;
            let member = admit(tx, &group, user, role, now)?;
            tx.save_group(&mut group, now)?;
            Ok(member)
        })
    }

    /// Admin confirms a pending member.
    pub fn activate_member(
        &self,
        member: &MemberId,
        acting: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Member> {
        let policy = self.config().activation;
        self.mutate("activate_member", |tx, outbox| {
            let mut group = tx.require_group(&member.group)?;
            require_admin(tx, &group.id, acting)?;

            let pending = tx.require_member(member)?;
            let active = confirm(tx, outbox, &group, pending, policy, now)?;
            tx.save_group(&mut group, now)?;
            Ok(active)
        })
    }

    /// A member leaves (`acting` is the member) or is removed by the admin.
    ///
    /// The admin cannot exit without handing the role over first. A member
    /// whose payout is running and not yet funded cannot exit at all. A
    /// scheduled payout of the exiting member is skipped. A contribution they
    /// still owe to the running cycle stays owed: the cycle closes once it is
    /// paid, or when the admin skips the cycle.
    pub fn remove_member(
        &self,
        member: &MemberId,
        acting: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Member> {
        let policy = self.config().activation;
        self.mutate("remove_member", |tx, outbox| {
            let mut group = tx.require_group(&member.group)?;
            let mut target = tx.require_member(member)?;

            let leaving = acting == &member.user;
            if !leaving {
                require_admin(tx, &group.id, acting)?;
            }
            if target.role == Role::Admin {
                return Err(Error::Forbidden(
                    "the admin cannot exit; transfer the admin role first".into(),
                ));
            }
            if !target.status.holds_seat() {
                return Err(Error::transition("member", "pending or active", target.status));
            }

            let cycles = tx.cycles(&group.id)?;
            if let Some(active) = cycles.iter().find(|c| c.status == CycleStatus::Active) {
                if active.is_recipient(&member.user) && !ledger::is_funded(tx, &active.id)? {
                    return Err(Error::CannotRemoveRecipientWithUnpaidCycle(member.user.clone()));
                }
            }

            let reason = if leaving { "recipient left" } else { "recipient removed" };
            for cycle in &cycles {
                if cycle.status == CycleStatus::Scheduled && cycle.is_recipient(&member.user) {
                    scheduler::skip(tx, &cycle.id, reason, now)?;
                }
            }

            target.status = if leaving {
                MemberStatus::Left
            } else {
                MemberStatus::Removed
            };
            target.exited_at = Some(now);
            tx.put_member(&target)?;

            scheduler::settle(tx, outbox, &group, policy, now)?;
            tx.save_group(&mut group, now)?;

            info!(member = %member, status = %target.status, "member exited");
            Ok(target)
        })
    }

    /// Hand the admin role to another active member.
    pub fn transfer_admin(
        &self,
        group: &GroupId,
        acting: &UserId,
        new_admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.mutate("transfer_admin", |tx, _| {
            let mut group = tx.require_group(group)?;
            let mut current = require_admin(tx, &group.id, acting)?;
            if acting == new_admin {
                return Err(Error::InvalidInput(format!("{acting} is already the admin")));
            }

            let mut next = tx.require_member(&MemberId::new(group.id.clone(), new_admin.clone()))?;
            if !next.is_active() {
                return Err(Error::transition("member", "active", next.status));
            }

            current.role = Role::Member;
            next.role = Role::Admin;
            tx.put_member(&current)?;
            tx.put_member(&next)?;
            tx.save_group(&mut group, now)?;

            info!(group = %group.id, from = %acting, to = %new_admin, "admin transferred");
            Ok(())
        })
    }

    /// Admin edits. Amount and `max_members` are frozen once the rotation
    /// has started.
    pub fn update_group(
        &self,
        group: &GroupId,
        acting: &UserId,
        patch: GroupPatch,
        now: DateTime<Utc>,
    ) -> Result<Group> {
        let policy = self.config().activation;
        self.mutate("update_group", |tx, outbox| {
            let mut group = tx.require_group(group)?;
            require_admin(tx, &group.id, acting)?;

            if patch.touches_terms() && !tx.cycles(&group.id)?.is_empty() {
                return Err(Error::transition("group", "no cycles yet", "rotation started"));
            }

            if let Some(name) = &patch.name {
                validate_name(name)?;
                group.name = name.trim().to_string();
            }
            if let Some(description) = &patch.description {
                let description = description.trim();
                group.description = (!description.is_empty()).then(|| description.to_string());
            }
            if let Some(amount) = patch.amount {
                validate_amount(amount)?;
                group.amount = amount.normalize();
            }
            if let Some(max_members) = patch.max_members {
                validate_max_members(max_members)?;
                let taken = seats_taken(&tx.members(&group.id)?);
                if (max_members as usize) < taken {
                    return Err(Error::InvalidInput(format!(
                        "{taken} seats are taken, cannot shrink the group to {max_members}"
                    )));
                }
                group.max_members = max_members;
                start_if_full(tx, outbox, &group, policy, now)?;
            }

            tx.save_group(&mut group, now)?;
            Ok(group)
        })
    }

    pub fn group(&self, id: &GroupId) -> Result<Group> {
        self.read(|tx| tx.require_group(id))
    }

    /// Every membership row of the group, any status.
    pub fn members(&self, group: &GroupId) -> Result<Vec<Member>> {
        self.read(|tx| {
            tx.require_group(group)?;
            tx.members(group)
        })
    }

    pub fn member(&self, id: &MemberId) -> Result<Member> {
        self.read(|tx| tx.require_member(id))
    }

    /// Active members in join order: `joined_at` ascending, user id on ties.
    pub fn active_members(&self, group: &GroupId) -> Result<Vec<Member>> {
        let mut active: Vec<Member> = self
            .members(group)?
            .into_iter()
            .filter(Member::is_active)
            .collect();
        active.sort_by(join_order);
        Ok(active)
    }

    /// Groups the user has a membership in, any status.
    pub fn groups_for_user(&self, user: &UserId) -> Result<Vec<Group>> {
        self.read(|tx| {
            let ids = tx.user_groups(user)?;
            let mut groups = Vec::with_capacity(ids.len());
            for id in ids {
                groups.push(tx.require_group(&id)?);
            }
            Ok(groups)
        })
    }
}
