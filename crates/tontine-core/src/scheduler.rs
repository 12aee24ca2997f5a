//! Rotation Scheduler.
//!
//! Decides who receives each payout and materializes one [`Cycle`] per
//! rotation slot. Cycles are created lazily: the next one appears only once
//! every earlier cycle is completed or skipped, an active member is still
//! waiting for a slot, and the group has fewer than `max_members`
//! non-skipped cycles.
//!
//! # Ordering
//!
//! The waiting members are ranked by the group's [`RotationPolicy`]:
//!
//! - `FirstJoined`: `joined_at` ascending, user id on ties
//! - `Shuffled { seed }`: Blake3 of the seed and the user id, so the order is
//!   reproducible and a late joiner never reshuffles the others
//!
//! Under [`SkipPolicy::Requeue`] a member whose cycle was skipped waits again
//! behind everyone who has not been skipped as often.
//!
//! # Settling
//!
//! [`settle`] drives a group forward as far as it can in one transaction:
//! complete a funded active cycle, activate a due scheduled cycle, create the
//! next one, and repeat. Every mutation that can unblock the rotation ends
//! by calling it.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::ActivationPolicy;
use crate::error::{Error, Result};
use crate::ledger;
use crate::models::{
    join_order, Cycle, CycleId, CycleStatus, Group, GroupId, Member, Payment, RotationPolicy,
    SkipPolicy, UserId, MIN_MEMBERS,
};
use crate::notify::{Event, Notifier, Outbox, Recipient};
use crate::registry;
use crate::service::Tontine;
use crate::store::{Store, Tx};

/// What one [`settle`] pass changed.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Settled {
    pub completed: usize,
    pub activated: usize,
    pub created: usize,
}

impl Settled {
    pub(crate) fn touched(&self) -> bool {
        self.completed + self.activated + self.created > 0
    }
}

/// Advance the rotation of a started group as far as it goes right now.
pub(crate) fn settle(
    tx: &mut Tx<'_>,
    outbox: &mut Outbox,
    group: &Group,
    policy: ActivationPolicy,
    now: DateTime<Utc>,
) -> Result<Settled> {
    let mut settled = Settled::default();

    loop {
        let cycles = tx.cycles(&group.id)?;
        if cycles.is_empty() {
            return Ok(settled);
        }

        if let Some(active) = cycles.iter().find(|c| c.status == CycleStatus::Active) {
            if !ledger::is_funded(tx, &active.id)? {
                return Ok(settled);
            }
            ledger::complete_cycle(tx, outbox, &active.id, now)?;
            settled.completed += 1;
            continue;
        }

        if let Some(next) = cycles.iter().find(|c| c.status == CycleStatus::Scheduled) {
            if !policy.allows(next, now) {
                return Ok(settled);
            }
            activate_cycle(tx, outbox, group, &next.id, now)?;
            settled.activated += 1;
            continue;
        }

        match plan_next(tx, group, &cycles, now)? {
            Some(cycle) => {
                debug!(cycle = %cycle.id, recipient = ?cycle.recipient, "cycle scheduled");
                tx.put_cycle(&cycle)?;
                settled.created += 1;
            }
            None => return Ok(settled),
        }
    }
}

/// Materialize the first cycle of a group and settle it.
pub(crate) fn begin(
    tx: &mut Tx<'_>,
    outbox: &mut Outbox,
    group: &Group,
    policy: ActivationPolicy,
    now: DateTime<Utc>,
) -> Result<Cycle> {
    let first = plan_next(tx, group, &[], now)?.ok_or(Error::RotationExhausted)?;
    tx.put_cycle(&first)?;
    info!(group = %group.id, recipient = ?first.recipient, "rotation started");

    settle(tx, outbox, group, policy, now)?;
    tx.require_cycle(&first.id)
}

/// The next cycle to create, if the rotation has room and someone waiting.
pub(crate) fn plan_next(
    tx: &mut Tx<'_>,
    group: &Group,
    cycles: &[Cycle],
    now: DateTime<Utc>,
) -> Result<Option<Cycle>> {
    if cycles.iter().any(|c| !c.status.is_resolved()) {
        return Ok(None);
    }
    let live = cycles
        .iter()
        .filter(|c| c.status != CycleStatus::Skipped)
        .count();
    if live >= group.max_members as usize {
        return Ok(None);
    }

    let members = tx.members(&group.id)?;
    let Some(recipient) = waiting_order(group, &members, cycles).into_iter().next() else {
        return Ok(None);
    };

    let ordinal = cycles.last().map_or(1, |c| c.id.ordinal + 1);
    // A slot skipped before it ever ran hands its period on.
    let spent = cycles
        .iter()
        .filter(|c| c.status != CycleStatus::Skipped || c.activated_at.is_some())
        .count();
    let cycle_month = group.cycle_month(spent as u32 + 1)?;

    Ok(Some(Cycle::scheduled(
        CycleId::new(group.id.clone(), ordinal),
        cycle_month,
        recipient,
        now,
    )))
}

/// Active members without a payout slot, in the order they will get one.
pub(crate) fn waiting_order(group: &Group, members: &[Member], cycles: &[Cycle]) -> Vec<UserId> {
    let slotted: HashSet<&UserId> = cycles
        .iter()
        .filter(|c| c.status != CycleStatus::Skipped || group.skip_policy == SkipPolicy::Forfeit)
        .filter_map(|c| c.recipient.as_ref())
        .collect();
    let skips = |user: &UserId| {
        cycles
            .iter()
            .filter(|c| c.status == CycleStatus::Skipped && c.is_recipient(user))
            .count()
    };

    let mut waiting: Vec<&Member> = members
        .iter()
        .filter(|m| m.is_active() && !slotted.contains(&m.user_id))
        .collect();
    waiting.sort_by(|a, b| {
        skips(&a.user_id)
            .cmp(&skips(&b.user_id))
            .then_with(|| policy_order(&group.rotation, a, b))
    });

    waiting.into_iter().map(|m| m.user_id.clone()).collect()
}

fn policy_order(policy: &RotationPolicy, a: &Member, b: &Member) -> Ordering {
    match policy {
        RotationPolicy::FirstJoined => join_order(a, b),
        RotationPolicy::Shuffled { seed } => shuffle_key(*seed, &a.user_id)
            .cmp(&shuffle_key(*seed, &b.user_id))
            .then_with(|| a.user_id.cmp(&b.user_id)),
    }
}

fn shuffle_key(seed: u64, user: &UserId) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(user.as_str().as_bytes());
    *hasher.finalize().as_bytes()
}

/// Scheduled → active, creating one pending payment per contributor.
pub(crate) fn activate_cycle(
    tx: &mut Tx<'_>,
    outbox: &mut Outbox,
    group: &Group,
    id: &CycleId,
    now: DateTime<Utc>,
) -> Result<Cycle> {
    let mut cycle = tx.require_cycle(id)?;
    if cycle.status != CycleStatus::Scheduled {
        return Err(Error::transition("cycle", "scheduled", cycle.status));
    }
    cycle.status = CycleStatus::Active;
    cycle.activated_at = Some(now);

    let contributors: Vec<UserId> = tx
        .members(&group.id)?
        .into_iter()
        .filter(|m| m.is_active() && !cycle.is_recipient(&m.user_id))
        .map(|m| m.user_id)
        .collect();

    for user in &contributors {
        let payment = Payment::pending(
            cycle.id.clone(),
            user.clone(),
            group.amount,
            cycle.cycle_month,
            now,
        );
        tx.put_payment(&payment)?;
        outbox.push(
            Event::PaymentDue {
                cycle: cycle.id.clone(),
                amount: group.amount,
                due_at: cycle.cycle_month,
                overdue: false,
            },
            vec![Recipient::User(user.clone())],
        );
    }

    tx.put_cycle(&cycle)?;
    info!(
        cycle = %cycle.id,
        recipient = ?cycle.recipient,
        contributors = contributors.len(),
        "cycle activated"
    );
    Ok(cycle)
}

/// Mark a scheduled or active cycle skipped.
pub(crate) fn skip(
    tx: &mut Tx<'_>,
    id: &CycleId,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Cycle> {
    let mut cycle = tx.require_cycle(id)?;
    if cycle.status.is_resolved() {
        return Err(Error::transition("cycle", "scheduled or active", cycle.status));
    }
    cycle.status = CycleStatus::Skipped;
    cycle.completed_at = Some(now);
    cycle.skip_reason = Some(reason.to_string());
    tx.put_cycle(&cycle)?;

    info!(cycle = %cycle.id, recipient = ?cycle.recipient, reason, "cycle skipped");
    Ok(cycle)
}

impl<S: Store, N: Notifier> Tontine<S, N> {
    /// Start the rotation before the group is full. Admin only; needs at
    /// least two active members.
    pub fn start_rotation(
        &self,
        group: &GroupId,
        acting: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Cycle> {
        let policy = self.config().activation;
        self.mutate("start_rotation", |tx, outbox| {
            let mut group = tx.require_group(group)?;
            registry::require_admin(tx, &group.id, acting)?;

            if !tx.cycles(&group.id)?.is_empty() {
                return Err(Error::transition("rotation", "not started", "started"));
            }
            let active = tx.members(&group.id)?.iter().filter(|m| m.is_active()).count();
            if active < MIN_MEMBERS as usize {
                return Err(Error::InvalidInput(format!(
                    "a rotation needs at least {MIN_MEMBERS} active members, group has {active}"
                )));
            }

            let first = begin(tx, outbox, &group, policy, now)?;
            tx.save_group(&mut group, now)?;
            Ok(first)
        })
    }

    /// Materialize the next rotation slot explicitly.
    ///
    /// Fails with `InvalidTransition` while a cycle is still scheduled or
    /// active, and with `RotationExhausted` once nobody is left waiting.
    pub fn advance(&self, group: &GroupId, now: DateTime<Utc>) -> Result<Cycle> {
        let policy = self.config().activation;
        self.mutate("advance", |tx, outbox| {
            let mut group = tx.require_group(group)?;
            let cycles = tx.cycles(&group.id)?;
            if cycles.is_empty() {
                return Err(Error::transition("rotation", "started", "not started"));
            }
            if let Some(open) = cycles.iter().find(|c| !c.status.is_resolved()) {
                return Err(Error::transition("cycle", "completed or skipped", open.status));
            }

            let next = plan_next(tx, &group, &cycles, now)?.ok_or(Error::RotationExhausted)?;
            tx.put_cycle(&next)?;
            settle(tx, outbox, &group, policy, now)?;
            tx.save_group(&mut group, now)?;
            tx.require_cycle(&next.id)
        })
    }

    /// Skip a scheduled or active cycle without paying anyone. Admin only.
    ///
    /// The group's [`SkipPolicy`] decides whether the recipient loses the
    /// slot or queues again at the tail. Payments already made for the cycle
    /// are kept as they are.
    pub fn skip_cycle(
        &self,
        cycle: &CycleId,
        acting: &UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Cycle> {
        let policy = self.config().activation;
        self.mutate("skip_cycle", |tx, outbox| {
            let mut group = tx.require_group(&cycle.group)?;
            registry::require_admin(tx, &group.id, acting)?;

            let skipped = skip(tx, cycle, reason, now)?;
            settle(tx, outbox, &group, policy, now)?;
            tx.save_group(&mut group, now)?;
            Ok(skipped)
        })
    }

    /// Every cycle of the group in rotation order.
    pub fn cycles(&self, group: &GroupId) -> Result<Vec<Cycle>> {
        self.read(|tx| {
            tx.require_group(group)?;
            tx.cycles(group)
        })
    }

    pub fn cycle(&self, id: &CycleId) -> Result<Cycle> {
        self.read(|tx| tx.require_cycle(id))
    }

    /// Recipients of the non-skipped cycles, followed by the projected
    /// order of the active members still waiting for a slot.
    pub fn payout_order(&self, group: &GroupId) -> Result<Vec<UserId>> {
        self.read(|tx| {
            let group = tx.require_group(group)?;
            let cycles = tx.cycles(&group.id)?;
            let members = tx.members(&group.id)?;

            let mut order: Vec<UserId> = cycles
                .iter()
                .filter(|c| c.status != CycleStatus::Skipped)
                .filter_map(|c| c.recipient.clone())
                .collect();
            order.extend(waiting_order(&group, &members, &cycles));
            order.truncate(group.max_members as usize);
            Ok(order)
        })
    }

    /// Recipient of the active cycle, if one is running.
    pub fn current_recipient(&self, group: &GroupId) -> Result<Option<UserId>> {
        self.read(|tx| {
            tx.require_group(group)?;
            Ok(tx
                .cycles(group)?
                .into_iter()
                .find(|c| c.status == CycleStatus::Active)
                .and_then(|c| c.recipient))
        })
    }
}
