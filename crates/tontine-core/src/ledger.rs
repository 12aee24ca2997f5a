//! Contribution Ledger.
//!
//! One [`Payment`] row per contributor per active cycle. A cycle is funded
//! when every one of its payment rows is paid; funding completes the cycle
//! and lets the scheduler move on.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{CycleId, CycleStatus, GroupId, Payment, PaymentStatus, Pot, UserId};
use crate::notify::{Event, Notifier, Outbox, Recipient};
use crate::scheduler;
use crate::service::{Sweep, Tontine};
use crate::store::{Store, Tx};

/// `round(100 * completed / max_members)` with halves rounded up, clamped
/// to `[0, 100]`. Integer arithmetic only.
pub fn progress_percent(completed: usize, max_members: u32) -> u8 {
    if max_members == 0 {
        return 0;
    }
    let m = u64::from(max_members);
    let k = (completed as u64).min(m);
    ((200 * k + m) / (2 * m)) as u8
}

/// Every payment row is paid. A cycle without rows has nobody paying into
/// it and is never funded.
pub(crate) fn is_funded(tx: &mut Tx<'_>, cycle: &CycleId) -> Result<bool> {
    let payments = tx.payments(cycle)?;
    Ok(!payments.is_empty() && payments.iter().all(|p| p.status == PaymentStatus::Paid))
}

/// Active → completed. Fails if another writer already closed the cycle.
pub(crate) fn complete_cycle(
    tx: &mut Tx<'_>,
    outbox: &mut Outbox,
    id: &CycleId,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut cycle = tx.require_cycle(id)?;
    if cycle.status != CycleStatus::Active {
        return Err(Error::transition("cycle", "active", cycle.status));
    }
    cycle.status = CycleStatus::Completed;
    cycle.completed_at = Some(now);
    tx.put_cycle(&cycle)?;

    let pot = Pot::of(&tx.payments(id)?);
    let everyone: Vec<Recipient> = tx
        .members(&id.group)?
        .into_iter()
        .filter(|m| m.is_active())
        .map(|m| Recipient::User(m.user_id))
        .collect();
    outbox.push(
        Event::CycleCompleted {
            cycle: id.clone(),
            recipient: cycle.recipient.clone(),
            pot: pot.collected,
        },
        everyone,
    );

    info!(cycle = %id, recipient = ?cycle.recipient, pot = %pot.collected, "cycle completed");
    Ok(())
}

impl<S: Store, N: Notifier> Tontine<S, N> {
    /// Record a contribution.
    ///
    /// Retrying with the same `paid_at` after success is a no-op. Once the
    /// last outstanding payment lands, the cycle completes and the next one
    /// is materialized in the same transaction.
    pub fn record_payment(
        &self,
        cycle: &CycleId,
        member: &UserId,
        paid_at: DateTime<Utc>,
    ) -> Result<Payment> {
        let policy = self.config().activation;
        self.mutate("record_payment", |tx, outbox| {
            let mut group = tx.require_group(&cycle.group)?;
            let current = tx.require_cycle(cycle)?;
            let mut payment = tx.payment(cycle, member)?.ok_or_else(|| Error::NotExpected {
                cycle: cycle.clone(),
                member: member.clone(),
            })?;

            let retried = payment.paid_at == Some(paid_at);
            match payment.status {
                PaymentStatus::Paid if retried => return Ok(payment),
                PaymentStatus::Paid => {
                    return Err(Error::AlreadyPaid {
                        cycle: cycle.clone(),
                        member: member.clone(),
                    })
                }
                _ if current.status != CycleStatus::Active => {
                    return Err(Error::transition("cycle", "active", current.status))
                }
                _ => {}
            }

            payment.status = PaymentStatus::Paid;
            payment.paid_at = Some(paid_at);
            payment.updated_at = paid_at;
            tx.put_payment(&payment)?;

            let mut notify = vec![Recipient::User(member.clone())];
            if let Some(recipient) = &current.recipient {
                notify.push(Recipient::User(recipient.clone()));
            }
            outbox.push(
                Event::PaymentReceived {
                    cycle: cycle.clone(),
                    from: member.clone(),
                    amount: payment.amount,
                },
                notify,
            );

            scheduler::settle(tx, outbox, &group, policy, paid_at)?;
            tx.save_group(&mut group, paid_at)?;
            Ok(payment)
        })
    }

    /// Flag pending payments of active cycles whose due date plus `grace`
    /// has passed, and send each debtor a reminder. Returns how many
    /// payments turned late.
    pub fn mark_late(&self, now: DateTime<Utc>, grace: Duration) -> Result<usize> {
        Ok(self.sweep_late_payments(now, grace)?.changed)
    }

    pub(crate) fn sweep_late_payments(&self, now: DateTime<Utc>, grace: Duration) -> Result<Sweep> {
        self.sweep("mark_late", |tx, outbox, mut group| {
            let mut flagged = 0;
            for cycle in tx.cycles(&group.id)? {
                if cycle.status != CycleStatus::Active {
                    continue;
                }
                for mut payment in tx.payments(&cycle.id)? {
                    if !payment.is_overdue(now, grace) {
                        continue;
                    }
                    payment.status = PaymentStatus::Late;
                    payment.updated_at = now;
                    tx.put_payment(&payment)?;
                    outbox.push(
                        Event::PaymentDue {
                            cycle: cycle.id.clone(),
                            amount: payment.amount,
                            due_at: payment.due_at,
                            overdue: true,
                        },
                        vec![Recipient::User(payment.member.clone())],
                    );
                    flagged += 1;
                }
            }
            if flagged > 0 {
                tx.save_group(&mut group, now)?;
                info!(group = %group.id, flagged, "payments marked late");
            }
            Ok(flagged)
        })
    }

    /// True once every payment row of an activated cycle is paid. A cycle
    /// that never ran is not funded.
    pub fn is_cycle_funded(&self, cycle: &CycleId) -> Result<bool> {
        self.read(|tx| {
            let current = tx.require_cycle(cycle)?;
            if current.activated_at.is_none() {
                return Ok(false);
            }
            is_funded(tx, cycle)
        })
    }

    /// Completed cycles as a whole percentage of `max_members`.
    pub fn progress(&self, group: &GroupId) -> Result<u8> {
        self.read(|tx| {
            let group = tx.require_group(group)?;
            let completed = tx
                .cycles(&group.id)?
                .iter()
                .filter(|c| c.status == CycleStatus::Completed)
                .count();
            Ok(progress_percent(completed, group.max_members))
        })
    }

    pub fn payments(&self, cycle: &CycleId) -> Result<Vec<Payment>> {
        self.read(|tx| {
            tx.require_cycle(cycle)?;
            tx.payments(cycle)
        })
    }

    /// Expected and collected totals of one cycle.
    pub fn pot(&self, cycle: &CycleId) -> Result<Pot> {
        self.read(|tx| {
            tx.require_cycle(cycle)?;
            Ok(Pot::of(&tx.payments(cycle)?))
        })
    }
}
