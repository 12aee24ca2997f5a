//! The tontine service: one store, one notifier, one configuration.
//!
//! Operations live in the component modules ([`registry`](crate::registry),
//! [`invitations`](crate::invitations), [`scheduler`](crate::scheduler),
//! [`ledger`](crate::ledger), [`aggregator`](crate::aggregator)) as further
//! `impl` blocks on [`Tontine`]. Each mutating operation is exactly one
//! store transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TontineConfig;
use crate::error::Result;
use crate::models::{Group, GroupId};
use crate::notify::{Notifier, Outbox, TracingNotifier};
use crate::scheduler;
use crate::store::{Store, Tx};

/// Entry point for every tontine operation.
pub struct Tontine<S, N = TracingNotifier> {
    store: S,
    notifier: N,
    config: TontineConfig,
}

impl<S: Store> Tontine<S> {
    /// Service that logs notifications instead of delivering them.
    pub fn new(store: S, config: TontineConfig) -> Self {
        Self::with_notifier(store, TracingNotifier, config)
    }
}

impl<S: Store, N: Notifier> Tontine<S, N> {
    pub fn with_notifier(store: S, notifier: N, config: TontineConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &TontineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Run one mutating operation. Notifications staged by the closure are
    /// delivered only once the transaction has committed; a retried attempt
    /// starts from an empty outbox.
    pub(crate) fn mutate<T, F>(&self, op: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut(&mut Tx<'_>, &mut Outbox) -> Result<T>,
    {
        let mut outbox = Outbox::default();
        let result = self.store.transact(|tx| {
            outbox = Outbox::default();
            f(tx, &mut outbox)
        });

        match result {
            Ok(out) => {
                outbox.deliver(&self.notifier);
                Ok(out)
            }
            Err(e) => {
                debug!(op, error = %e, "operation rejected");
                Err(e)
            }
        }
    }

    /// Run a read-only query.
    pub(crate) fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnMut(&mut Tx<'_>) -> Result<T>,
    {
        self.store.transact(f)
    }

    /// Run `f` over every group, one transaction per group. A group whose
    /// transaction fails is logged and counted; the others still commit.
    pub(crate) fn sweep<F>(&self, op: &'static str, mut f: F) -> Result<Sweep>
    where
        F: FnMut(&mut Tx<'_>, &mut Outbox, Group) -> Result<usize>,
    {
        let ids: Vec<GroupId> =
            self.read(|tx| Ok(tx.groups()?.into_iter().map(|g| g.id).collect()))?;

        let mut sweep = Sweep::default();
        for id in ids {
            let result = self.mutate(op, |tx, outbox| {
                let group = tx.require_group(&id)?;
                f(tx, outbox, group)
            });
            match result {
                Ok(n) => sweep.changed += n,
                Err(e) => {
                    warn!(op, group = %id, error = %e, "group left for the next tick");
                    sweep.failed += 1;
                }
            }
        }
        Ok(sweep)
    }

    /// Run every time-based transition once: expire stale invitations, flag
    /// late payments and activate scheduled cycles whose period has begun.
    ///
    /// Safe to call as often as wanted; a tick with nothing to do changes
    /// nothing. Each group is handled in its own transaction, so one failing
    /// group does not hold back the rest.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let expired = self.sweep_stale_invitations(now, self.config.invitation_ttl)?;
        let late = self.sweep_late_payments(now, self.config.payment_grace)?;
        let activated = self.sweep_due_cycles(now)?;

        let report = TickReport {
            expired_invitations: expired.changed,
            late_payments: late.changed,
            activated_cycles: activated.changed,
            failed_groups: expired.failed + late.failed + activated.failed,
        };

        if !report.is_empty() {
            info!(
                expired = report.expired_invitations,
                late = report.late_payments,
                activated = report.activated_cycles,
                failed = report.failed_groups,
                "tick"
            );
        }
        Ok(report)
    }

    /// Activate scheduled cycles that are due under the configured
    /// activation policy. Returns how many cycles became active.
    pub fn activate_due(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.sweep_due_cycles(now)?.changed)
    }

    fn sweep_due_cycles(&self, now: DateTime<Utc>) -> Result<Sweep> {
        let policy = self.config.activation;
        self.sweep("activate_due", |tx, outbox, mut group| {
            let n = scheduler::settle(tx, outbox, &group, policy, now)?;
            if n.touched() {
                tx.save_group(&mut group, now)?;
            }
            Ok(n.activated)
        })
    }
}

/// Outcome of one sweep over all groups.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Sweep {
    pub changed: usize,
    pub failed: usize,
}

/// What one [`Tontine::tick`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub expired_invitations: usize,
    pub late_payments: usize,
    pub activated_cycles: usize,
    /// Groups whose transaction failed; they are retried on the next tick
    pub failed_groups: usize,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.expired_invitations == 0
            && self.late_payments == 0
            && self.activated_cycles == 0
            && self.failed_groups == 0
    }
}
