//! Persistence boundary.
//!
//! A [`Store`] runs a closure inside one atomic transaction. The closure sees
//! a [`Tx`], which maps the domain models onto prefixed string keys with JSON
//! values:
//!
//! ```text
//! group:{group}
//! member:{group}:{user}
//! invite:{group}:{token}
//! cycle:{group}:{ordinal:06}
//! payment:{group}:{ordinal:06}:{user}
//! user-group:{user}:{group}
//! ```
//!
//! Zero-padded ordinals keep cycles and payments in rotation order under a
//! prefix scan. Transactions that mutate a group always rewrite its
//! `group:` row, so two writers on the same group conflict and serialize.

mod memory;
#[cfg(feature = "rocksdb")]
mod rocks;

pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{
    Cycle, CycleId, Group, GroupId, Invitation, InvitationId, Member, MemberId, Payment, UserId,
};

/// Raw key-value operations available inside a transaction.
pub trait Txn {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;

    fn delete(&mut self, key: &str) -> Result<()>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan(&mut self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Transactional storage backend.
pub trait Store: Send + Sync {
    /// Run `f` atomically. If `f` fails nothing is written. Backends with
    /// optimistic concurrency may call `f` more than once.
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnMut(&mut Tx<'_>) -> Result<T>;
}

/// Typed view over a [`Txn`].
pub struct Tx<'t> {
    txn: &'t mut dyn Txn,
}

impl<'t> Tx<'t> {
    pub fn new(txn: &'t mut dyn Txn) -> Self {
        Self { txn }
    }

    fn read<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.txn.get(key)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        self.txn.put(key, &data)
    }

    fn scan_as<T: DeserializeOwned>(&mut self, prefix: &str) -> Result<Vec<T>> {
        self.txn
            .scan(prefix)?
            .iter()
            .map(|(_, data)| serde_json::from_slice(data).map_err(Error::from))
            .collect()
    }

    // --- Groups ---

    pub(crate) fn group(&mut self, id: &GroupId) -> Result<Option<Group>> {
        self.read(&format!("group:{id}"))
    }

    pub(crate) fn require_group(&mut self, id: &GroupId) -> Result<Group> {
        self.group(id)?
            .ok_or_else(|| Error::NotFound(format!("group {id}")))
    }

    /// Write the group row with a bumped revision.
    pub(crate) fn save_group(&mut self, group: &mut Group, now: DateTime<Utc>) -> Result<()> {
        group.revision += 1;
        group.updated_at = now;
        self.write(&format!("group:{}", group.id), group)
    }

    pub(crate) fn groups(&mut self) -> Result<Vec<Group>> {
        self.scan_as("group:")
    }

    // --- Members ---

    pub(crate) fn member(&mut self, id: &MemberId) -> Result<Option<Member>> {
        self.read(&format!("member:{}:{}", id.group, id.user))
    }

    pub(crate) fn require_member(&mut self, id: &MemberId) -> Result<Member> {
        self.member(id)?
            .ok_or_else(|| Error::NotFound(format!("member {id}")))
    }

    /// Write a member row and keep the per-user group index in step.
    pub(crate) fn put_member(&mut self, member: &Member) -> Result<()> {
        self.write(
            &format!("member:{}:{}", member.group_id, member.user_id),
            member,
        )?;
        self.txn.put(
            &format!("user-group:{}:{}", member.user_id, member.group_id),
            b"",
        )
    }

    pub(crate) fn members(&mut self, group: &GroupId) -> Result<Vec<Member>> {
        self.scan_as(&format!("member:{group}:"))
    }

    /// Groups the user has a membership row in, any status.
    pub(crate) fn user_groups(&mut self, user: &UserId) -> Result<Vec<GroupId>> {
        let prefix = format!("user-group:{user}:");
        Ok(self
            .txn
            .scan(&prefix)?
            .into_iter()
            .filter_map(|(key, _)| key.strip_prefix(&prefix).map(GroupId::new))
            .collect())
    }

    // --- Invitations ---

    pub(crate) fn invitation(&mut self, id: &InvitationId) -> Result<Option<Invitation>> {
        self.read(&format!("invite:{}:{}", id.group, id.token))
    }

    pub(crate) fn require_invitation(&mut self, id: &InvitationId) -> Result<Invitation> {
        self.invitation(id)?
            .ok_or_else(|| Error::NotFound(format!("invitation {id}")))
    }

    pub(crate) fn put_invitation(&mut self, invitation: &Invitation) -> Result<()> {
        let id = &invitation.id;
        self.write(&format!("invite:{}:{}", id.group, id.token), invitation)
    }

    pub(crate) fn invitations(&mut self, group: &GroupId) -> Result<Vec<Invitation>> {
        self.scan_as(&format!("invite:{group}:"))
    }

    // --- Cycles ---

    pub(crate) fn cycle(&mut self, id: &CycleId) -> Result<Option<Cycle>> {
        self.read(&cycle_key(id))
    }

    pub(crate) fn require_cycle(&mut self, id: &CycleId) -> Result<Cycle> {
        self.cycle(id)?
            .ok_or_else(|| Error::NotFound(format!("cycle {id}")))
    }

    pub(crate) fn put_cycle(&mut self, cycle: &Cycle) -> Result<()> {
        self.write(&cycle_key(&cycle.id), cycle)
    }

    /// Cycles of a group in ordinal order.
    pub(crate) fn cycles(&mut self, group: &GroupId) -> Result<Vec<Cycle>> {
        self.scan_as(&format!("cycle:{group}:"))
    }

    // --- Payments ---

    pub(crate) fn payment(&mut self, cycle: &CycleId, member: &UserId) -> Result<Option<Payment>> {
        self.read(&payment_key(cycle, member))
    }

    pub(crate) fn put_payment(&mut self, payment: &Payment) -> Result<()> {
        self.write(&payment_key(&payment.cycle, &payment.member), payment)
    }

    pub(crate) fn payments(&mut self, cycle: &CycleId) -> Result<Vec<Payment>> {
        self.scan_as(&format!("payment:{}:{:06}:", cycle.group, cycle.ordinal))
    }
}

fn cycle_key(id: &CycleId) -> String {
    format!("cycle:{}:{:06}", id.group, id.ordinal)
}

fn payment_key(cycle: &CycleId, member: &UserId) -> String {
    format!("payment:{}:{:06}:{}", cycle.group, cycle.ordinal, member)
}
