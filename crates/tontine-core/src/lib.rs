//! Tontine Core - Rotation Scheduling and Contribution Ledger
//!
//! The bookkeeping behind a rotating savings group: members pay a fixed
//! amount every cycle and each cycle's pot goes to one member, rotating
//! until everyone has been paid once.
//!
//! # Architecture
//!
//! - **Registry**: memberships, roles and the seat limit
//! - **Invitations**: pending offers to join, by email or phone
//! - **Scheduler**: payout order and lazy cycle materialization
//! - **Ledger**: payments per cycle, funding and completion
//! - **Aggregator**: read-only summaries for dashboards
//! - **Store**: transactional key-value persistence (memory or RocksDB)
//!
//! Every operation is a method on [`Tontine`] and runs as one store
//! transaction. Time never advances on its own: callers pass `now` and drive
//! the time-based transitions with [`Tontine::tick`].
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use rust_decimal::Decimal;
//! use tontine_core::{MemoryStore, MemberId, NewGroup, Role, Tontine, TontineConfig, UserId};
//!
//! # fn main() -> tontine_core::Result<()> {
//! let tontine = Tontine::new(MemoryStore::new(), TontineConfig::default());
//! let now = Utc::now();
//!
//! let ada = UserId::new("ada");
//! let group = tontine.create_group(NewGroup::new("Family", Decimal::from(100), 2), ada.clone(), now)?;
//!
//! let bo = UserId::new("bo");
//! tontine.add_member(&group.id, &bo, Role::Member, now)?;
//! tontine.activate_member(&MemberId::new(group.id.clone(), bo), &ada, now)?;
//!
//! // The group is full, so the first payout is running.
//! assert_eq!(tontine.current_recipient(&group.id)?, Some(ada));
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod identity;
pub mod invitations;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod store;

pub use aggregator::{GroupSummary, Membership, RosterEntry};
pub use config::{ActivationPolicy, TontineConfig};
pub use error::{Error, Result};
pub use identity::{Directory, Profile, StaticDirectory};
pub use ledger::progress_percent;
pub use models::{
    Cycle, CycleId, CycleStatus, Frequency, Group, GroupId, GroupPatch, Invitation, InvitationId,
    InvitationStatus, InviteTarget, Member, MemberId, MemberStatus, NewGroup, Payment,
    PaymentStatus, Pot, Resolution, Role, RotationOrder, RotationPolicy, SkipPolicy, UserId,
};
pub use notify::{Event, Notifier, NullNotifier, Recipient, TracingNotifier};
pub use service::{TickReport, Tontine};
pub use store::{MemoryStore, Store};
#[cfg(feature = "rocksdb")]
pub use store::RocksStore;
