//! Domain models for rotating savings groups.
//!
//! # Core Types
//!
//! - [`Group`] - A savings circle with fixed contribution terms
//! - [`Member`] - A user's membership, role and status in one group
//! - [`Invitation`] - An outstanding offer to join, by email or phone
//! - [`Cycle`] - One rotation slot with one recipient
//! - [`Payment`] - One member's contribution to one cycle
//!
//! # Identifiers
//!
//! - [`GroupId`], [`UserId`] - opaque strings
//! - [`MemberId`], [`CycleId`], [`InvitationId`] - composite, scoped to a group

mod cycle;
mod group;
mod ids;
mod invitation;
mod member;
mod payment;

pub use cycle::{Cycle, CycleStatus};
pub use group::{
    Frequency, Group, GroupPatch, NewGroup, RotationOrder, RotationPolicy, SkipPolicy,
    DEFAULT_CURRENCY, MIN_MEMBERS,
};
pub use ids::{CycleId, GroupId, InvitationId, MemberId, UserId};
pub use invitation::{InviteTarget, Invitation, InvitationStatus, Resolution};
pub use member::{join_order, Member, MemberStatus, Role};
pub use payment::{Payment, PaymentStatus, Pot};

pub(crate) use group::{validate_amount, validate_max_members, validate_name};
