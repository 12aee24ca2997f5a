//! Invitation Tracker.
//!
//! Invitations are addressed to an email address and/or a phone number and
//! exist before the invitee has an account. Only pending invitations change;
//! accepted, declined and expired ones are final.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{
    GroupId, Invitation, InvitationId, InvitationStatus, InviteTarget, MemberId, Resolution, Role,
    UserId,
};
use crate::notify::{Event, Notifier, Recipient};
use crate::registry;
use crate::service::{Sweep, Tontine};
use crate::store::Store;

impl<S: Store, N: Notifier> Tontine<S, N> {
    /// Invite someone by email and/or phone. Any active member may invite
    /// while the group still has a free seat.
    pub fn create_invitation(
        &self,
        group: &GroupId,
        target: InviteTarget,
        invited_by: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Invitation> {
        self.mutate("create_invitation", |tx, outbox| {
            let mut group = tx.require_group(group)?;

            let inviter = tx.member(&MemberId::new(group.id.clone(), invited_by.clone()))?;
            if !inviter.as_ref().is_some_and(|m| m.is_active()) {
                return Err(Error::Forbidden(format!(
                    "{invited_by} is not an active member of group {}",
                    group.id
                )));
            }

            let target = target.clone().normalized()?;
            let taken = tx
                .members(&group.id)?
                .iter()
                .filter(|m| m.status.holds_seat())
                .count();
            if taken >= group.max_members as usize {
                return Err(Error::GroupFull {
                    max_members: group.max_members,
                });
            }

            let invitation = Invitation::new(group.id.clone(), target, invited_by.clone(), now);
            tx.put_invitation(&invitation)?;
            tx.save_group(&mut group, now)?;

            let mut reach = Vec::new();
            if let Some(email) = &invitation.email {
                reach.push(Recipient::Email(email.clone()));
            }
            if let Some(phone) = &invitation.phone {
                reach.push(Recipient::Phone(phone.clone()));
            }
            outbox.push(
                Event::InvitationSent {
                    invitation: invitation.id.clone(),
                    invited_by: invited_by.clone(),
                },
                reach,
            );

            Ok(invitation)
        })
    }

    /// Accept or decline a pending invitation.
    ///
    /// Accepting adds the user as a pending member in the same transaction
    /// (active straight away when auto-confirmation is on). If that fails,
    /// for instance because the group filled up meanwhile, the invitation
    /// stays pending. An invitation past its TTL cannot be resolved even if
    /// no tick has expired it yet.
    pub fn resolve_invitation(
        &self,
        id: &InvitationId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> Result<Invitation> {
        let policy = self.config().activation;
        let ttl = self.config().invitation_ttl;
        let auto_confirm = self.config().auto_confirm_invitations;

        self.mutate("resolve_invitation", |tx, outbox| {
            let mut group = tx.require_group(&id.group)?;
            let mut invitation = tx.require_invitation(id)?;

            if invitation.status != InvitationStatus::Pending {
                return Err(Error::transition("invitation", "pending", invitation.status));
            }
            if invitation.is_stale(now, ttl) {
                return Err(Error::transition(
                    "invitation",
                    "pending",
                    InvitationStatus::Expired,
                ));
            }

            match &resolution {
                Resolution::Accept { user } => {
                    let member = registry::admit(tx, &group, user, Role::Member, now)?;
                    if auto_confirm {
                        registry::confirm(tx, outbox, &group, member, policy, now)?;
                    }
                    invitation.status = InvitationStatus::Accepted;
                    invitation.accepted_by = Some(user.clone());
                }
                Resolution::Decline => invitation.status = InvitationStatus::Declined,
            }

            invitation.updated_at = now;
            tx.put_invitation(&invitation)?;
            tx.save_group(&mut group, now)?;

            info!(invitation = %invitation.id, status = %invitation.status, "invitation resolved");
            Ok(invitation)
        })
    }

    /// Expire every pending invitation strictly older than `ttl`. Returns
    /// how many expired; running it again right away returns zero.
    pub fn expire_stale(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize> {
        Ok(self.sweep_stale_invitations(now, ttl)?.changed)
    }

    pub(crate) fn sweep_stale_invitations(
        &self,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Sweep> {
        self.sweep("expire_stale", |tx, _, mut group| {
            let mut expired = 0;
            for mut invitation in tx.invitations(&group.id)? {
                if !invitation.is_stale(now, ttl) {
                    continue;
                }
                invitation.status = InvitationStatus::Expired;
                invitation.updated_at = now;
                tx.put_invitation(&invitation)?;
                expired += 1;
            }
            if expired > 0 {
                tx.save_group(&mut group, now)?;
                info!(group = %group.id, expired, "invitations expired");
            }
            Ok(expired)
        })
    }

    /// Every invitation of the group, any status.
    pub fn invitations(&self, group: &GroupId) -> Result<Vec<Invitation>> {
        self.read(|tx| {
            tx.require_group(group)?;
            tx.invitations(group)
        })
    }
}
