//! End-to-end rotation scenarios.

mod common;

use chrono::Duration;
use common::{group_with, service, t0, user};
use rust_decimal::Decimal;
use tontine_core::{
    ActivationPolicy, CycleId, CycleStatus, Error, Event, InvitationStatus, InviteTarget,
    MemberId, MemberStatus, NewGroup, PaymentStatus, Resolution, Role, SkipPolicy,
    TontineConfig,
};

#[test]
fn scenario_a_first_joined_receives_first() {
    let (svc, notes) = service(TontineConfig::default());
    let g = group_with(&svc, 3, 100, "m1", &["m2", "m3"]);

    let cycles = svc.cycles(&g.id).unwrap();
    assert_eq!(cycles.len(), 1);
    let c1 = &cycles[0];
    assert_eq!(c1.id.ordinal, 1);
    assert_eq!(c1.recipient, Some(user("m1")));
    assert_eq!(c1.status, CycleStatus::Active);
    assert_eq!(c1.cycle_month, t0() + chrono::Months::new(1));

    let payments = svc.payments(&c1.id).unwrap();
    let payers: Vec<_> = payments.iter().map(|p| p.member.as_str()).collect();
    assert_eq!(payers, ["m2", "m3"]);
    assert!(payments
        .iter()
        .all(|p| p.amount == Decimal::from(100) && p.status == PaymentStatus::Pending));
    assert!(payments.iter().all(|p| p.due_at == c1.cycle_month));

    assert_eq!(
        notes.count(|e| matches!(e, Event::PaymentDue { overdue: false, .. })),
        2
    );
}

#[test]
fn scenario_b_funding_completes_and_rotates() {
    let (svc, notes) = service(TontineConfig::default());
    let g = group_with(&svc, 3, 100, "m1", &["m2", "m3"]);
    let c1 = CycleId::new(g.id.clone(), 1);
    let now = t0() + Duration::days(20);

    svc.record_payment(&c1, &user("m2"), now).unwrap();
    assert!(!svc.is_cycle_funded(&c1).unwrap());
    svc.record_payment(&c1, &user("m3"), now).unwrap();

    assert!(svc.is_cycle_funded(&c1).unwrap());
    assert_eq!(svc.cycle(&c1).unwrap().status, CycleStatus::Completed);
    assert_eq!(svc.pot(&c1).unwrap().collected, Decimal::from(200));

    let c2 = svc.cycle(&CycleId::new(g.id.clone(), 2)).unwrap();
    assert_eq!(c2.recipient, Some(user("m2")));
    assert_eq!(c2.status, CycleStatus::Active);
    assert_eq!(c2.cycle_month, t0() + chrono::Months::new(2));
    assert_eq!(svc.progress(&g.id).unwrap(), 33);

    let completed = notes.count(|e| matches!(e, Event::CycleCompleted { .. }));
    assert_eq!(completed, 1);
}

#[test]
fn full_rotation_pays_everyone_once() {
    let (svc, _) = service(TontineConfig::default());
    let g = group_with(&svc, 3, 100, "m1", &["m2", "m3"]);
    let now = t0() + Duration::days(1);

    for ordinal in 1..=3 {
        let id = CycleId::new(g.id.clone(), ordinal);
        for payment in svc.payments(&id).unwrap() {
            svc.record_payment(&id, &payment.member, now).unwrap();
        }
        let paid = svc
            .payments(&id)
            .unwrap()
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .count();
        assert_eq!(paid, 2);
    }

    let recipients: Vec<_> = svc
        .cycles(&g.id)
        .unwrap()
        .into_iter()
        .map(|c| c.recipient.unwrap().to_string())
        .collect();
    assert_eq!(recipients, ["m1", "m2", "m3"]);
    assert_eq!(svc.progress(&g.id).unwrap(), 100);
    assert!(matches!(svc.advance(&g.id, now), Err(Error::RotationExhausted)));
    assert!(svc.summary(&g.id).unwrap().finished);
}

#[test]
fn scenario_c_last_seat_goes_once() {
    let (svc, _) = service(TontineConfig::default());
    let g = group_with(&svc, 2, 50, "m1", &[]);

    svc.add_member(&g.id, &user("m2"), Role::Member, t0()).unwrap();
    let err = svc.add_member(&g.id, &user("m3"), Role::Member, t0()).unwrap_err();
    assert!(matches!(err, Error::GroupFull { max_members: 2 }));
}

#[test]
fn scenario_d_stale_invitations_expire_once() {
    let (svc, _) = service(TontineConfig::default());
    let g = group_with(&svc, 4, 50, "m1", &[]);
    let ttl = Duration::days(7);

    let old = svc
        .create_invitation(&g.id, InviteTarget::email("old@example.com"), &user("m1"), t0())
        .unwrap();
    let fresh = svc
        .create_invitation(
            &g.id,
            InviteTarget::phone("+212600000001"),
            &user("m1"),
            t0() + Duration::days(6),
        )
        .unwrap();

    let now = t0() + ttl + Duration::seconds(1);
    assert_eq!(svc.expire_stale(now, ttl).unwrap(), 1);
    assert_eq!(svc.expire_stale(now, ttl).unwrap(), 0);

    for inv in svc.invitations(&g.id).unwrap() {
        let expected = if inv.id == old.id {
            InvitationStatus::Expired
        } else {
            assert_eq!(inv.id, fresh.id);
            InvitationStatus::Pending
        };
        assert_eq!(inv.status, expected);
    }

    let err = svc.resolve_invitation(&old.id, Resolution::Decline, now).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
}

#[test]
fn invitation_sent_reaches_every_channel() {
    let (svc, notes) = service(TontineConfig::default());
    let g = group_with(&svc, 4, 50, "m1", &[]);
    svc.create_invitation(
        &g.id,
        InviteTarget::email("x@example.com").with_phone("+212600000002"),
        &user("m1"),
        t0(),
    )
    .unwrap();

    let sent: Vec<_> = notes
        .events()
        .into_iter()
        .filter(|(e, _)| matches!(e, Event::InvitationSent { .. }))
        .collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.len(), 2);
}

#[test]
fn removed_scheduled_recipient_is_skipped() {
    let config = TontineConfig::default().with_activation(ActivationPolicy::OnSchedule);
    let (svc, _) = service(config);
    let g = svc
        .create_group(
            NewGroup::new("Later", Decimal::from(10), 3).with_skip_policy(SkipPolicy::Forfeit),
            user("m1"),
            t0(),
        )
        .unwrap();
    for name in ["m2", "m3"] {
        svc.add_member(&g.id, &user(name), Role::Member, t0()).unwrap();
        svc.activate_member(&MemberId::new(g.id.clone(), user(name)), &user("m1"), t0())
            .unwrap();
    }

    // Cycle 1 is scheduled for m1; hand over the admin role so m1 can leave.
    svc.transfer_admin(&g.id, &user("m1"), &user("m2"), t0()).unwrap();
    let left = svc
        .remove_member(&MemberId::new(g.id.clone(), user("m1")), &user("m1"), t0())
        .unwrap();
    assert_eq!(left.status, MemberStatus::Left);

    let cycles = svc.cycles(&g.id).unwrap();
    assert_eq!(cycles[0].status, CycleStatus::Skipped);
    assert_eq!(cycles[0].skip_reason.as_deref(), Some("recipient left"));
    assert_eq!(cycles[1].recipient, Some(user("m2")));
    assert_eq!(cycles[1].status, CycleStatus::Scheduled);

    // The tick activates the slot once its period starts.
    let report = svc.tick(cycles[1].cycle_month).unwrap();
    assert_eq!(report.activated_cycles, 1);
    assert_eq!(svc.current_recipient(&g.id).unwrap(), Some(user("m2")));
    assert_eq!(svc.payments(&cycles[1].id).unwrap().len(), 1);
}

#[test]
fn requeued_recipient_is_paid_last() {
    let (svc, _) = service(TontineConfig::default());
    let g = svc
        .create_group(
            NewGroup::new("Requeue", Decimal::from(10), 3).with_skip_policy(SkipPolicy::Requeue),
            user("m1"),
            t0(),
        )
        .unwrap();
    for (i, name) in ["m2", "m3"].iter().enumerate() {
        let at = t0() + Duration::seconds(i as i64 + 1);
        svc.add_member(&g.id, &user(name), Role::Member, at).unwrap();
        svc.activate_member(&MemberId::new(g.id.clone(), user(name)), &user("m1"), at)
            .unwrap();
    }

    let c1 = CycleId::new(g.id.clone(), 1);
    svc.skip_cycle(&c1, &user("m1"), "not ready", t0()).unwrap();

    let order: Vec<_> = svc
        .payout_order(&g.id)
        .unwrap()
        .into_iter()
        .map(|u| u.to_string())
        .collect();
    assert_eq!(order, ["m2", "m3", "m1"]);
}

#[test]
fn tick_flags_late_payments_and_reminds() {
    let (svc, notes) = service(TontineConfig::default());
    let g = group_with(&svc, 2, 30, "m1", &["m2"]);
    let c1 = svc.cycle(&CycleId::new(g.id.clone(), 1)).unwrap();

    let report = svc.tick(c1.cycle_month + Duration::days(3)).unwrap();
    assert_eq!(report.late_payments, 1);
    assert_eq!(
        notes.count(|e| matches!(e, Event::PaymentDue { overdue: true, .. })),
        1
    );

    let again = svc.tick(c1.cycle_month + Duration::days(4)).unwrap();
    assert!(again.is_empty());
}
