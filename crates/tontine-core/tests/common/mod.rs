#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tontine_core::{
    Event, Group, MemberId, MemoryStore, NewGroup, Notifier, Recipient, Role, Store, Tontine,
    TontineConfig, UserId,
};

/// Keeps every delivered notification for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Event, Vec<Recipient>)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(Event, Vec<Recipient>)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|(e, _)| pred(e)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &Event, recipients: &[Recipient]) {
        self.events
            .lock()
            .unwrap()
            .push((event.clone(), recipients.to_vec()));
    }
}

pub type Service<S = MemoryStore> = Tontine<S, Arc<RecordingNotifier>>;

pub fn service(config: TontineConfig) -> (Service, Arc<RecordingNotifier>) {
    service_on(MemoryStore::new(), config)
}

pub fn service_on<S: Store>(store: S, config: TontineConfig) -> (Service<S>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let svc = Tontine::with_notifier(store, notifier.clone(), config);
    (svc, notifier)
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

pub fn user(id: &str) -> UserId {
    UserId::new(id)
}

/// A group founded by `founder` whose other members join and are confirmed
/// one second apart, in the order given.
pub fn group_with<S: Store, N: Notifier>(
    svc: &Tontine<S, N>,
    max_members: u32,
    amount: i64,
    founder: &str,
    others: &[&str],
) -> Group {
    let group = svc
        .create_group(
            NewGroup::new("Circle", Decimal::from(amount), max_members),
            user(founder),
            t0(),
        )
        .unwrap();

    for (i, name) in others.iter().enumerate() {
        let at = t0() + chrono::Duration::seconds(i as i64 + 1);
        svc.add_member(&group.id, &user(name), Role::Member, at).unwrap();
        svc.activate_member(&MemberId::new(group.id.clone(), user(name)), &user(founder), at)
            .unwrap();
    }
    group
}
