//! Racing writers against one group.

mod common;

use common::{group_with, service, t0, user, Service};
use std::sync::{Arc, Barrier};
use std::thread;
use tontine_core::{CycleId, CycleStatus, Error, Role, Store, TontineConfig};

/// Two users race for the last seat of a two-member group.
fn race_for_last_seat<S: Store + 'static>(svc: Service<S>) {
    let svc = Arc::new(svc);
    let g = group_with(&*svc, 2, 10, "m1", &[]);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["m2", "m3"]
        .into_iter()
        .map(|name| {
            let svc = Arc::clone(&svc);
            let barrier = Arc::clone(&barrier);
            let group = g.id.clone();
            thread::spawn(move || {
                barrier.wait();
                svc.add_member(&group, &user(name), Role::Member, t0())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let won = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(Error::GroupFull { .. })))
        .count();
    assert_eq!((won, full), (1, 1));
    assert_eq!(svc.members(&g.id).unwrap().len(), 2);
}

/// Both contributors pay twice at once; the cycle closes exactly once.
fn race_final_payments<S: Store + 'static>(svc: Service<S>) {
    let svc = Arc::new(svc);
    let g = group_with(&*svc, 3, 10, "m1", &["m2", "m3"]);
    let c1 = CycleId::new(g.id.clone(), 1);
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = ["m2", "m3", "m2", "m3"]
        .into_iter()
        .map(|name| {
            let svc = Arc::clone(&svc);
            let barrier = Arc::clone(&barrier);
            let cycle = c1.clone();
            thread::spawn(move || {
                barrier.wait();
                svc.record_payment(&cycle, &user(name), t0())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let cycles = svc.cycles(&g.id).unwrap();
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[0].status, CycleStatus::Completed);
    assert_eq!(cycles[1].status, CycleStatus::Active);
    assert_eq!(cycles[1].recipient, Some(user("m2")));
}

#[test]
fn scenario_c_concurrent_adds_one_wins() {
    for _ in 0..20 {
        race_for_last_seat(service(TontineConfig::default()).0);
    }
}

#[test]
fn concurrent_final_payments_close_the_cycle_once() {
    for _ in 0..20 {
        race_final_payments(service(TontineConfig::default()).0);
    }
}

#[cfg(feature = "rocksdb")]
mod rocks {
    use super::*;
    use crate::common::service_on;
    use tempfile::tempdir;
    use tontine_core::RocksStore;

    #[test]
    fn scenario_c_concurrent_adds_one_wins() {
        for _ in 0..20 {
            let dir = tempdir().unwrap();
            let store = RocksStore::open(dir.path()).unwrap();
            race_for_last_seat(service_on(store, TontineConfig::default()).0);
        }
    }

    #[test]
    fn concurrent_final_payments_close_the_cycle_once() {
        for _ in 0..20 {
            let dir = tempdir().unwrap();
            let store = RocksStore::open(dir.path()).unwrap();
            race_final_payments(service_on(store, TontineConfig::default()).0);
        }
    }
}
