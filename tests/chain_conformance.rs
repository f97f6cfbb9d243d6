//! End-to-end conformance for the settlement state machine and chaining.
//!
//! Covers the single-settlement, async-delivery, and FIFO guarantees across
//! the public surface, including pass-through propagation through links that
//! do not handle an outcome.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use deferral::{Realm, Reason, State, Step, View};

fn slot<T>() -> Arc<Mutex<Option<T>>> {
    Arc::new(Mutex::new(None))
}

fn record<T: Send + Clone + 'static>(view: &View<T>, into: &Arc<Mutex<Option<T>>>) {
    let into = Arc::clone(into);
    let _tail = view.then(move |value| {
        *into.lock().expect("slot lock") = Some(value);
        Step::Value(())
    });
}

#[test]
fn producer_settles_consumer_observes() {
    let realm = Realm::new();
    let cell = realm.resolver::<i32>();
    let seen = slot();
    record(&cell.view(), &seen);

    cell.fulfill(123);
    assert_eq!(*seen.lock().expect("slot lock"), None);
    realm.run_until_idle();
    assert_eq!(*seen.lock().expect("slot lock"), Some(123));
}

#[test]
fn settlement_is_first_call_wins_across_kinds() {
    let realm = Realm::new();

    let cell = realm.resolver::<i32>();
    cell.reject(Reason::msg("decided"));
    cell.fulfill(1);
    cell.fulfill(2);
    cell.reject(Reason::msg("again"));

    assert_eq!(cell.state(), State::Rejected);
    assert_eq!(cell.reason().expect("reason").message(), Some("decided"));
}

#[test]
fn continuations_registered_after_settlement_still_run_async() {
    let realm = Realm::new();
    let view = realm.resolved(7_i32);
    realm.run_until_idle();

    let seen = slot();
    record(&view, &seen);

    // Nothing may run inside `then` itself.
    assert_eq!(*seen.lock().expect("slot lock"), None);
    realm.run_until_idle();
    assert_eq!(*seen.lock().expect("slot lock"), Some(7));
}

#[test]
fn many_consumers_fan_out_in_registration_order() {
    let realm = Realm::new();
    let cell = realm.resolver::<i32>();
    let view = cell.view();
    let order = Arc::new(Mutex::new(Vec::new()));

    for label in 1..=4 {
        let order = Arc::clone(&order);
        let _tail = view.then(move |value| {
            order.lock().expect("order lock").push((label, value));
            Step::Value(())
        });
    }

    cell.fulfill(9);
    realm.run_until_idle();
    assert_eq!(
        *order.lock().expect("order lock"),
        vec![(1, 9), (2, 9), (3, 9), (4, 9)]
    );
}

#[test]
fn failure_handler_skipped_on_fulfillment() {
    let realm = Realm::new();
    let cell = realm.resolver::<i32>();
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = slot();

    let counter = Arc::clone(&failures);
    let into = Arc::clone(&seen);
    let _tail = cell.view().then_else(
        move |value| {
            *into.lock().expect("slot lock") = Some(value);
            Step::Value(())
        },
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Step::Value(())
        },
    );

    cell.fulfill(5);
    realm.run_until_idle();
    assert_eq!(*seen.lock().expect("slot lock"), Some(5));
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[test]
fn catch_observes_rejection_through_unhandled_links() {
    let realm = Realm::new();
    let cell = realm.resolver::<i32>();
    let caught = slot();

    let into = Arc::clone(&caught);
    let _tail = cell
        .view()
        .then(|n| Step::Value(n + 1))
        .then(|n| Step::Value(n + 1))
        .catch(move |reason| {
            *into.lock().expect("slot lock") = reason.message().map(str::to_owned);
            Step::Value(0)
        });

    cell.reject(Reason::msg("error"));
    realm.run_until_idle();
    assert_eq!(
        *caught.lock().expect("slot lock"),
        Some(String::from("error"))
    );
}

#[test]
fn catch_returning_a_view_adopts_it() {
    let realm = Realm::new();
    let recovery = realm.resolver::<i64>();
    let failing = realm.rejected::<i64>(Reason::msg("transient"));
    let seen = slot();

    let adopted = recovery.view();
    let recovered = failing.catch(move |_| Step::Pending(adopted));
    record(&recovered, &seen);

    realm.run_until_idle();
    assert_eq!(*seen.lock().expect("slot lock"), None);

    recovery.fulfill(1234);
    realm.run_until_idle();
    assert_eq!(*seen.lock().expect("slot lock"), Some(1234));
}

#[test]
fn produce_hands_the_resolver_to_the_builder() {
    let realm = Realm::new();
    let seen = slot();

    let view = realm.produce::<&'static str>(|cell| {
        cell.fulfill("built");
    });
    record(&view, &seen);

    realm.run_until_idle();
    assert_eq!(*seen.lock().expect("slot lock"), Some("built"));
}

#[test]
fn long_chain_delivers_depth_first() {
    let realm = Realm::new();
    let cell = realm.resolver::<u64>();
    let seen = slot();

    let mut link = cell.view();
    for _ in 0..16 {
        link = link.then(|n| Step::Value(n + 1));
    }
    record(&link, &seen);

    cell.fulfill(0);
    realm.run_until_idle();
    assert_eq!(*seen.lock().expect("slot lock"), Some(16));
}

#[test]
fn duplicate_settlement_does_not_redeliver() {
    let realm = Realm::new();
    let cell = realm.resolver::<i32>();
    let deliveries = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&deliveries);
    let _tail = cell.view().then(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Step::Value(())
    });

    cell.fulfill(1);
    realm.run_until_idle();
    cell.fulfill(2);
    cell.reject(Reason::msg("late"));
    realm.run_until_idle();

    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
}
