//! End-to-end conformance for the capture toggle, the instrumentation bus,
//! and context propagation around deferred continuations.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use deferral::{
    BusEvent, BusEventKind, CallbackPanic, ContextScheduler, MemoryBus, Propagate, Realm, Reason,
    Step,
};

#[test]
fn captured_panic_becomes_downstream_rejection() {
    let realm = Realm::new();
    let cell = realm.resolver::<i32>();
    let caught = Arc::new(Mutex::new(None));

    let into = Arc::clone(&caught);
    let _tail = cell
        .view()
        .then(|_| -> Step<i32> { panic!("kaboom") })
        .then(|_| {
            unreachable!("fulfillment path after a panicking continuation");
        })
        .catch(move |reason| {
            let message = reason
                .downcast_ref::<CallbackPanic>()
                .map(|p| p.message().to_owned());
            *into.lock().expect("caught lock") = message;
            Step::Value(0)
        });

    cell.fulfill(1);
    realm.run_until_idle();
    assert_eq!(
        *caught.lock().expect("caught lock"),
        Some(String::from("kaboom"))
    );
}

#[test]
fn disabled_capture_lets_the_panic_escape_the_task() {
    let realm = Realm::new();
    realm.set_exception_capture(false);

    let cell = realm.resolver::<i32>();
    let _chained = cell.view().then(|_| -> Step<i32> { panic!("escape hatch") });

    cell.fulfill(1);
    let escaped = panic::catch_unwind(AssertUnwindSafe(|| realm.run_until_idle()));
    assert!(escaped.is_err());
}

#[test]
fn toggle_only_affects_catching_not_transitions() {
    let realm = Realm::new();
    realm.set_exception_capture(false);

    let cell = realm.resolver::<i32>();
    let seen = Arc::new(Mutex::new(None));

    let into = Arc::clone(&seen);
    let _tail = cell.view().then(move |n| {
        *into.lock().expect("seen lock") = Some(n);
        Step::Value(())
    });

    cell.fulfill(6);
    realm.run_until_idle();
    // Non-panicking flows are untouched by the toggle.
    assert_eq!(*seen.lock().expect("seen lock"), Some(6));
}

#[test]
fn instrumentation_sees_resolve_reject_and_exception() {
    let realm = Realm::new();
    let bus = Arc::new(MemoryBus::new());
    realm.enable_instrumentation(bus.clone());

    // resolve
    let fulfilled = realm.resolver::<i32>();
    fulfilled.fulfill(123);

    // reject
    let rejected = realm.resolver::<i32>();
    rejected.reject(Reason::msg("observed failure"));

    // exception: a panicking continuation (also rejects its downstream cell)
    let panicking = realm.resolver::<i32>();
    let _chained = panicking.view().then(|_| -> Step<i32> { panic!("traced") });
    panicking.fulfill(0);
    realm.run_until_idle();

    let events = bus.take();
    let kinds: Vec<BusEventKind> = events.iter().map(BusEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            BusEventKind::Resolve,
            BusEventKind::Reject,
            BusEventKind::Resolve,
            BusEventKind::Exception,
            BusEventKind::Reject,
        ]
    );

    match &events[0] {
        BusEvent::Resolve(payload) => {
            assert_eq!(payload.downcast_ref::<i32>(), Some(&123));
        }
        other => panic!("unexpected event {other:?}"),
    }
    match &events[3] {
        BusEvent::Exception(reason) => {
            let panic = reason.downcast_ref::<CallbackPanic>().expect("panic payload");
            assert_eq!(panic.message(), "traced");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn instrumentation_is_silent_until_enabled() {
    let realm = Realm::new();
    let bus = Arc::new(MemoryBus::new());

    realm.resolver::<i32>().fulfill(1);
    realm.run_until_idle();
    assert!(bus.is_empty());

    realm.enable_instrumentation(bus.clone());
    realm.resolver::<i32>().fulfill(2);
    realm.run_until_idle();
    assert_eq!(bus.kinds(), vec![BusEventKind::Resolve]);
}

thread_local! {
    static REQUEST_ID: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
}

struct RequestContext;

impl Propagate for RequestContext {
    type Token = u64;

    fn capture(&self) -> u64 {
        REQUEST_ID.get()
    }

    fn restore(&self, token: u64) {
        REQUEST_ID.set(token);
    }
}

#[test]
fn context_travels_with_each_continuation() {
    let realm = Realm::new();
    realm.set_scheduler(Arc::new(ContextScheduler::new(
        realm.queue(),
        Arc::new(RequestContext),
    )));

    let seen = Arc::new(Mutex::new(Vec::new()));

    // Two logically independent request flows share one realm.
    REQUEST_ID.set(41);
    let first = realm.resolver::<&'static str>();
    let observed = Arc::clone(&seen);
    let _tail = first.view().then(move |label| {
        observed.lock().expect("seen lock").push((label, REQUEST_ID.get()));
        Step::Value(())
    });
    first.fulfill("first");

    REQUEST_ID.set(42);
    let second = realm.resolver::<&'static str>();
    let observed = Arc::clone(&seen);
    let _tail = second.view().then(move |label| {
        observed.lock().expect("seen lock").push((label, REQUEST_ID.get()));
        Step::Value(())
    });
    second.fulfill("second");

    // Ambient state at pump time belongs to neither flow.
    REQUEST_ID.set(0);
    realm.run_until_idle();

    assert_eq!(
        *seen.lock().expect("seen lock"),
        vec![("first", 41), ("second", 42)]
    );
}
