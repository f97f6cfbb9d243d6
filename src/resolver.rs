//! The settlement state machine.
//!
//! A [`Resolver`] owns a settlement state, a result slot, and two pending
//! continuation queues (one per outcome kind):
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    RESOLVER LIFECYCLE                        │
//! │                                                              │
//! │              fulfill(v)                                      │
//! │   PENDING ──────────────► FULFILLED ── drain value queue     │
//! │      │                                                       │
//! │      │       reject(r)                                       │
//! │      └──────────────────► REJECTED ─── drain reason queue    │
//! │                                                              │
//! │   (both transitions terminal; later calls are no-ops)        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Settlement is a synchronous, one-time state flip; only the notification
//! of observers is deferred. The drain is a single scheduled task that reads
//! the live queue, so continuations pushed between scheduling and draining
//! are still delivered in registration order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::bus::BusEvent;
use crate::realm::Realm;
use crate::reason::Reason;
use crate::resolve::{self, Step};
use crate::trace_compat::trace;
use crate::view::View;

/// The settlement state. Monotonic: once out of `Pending`, never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Not yet settled.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a reason.
    Rejected,
}

/// A continuation awaiting a fulfillment value.
pub(crate) type ValueCallback<T> = Box<dyn FnOnce(T) + Send>;

/// A continuation awaiting a rejection reason.
pub(crate) type ReasonCallback = Box<dyn FnOnce(Reason) + Send>;

struct Inner<T> {
    state: State,
    value: Option<T>,
    reason: Option<Reason>,
    value_queue: VecDeque<ValueCallback<T>>,
    reason_queue: VecDeque<ReasonCallback>,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            state: State::Pending,
            value: None,
            reason: None,
            value_queue: VecDeque::new(),
            reason_queue: VecDeque::new(),
        }
    }
}

/// The mutable settlement cell.
///
/// Producers hold the `Resolver` and call [`fulfill`](Resolver::fulfill) or
/// [`reject`](Resolver::reject) exactly once (later calls are silently
/// ignored). Consumers get a [`View`] via [`view`](Resolver::view), which
/// exposes chaining but not settlement.
pub struct Resolver<T> {
    inner: Arc<Mutex<Inner<T>>>,
    realm: Realm,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            realm: self.realm.clone(),
        }
    }
}

impl<T> Resolver<T> {
    /// The current settlement state.
    #[must_use]
    pub fn state(&self) -> State {
        self.inner.lock().expect("resolver lock poisoned").state
    }

    /// Returns true if the cell has not settled yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// The realm this cell defers and publishes through.
    pub(crate) fn realm(&self) -> &Realm {
        &self.realm
    }

    pub(crate) fn cell_id(&self) -> usize {
        Arc::as_ptr(&self.inner).cast::<()>() as usize
    }
}

impl<T> Resolver<T>
where
    T: Send + Clone + 'static,
{
    pub(crate) fn new_in(realm: &Realm) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
            realm: realm.clone(),
        }
    }

    /// The consumer capability for this cell.
    #[must_use]
    pub fn view(&self) -> View<T> {
        View::wrap(self.clone())
    }

    /// The fulfillment value, if the cell has fulfilled.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.inner.lock().expect("resolver lock poisoned").value.clone()
    }

    /// The rejection reason, if the cell has rejected.
    #[must_use]
    pub fn reason(&self) -> Option<Reason> {
        self.inner
            .lock()
            .expect("resolver lock poisoned")
            .reason
            .clone()
    }

    /// Settles the cell with a value. No-op if already settled.
    ///
    /// The value is stored as-is; it is not inspected for thenable-ness.
    /// Use [`settle`](Resolver::settle) to adopt a deferred value.
    pub fn fulfill(&self, value: T) {
        {
            let mut inner = self.inner.lock().expect("resolver lock poisoned");
            if inner.state != State::Pending {
                return;
            }
            inner.state = State::Fulfilled;
            inner.value = Some(value.clone());
            trace!("resolver fulfilled");
            if !inner.value_queue.is_empty() {
                // Scheduled while the state flip is still locked so no later
                // registration can slip in front of the queued continuations.
                let cell = Arc::clone(&self.inner);
                self.realm.defer(Box::new(move || drain_values(&cell)));
            }
        }
        self.realm.publish(|| BusEvent::Resolve(Box::new(value)));
    }

    /// Settles the cell with a reason. No-op if already settled.
    pub fn reject(&self, reason: Reason) {
        {
            let mut inner = self.inner.lock().expect("resolver lock poisoned");
            if inner.state != State::Pending {
                return;
            }
            inner.state = State::Rejected;
            inner.reason = Some(reason.clone());
            trace!("resolver rejected");
            if !inner.reason_queue.is_empty() {
                let cell = Arc::clone(&self.inner);
                self.realm.defer(Box::new(move || drain_reasons(&cell)));
            }
        }
        self.realm.publish(|| BusEvent::Reject(reason));
    }

    /// Explicit entry to the thenable resolution procedure: adopts `step`,
    /// unwrapping nested deferred values until a terminal outcome settles
    /// this cell. Plain [`fulfill`](Resolver::fulfill) never does this
    /// implicitly.
    pub fn settle(&self, step: Step<T>) {
        resolve::settle_with(self, step);
    }

    /// Registers a fulfillment continuation.
    ///
    /// Pending: queued for the settlement drain. Already fulfilled: deferred
    /// individually (never run synchronously). Already rejected: dropped.
    pub(crate) fn on_value(&self, callback: ValueCallback<T>) {
        let mut inner = self.inner.lock().expect("resolver lock poisoned");
        match inner.state {
            State::Pending => inner.value_queue.push_back(callback),
            State::Fulfilled => {
                let value = inner
                    .value
                    .clone()
                    .expect("fulfilled resolver holds a value");
                self.realm.defer(Box::new(move || callback(value)));
            }
            State::Rejected => {}
        }
    }

    /// Registers a rejection continuation. Mirrors [`Resolver::on_value`].
    pub(crate) fn on_reason(&self, callback: ReasonCallback) {
        let mut inner = self.inner.lock().expect("resolver lock poisoned");
        match inner.state {
            State::Pending => inner.reason_queue.push_back(callback),
            State::Rejected => {
                let reason = inner
                    .reason
                    .clone()
                    .expect("rejected resolver holds a reason");
                self.realm.defer(Box::new(move || callback(reason)));
            }
            State::Fulfilled => {}
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Drains the fulfillment queue, reading it live: continuations pushed while
/// draining are included. The lock is released around each continuation.
fn drain_values<T: Send + Clone + 'static>(cell: &Arc<Mutex<Inner<T>>>) {
    loop {
        let (callback, value) = {
            let mut inner = cell.lock().expect("resolver lock poisoned");
            let Some(callback) = inner.value_queue.pop_front() else {
                break;
            };
            let value = inner
                .value
                .clone()
                .expect("fulfilled resolver holds a value");
            (callback, value)
        };
        callback(value);
    }
}

fn drain_reasons<T>(cell: &Arc<Mutex<Inner<T>>>) {
    loop {
        let (callback, reason) = {
            let mut inner = cell.lock().expect("resolver lock poisoned");
            let Some(callback) = inner.reason_queue.pop_front() else {
                break;
            };
            let reason = inner
                .reason
                .clone()
                .expect("rejected resolver holds a reason");
            (callback, reason)
        };
        callback(reason);
    }
}
