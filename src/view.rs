//! The consumer capability surface and the chaining operator.
//!
//! A [`View`] exposes exactly what a consumer may do with a settlement cell:
//! derive new deferred computations from it. It cannot force settlement —
//! the producer keeps the [`Resolver`](crate::Resolver) for that.
//!
//! Each chaining call allocates a fresh downstream cell, registers wrapped
//! continuations against the source cell's queues, and returns the new
//! cell's view *before* any continuation can run. The wrapped continuation:
//!
//! 1. runs the user callback (under panic capture when the realm enables it),
//! 2. rejects with [`ChainCycle`](crate::ChainCycle) if the callback
//!    returned the very view this call produced,
//! 3. otherwise feeds the returned [`Step`] through the thenable resolution
//!    procedure against the downstream cell.
//!
//! A missing callback side is pass-through: [`then`](View::then) forwards
//! rejections unchanged, [`catch`](View::catch) forwards fulfillments
//! unchanged, so outcomes travel through links that do not handle them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::bus::BusEvent;
use crate::realm::Realm;
use crate::reason::Reason;
use crate::resolve::{self, OnReason, OnStep, Step, Thenable};
use crate::resolver::Resolver;

/// The read-only capability over a settlement cell.
///
/// Cheap to clone; clones observe the same cell.
pub struct View<T> {
    resolver: Resolver<T>,
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<T> View<T> {
    pub(crate) fn wrap(resolver: Resolver<T>) -> Self {
        Self { resolver }
    }

    /// Returns true if both views observe the same cell.
    pub(crate) fn same_cell(&self, other: &View<T>) -> bool {
        self.resolver.cell_id() == other.resolver.cell_id()
    }

    pub(crate) fn realm(&self) -> &Realm {
        self.resolver.realm()
    }
}

impl<T> View<T>
where
    T: Send + Clone + 'static,
{
    /// Chains a fulfillment continuation. Rejections pass through unchanged.
    ///
    /// Returns the downstream view before the continuation can run; the
    /// continuation is never invoked synchronously inside this call.
    pub fn then<U, F>(&self, on_value: F) -> View<U>
    where
        U: Send + Clone + 'static,
        F: FnOnce(T) -> Step<U> + Send + 'static,
    {
        let next = self.realm().resolver::<U>();
        let next_view = next.view();

        {
            let next = next.clone();
            let guard = next_view.clone();
            self.resolver.on_value(Box::new(move |value| {
                run_chained(&next, &guard, on_value, value);
            }));
        }
        {
            let next = next.clone();
            self.resolver
                .on_reason(Box::new(move |reason| next.reject(reason)));
        }

        next_view
    }

    /// Chains both a fulfillment and a rejection continuation.
    ///
    /// This is the full chaining operator; [`then`](View::then) and
    /// [`catch`](View::catch) are the one-sided forms.
    pub fn then_else<U, F, G>(&self, on_value: F, on_reason: G) -> View<U>
    where
        U: Send + Clone + 'static,
        F: FnOnce(T) -> Step<U> + Send + 'static,
        G: FnOnce(Reason) -> Step<U> + Send + 'static,
    {
        let next = self.realm().resolver::<U>();
        let next_view = next.view();

        {
            let next = next.clone();
            let guard = next_view.clone();
            self.resolver.on_value(Box::new(move |value| {
                run_chained(&next, &guard, on_value, value);
            }));
        }
        {
            let next = next.clone();
            let guard = next_view.clone();
            self.resolver.on_reason(Box::new(move |reason| {
                run_chained(&next, &guard, on_reason, reason);
            }));
        }

        next_view
    }

    /// Chains a rejection continuation. Fulfillments pass through unchanged,
    /// which is why the value type is preserved.
    pub fn catch<G>(&self, on_reason: G) -> View<T>
    where
        G: FnOnce(Reason) -> Step<T> + Send + 'static,
    {
        let next = self.realm().resolver::<T>();
        let next_view = next.view();

        {
            let next = next.clone();
            self.resolver
                .on_value(Box::new(move |value| next.fulfill(value)));
        }
        {
            let next = next.clone();
            let guard = next_view.clone();
            self.resolver.on_reason(Box::new(move |reason| {
                run_chained(&next, &guard, on_reason, reason);
            }));
        }

        next_view
    }
}

impl<T> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("state", &self.resolver.state())
            .finish_non_exhaustive()
    }
}

impl<T> Thenable<T> for View<T>
where
    T: Send + Clone + 'static,
{
    fn subscribe(self: Box<Self>, on_value: OnStep<T>, on_reason: OnReason) {
        self.resolver
            .on_value(Box::new(move |value| on_value(Step::Value(value))));
        self.resolver.on_reason(on_reason);
    }
}

/// Runs a chained continuation: user callback, self-chain guard, resolution.
fn run_chained<I, U, F>(next: &Resolver<U>, guard: &View<U>, callback: F, input: I)
where
    I: Send + 'static,
    U: Send + Clone + 'static,
    F: FnOnce(I) -> Step<U> + Send + 'static,
{
    if next.realm().exception_capture() {
        match panic::catch_unwind(AssertUnwindSafe(move || callback(input))) {
            Ok(step) => deliver(next, guard, step),
            Err(payload) => {
                let reason = Reason::from_panic(payload);
                next.realm()
                    .publish(|| BusEvent::Exception(reason.clone()));
                next.reject(reason);
            }
        }
    } else {
        let step = callback(input);
        deliver(next, guard, step);
    }
}

fn deliver<U>(next: &Resolver<U>, guard: &View<U>, step: Step<U>)
where
    U: Send + Clone + 'static,
{
    if let Step::Pending(view) = &step {
        if view.same_cell(guard) {
            // Adopting the view this continuation settles would hang the
            // chain forever; reject with the distinguished cycle error.
            let reason = Reason::cycle();
            next.realm()
                .publish(|| BusEvent::Exception(reason.clone()));
            next.reject(reason);
            return;
        }
    }
    resolve::settle_with(next, step);
}
