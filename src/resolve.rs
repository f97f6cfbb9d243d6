//! The thenable resolution procedure.
//!
//! A continuation's return value may itself be an in-flight computation. The
//! resolution procedure decides, given a settlement cell and a [`Step`],
//! whether to fulfill the cell immediately (terminal value) or to adopt the
//! eventual outcome of a deferred one, unwrapping nesting fully:
//!
//! ```text
//! settle_with(cell, step):
//!   Value(v)     → cell.fulfill(v)                      (terminal)
//!   Pending(view)→ subscribe(view, on_inner, on_fail)   (adopt)
//!   Thenable(t)  → subscribe(t,    on_inner, on_fail)   (adopt)
//!
//!   on_inner(inner_step) → settle_with(cell, inner_step)   (recurse)
//!   on_fail(reason)      → cell.reject(reason)
//! ```
//!
//! The two inner callbacks share a first-wins guard: whichever fires first
//! decides the outcome and every later invocation is ignored. A panic while
//! subscribing rejects the cell only if neither callback fired yet, and only
//! when the realm's exception capture is enabled — the toggle is
//! authoritative here exactly as it is for chained continuations.
//!
//! Producers settle cells directly; nothing runs this procedure implicitly.
//! [`Resolver::settle`](crate::Resolver::settle) is the explicit entry point,
//! and the chaining operator runs it on every continuation return value.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bus::BusEvent;
use crate::reason::Reason;
use crate::resolver::Resolver;
use crate::view::View;

/// Continuation invoked with the inner outcome of an adopted thenable.
pub type OnStep<T> = Box<dyn FnOnce(Step<T>) + Send>;

/// Continuation invoked with the failure of an adopted thenable.
pub type OnReason = Box<dyn FnOnce(Reason) + Send>;

/// A value that may itself represent a future outcome.
///
/// This is the named capability replacing duck-typed "has a callable `then`"
/// probing: a type opts in by implementing the trait. `subscribe` consumes
/// the thenable, so its settlement hook is read exactly once by construction.
///
/// Implementations may invoke either callback, at most one effectively:
/// whichever fires first decides, later invocations of the other are ignored
/// by the caller's guard.
pub trait Thenable<T>: Send {
    /// Registers interest in this value's eventual outcome.
    fn subscribe(self: Box<Self>, on_value: OnStep<T>, on_reason: OnReason);
}

/// A continuation's return value: terminal, or deferred to adopt.
pub enum Step<T> {
    /// A terminal value; the downstream cell fulfills with it directly.
    Value(T),
    /// A deferred value; the downstream cell adopts its eventual outcome.
    Pending(View<T>),
    /// A custom thenable; adopted like [`Step::Pending`].
    Thenable(Box<dyn Thenable<T>>),
}

impl<T> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Step::Value(..)"),
            Self::Pending(view) => write!(f, "Step::Pending({view:?})"),
            Self::Thenable(_) => f.write_str("Step::Thenable(..)"),
        }
    }
}

/// Runs the resolution procedure: settles `resolver` from `step`, adopting
/// deferred values and unwrapping nested thenables until a terminal outcome.
pub fn settle_with<T>(resolver: &Resolver<T>, step: Step<T>)
where
    T: Send + Clone + 'static,
{
    match step {
        Step::Value(value) => resolver.fulfill(value),
        Step::Pending(view) => adopt(resolver, Box::new(view)),
        Step::Thenable(thenable) => adopt(resolver, thenable),
    }
}

fn adopt<T>(resolver: &Resolver<T>, thenable: Box<dyn Thenable<T>>)
where
    T: Send + Clone + 'static,
{
    // First-wins guard shared by both inner callbacks; independent per
    // resolution attempt.
    let fired = Arc::new(AtomicBool::new(false));

    let on_value: OnStep<T> = {
        let resolver = resolver.clone();
        let fired = Arc::clone(&fired);
        Box::new(move |step| {
            if !fired.swap(true, Ordering::SeqCst) {
                settle_with(&resolver, step);
            }
        })
    };

    let on_reason: OnReason = {
        let resolver = resolver.clone();
        let fired = Arc::clone(&fired);
        Box::new(move |reason| {
            if !fired.swap(true, Ordering::SeqCst) {
                resolver.reject(reason);
            }
        })
    };

    if resolver.realm().exception_capture() {
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(move || thenable.subscribe(on_value, on_reason)));
        if let Err(payload) = outcome {
            // A panic after an inner callback fired is suppressed: the
            // outcome is already decided.
            if !fired.swap(true, Ordering::SeqCst) {
                let reason = Reason::from_panic(payload);
                resolver
                    .realm()
                    .publish(|| BusEvent::Exception(reason.clone()));
                resolver.reject(reason);
            }
        }
    } else {
        thenable.subscribe(on_value, on_reason);
    }
}
