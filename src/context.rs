//! Request-context propagation around deferred tasks.
//!
//! When many logically independent request flows interleave on one shared
//! task queue, ambient state (a request id, a tenant, a logging context)
//! must travel with each deferred continuation. [`ContextScheduler`] wraps
//! any [`Schedule`]: every `defer` captures a token from the host's
//! [`Propagate`] implementation at schedule time and restores it immediately
//! before the task body runs.
//!
//! The settlement core knows nothing about request semantics; installing the
//! wrapper via [`Realm::set_scheduler`](crate::Realm::set_scheduler) is the
//! whole integration.

use std::fmt;
use std::sync::Arc;

use crate::scheduler::{Schedule, Task};

/// Snapshot-and-restore of host ambient state.
pub trait Propagate: Send + Sync {
    /// The captured snapshot carried from schedule time to run time.
    type Token: Send + 'static;

    /// Captures the current ambient state.
    fn capture(&self) -> Self::Token;

    /// Restores previously captured ambient state.
    fn restore(&self, token: Self::Token);
}

/// A [`Schedule`] wrapper that carries ambient state across the defer gap.
pub struct ContextScheduler<P> {
    inner: Arc<dyn Schedule>,
    propagate: Arc<P>,
}

impl<P> ContextScheduler<P> {
    /// Wraps `inner`, capturing and restoring context via `propagate`.
    pub fn new(inner: Arc<dyn Schedule>, propagate: Arc<P>) -> Self {
        Self { inner, propagate }
    }
}

impl<P: Propagate + 'static> Schedule for ContextScheduler<P> {
    fn defer(&self, task: Task) {
        let token = self.propagate.capture();
        let propagate = Arc::clone(&self.propagate);
        self.inner.defer(Box::new(move || {
            propagate.restore(token);
            task();
        }));
    }
}

impl<P> fmt::Debug for ContextScheduler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScheduler").finish_non_exhaustive()
    }
}
