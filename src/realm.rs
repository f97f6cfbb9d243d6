//! The isolated configuration cell.
//!
//! A [`Realm`] owns everything that the settlement core treats as ambient:
//! the scheduler used to defer continuations, the exception-capture toggle,
//! and the optional instrumentation bus. Realms are explicit values rather
//! than process globals so tests (and embedders) run isolated configurations
//! in parallel; cloning a realm shares its configuration.
//!
//! Resolvers are minted from a realm and carry a handle back to it, which is
//! how every cell in a chain defers work and publishes events consistently.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::bus::{BusEvent, EventBus};
use crate::combinator;
use crate::reason::Reason;
use crate::resolver::Resolver;
use crate::scheduler::{FifoScheduler, Schedule, Task};
use crate::view::View;

struct RealmShared {
    /// The active scheduler. Replaceable at runtime via `set_scheduler`.
    scheduler: Mutex<Arc<dyn Schedule>>,
    /// The default FIFO queue, kept for explicit pumping even when a wrapper
    /// (e.g. a context-propagating scheduler) is installed around it.
    queue: Arc<FifoScheduler>,
    /// Whether panics in continuations are folded into rejections.
    capture: AtomicBool,
    /// The instrumentation bus, if enabled.
    bus: Mutex<Option<Arc<dyn EventBus>>>,
}

/// A shared settlement configuration: scheduler, capture toggle, bus.
#[derive(Clone)]
pub struct Realm {
    shared: Arc<RealmShared>,
}

impl Realm {
    /// Creates a realm with the default FIFO scheduler, exception capture
    /// enabled, and no instrumentation.
    #[must_use]
    pub fn new() -> Self {
        let queue = Arc::new(FifoScheduler::new());
        let scheduler: Arc<dyn Schedule> = queue.clone();
        Self {
            shared: Arc::new(RealmShared {
                scheduler: Mutex::new(scheduler),
                queue,
                capture: AtomicBool::new(true),
                bus: Mutex::new(None),
            }),
        }
    }

    /// Replaces the deferred-invocation primitive.
    ///
    /// Typically used to interpose a [`ContextScheduler`](crate::ContextScheduler)
    /// around [`Realm::queue`]; the core keeps deferring through whatever is
    /// installed here.
    pub fn set_scheduler(&self, scheduler: Arc<dyn Schedule>) {
        *self
            .shared
            .scheduler
            .lock()
            .expect("realm scheduler lock poisoned") = scheduler;
    }

    /// The realm's default FIFO queue.
    ///
    /// This handle stays valid after [`Realm::set_scheduler`], so a wrapper
    /// that forwards into it can still be pumped with
    /// [`Realm::run_until_idle`].
    #[must_use]
    pub fn queue(&self) -> Arc<FifoScheduler> {
        Arc::clone(&self.shared.queue)
    }

    /// Pumps the default queue until idle. Returns the number of tasks run.
    ///
    /// When a foreign scheduler that does not forward into the default queue
    /// is installed, the host pumps that scheduler itself and this is a no-op.
    pub fn run_until_idle(&self) -> usize {
        self.shared.queue.run_until_idle()
    }

    /// Sets whether panics in continuations are captured and converted to
    /// rejections (`true`, the default) or left to escape the scheduled task
    /// (`false`, for debugging).
    pub fn set_exception_capture(&self, enabled: bool) {
        self.shared.capture.store(enabled, Ordering::SeqCst);
    }

    /// Returns the current exception-capture setting.
    #[must_use]
    pub fn exception_capture(&self) -> bool {
        self.shared.capture.load(Ordering::SeqCst)
    }

    /// Enables instrumentation: settlement and captured-exception events are
    /// published to `bus` from now on.
    pub fn enable_instrumentation(&self, bus: Arc<dyn EventBus>) {
        *self.shared.bus.lock().expect("realm bus lock poisoned") = Some(bus);
    }

    /// Defers a task via the active scheduler.
    pub(crate) fn defer(&self, task: Task) {
        let scheduler = Arc::clone(
            &*self
                .shared
                .scheduler
                .lock()
                .expect("realm scheduler lock poisoned"),
        );
        scheduler.defer(task);
    }

    /// Publishes an event if instrumentation is enabled. The event is only
    /// built when a bus is installed.
    pub(crate) fn publish(&self, make: impl FnOnce() -> BusEvent) {
        let bus = self
            .shared
            .bus
            .lock()
            .expect("realm bus lock poisoned")
            .clone();
        if let Some(bus) = bus {
            bus.publish(make());
        }
    }

    /// Mints a pending settlement cell.
    #[must_use]
    pub fn resolver<T>(&self) -> Resolver<T>
    where
        T: Send + Clone + 'static,
    {
        Resolver::new_in(self)
    }

    /// Constructs an already-fulfilled view.
    #[must_use]
    pub fn resolved<T>(&self, value: T) -> View<T>
    where
        T: Send + Clone + 'static,
    {
        let cell = self.resolver();
        cell.fulfill(value);
        cell.view()
    }

    /// Constructs an already-rejected view.
    #[must_use]
    pub fn rejected<T>(&self, reason: Reason) -> View<T>
    where
        T: Send + Clone + 'static,
    {
        let cell = self.resolver::<T>();
        cell.reject(reason);
        cell.view()
    }

    /// Runs `build` synchronously with a fresh resolver and returns its view.
    pub fn produce<T>(&self, build: impl FnOnce(&Resolver<T>)) -> View<T>
    where
        T: Send + Clone + 'static,
    {
        let cell = self.resolver();
        build(&cell);
        cell.view()
    }

    /// See [`combinator::all`].
    #[must_use]
    pub fn all<T>(&self, views: impl IntoIterator<Item = View<T>>) -> View<Vec<T>>
    where
        T: Send + Clone + 'static,
    {
        combinator::all(self, views)
    }

    /// See [`combinator::race`].
    #[must_use]
    pub fn race<T>(&self, views: impl IntoIterator<Item = View<T>>) -> View<T>
    where
        T: Send + Clone + 'static,
    {
        combinator::race(self, views)
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("exception_capture", &self.exception_capture())
            .field("queued", &self.shared.queue.len())
            .finish_non_exhaustive()
    }
}
