//! Optional instrumentation events.
//!
//! The settlement core never logs. When a host wants visibility into
//! settlements and captured panics it injects an [`EventBus`] via
//! [`Realm::enable_instrumentation`](crate::Realm::enable_instrumentation);
//! until then no event is built and the overhead is a single `Option` check.
//!
//! Three events exist, matching the three observable outcomes at the core's
//! boundary: a fulfillment, a rejection, and a captured exception.

use std::any::Any;
use std::fmt;
use std::sync::Mutex;

use crate::reason::Reason;

/// A broadcast instrumentation event.
pub enum BusEvent {
    /// A resolver fulfilled. Carries the fulfillment value, type-erased.
    Resolve(Box<dyn Any + Send>),
    /// A resolver rejected.
    Reject(Reason),
    /// A continuation panicked (or chained on itself) and the failure was
    /// folded into the rejection channel.
    Exception(Reason),
}

impl BusEvent {
    /// The event's kind, for filtering and assertions.
    #[must_use]
    pub fn kind(&self) -> BusEventKind {
        match self {
            Self::Resolve(_) => BusEventKind::Resolve,
            Self::Reject(_) => BusEventKind::Reject,
            Self::Exception(_) => BusEventKind::Exception,
        }
    }
}

impl fmt::Debug for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(_) => f.write_str("BusEvent::Resolve(..)"),
            Self::Reject(reason) => write!(f, "BusEvent::Reject({reason})"),
            Self::Exception(reason) => write!(f, "BusEvent::Exception({reason})"),
        }
    }
}

/// The kind of a [`BusEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusEventKind {
    /// A fulfillment was recorded.
    Resolve,
    /// A rejection was recorded.
    Reject,
    /// A captured failure was recorded.
    Exception,
}

/// An externally supplied publish/subscribe collaborator.
pub trait EventBus: Send + Sync {
    /// Broadcasts one event to the host's subscribers.
    fn publish(&self, event: BusEvent);
}

/// A bus that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpBus;

impl EventBus for NoOpBus {
    fn publish(&self, _event: BusEvent) {}
}

/// A bus that records events in memory for later inspection.
#[derive(Debug, Default)]
pub struct MemoryBus {
    events: Mutex<Vec<BusEvent>>,
}

impl MemoryBus {
    /// Creates an empty recording bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("bus events lock poisoned").len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events
            .lock()
            .expect("bus events lock poisoned")
            .is_empty()
    }

    /// Returns the kinds of all recorded events, in publish order.
    #[must_use]
    pub fn kinds(&self) -> Vec<BusEventKind> {
        self.events
            .lock()
            .expect("bus events lock poisoned")
            .iter()
            .map(BusEvent::kind)
            .collect()
    }

    /// Drains and returns all recorded events, in publish order.
    #[must_use]
    pub fn take(&self) -> Vec<BusEvent> {
        std::mem::take(&mut *self.events.lock().expect("bus events lock poisoned"))
    }
}

impl EventBus for MemoryBus {
    fn publish(&self, event: BusEvent) {
        self.events
            .lock()
            .expect("bus events lock poisoned")
            .push(event);
    }
}
