//! Deferral: single-settlement deferred values with thenable adoption.
//!
//! # Overview
//!
//! A [`Resolver`] is a settlement cell: it starts pending and settles exactly
//! once, either to a fulfillment value or to a rejection [`Reason`]. Consumers
//! hold a [`View`] of the cell and register continuations with
//! [`then`](View::then) / [`catch`](View::catch); continuations run after
//! settlement regardless of whether they registered before or after it, and
//! they never run synchronously inside the call that registered them.
//!
//! # Core Guarantees
//!
//! - **Single settlement**: duplicate `fulfill`/`reject` calls are silent no-ops
//! - **Async delivery**: a continuation never runs before `then` returns
//! - **FIFO fan-out**: continuations for the same outcome fire in registration order
//! - **Thenable adoption**: a continuation may return another deferred value
//!   ([`Step::Pending`] or a custom [`Thenable`]) and the chain adopts its
//!   eventual outcome, unwrapping nesting fully
//! - **Isolated configuration**: the capture toggle, scheduler, and
//!   instrumentation bus live on a [`Realm`], never in process globals
//!
//! # Module Structure
//!
//! - [`realm`]: configuration cell that mints resolvers and owns the scheduler
//! - [`resolver`]: the settlement state machine
//! - [`view`]: the consumer capability surface and chaining operator
//! - [`resolve`]: the thenable resolution procedure
//! - [`combinator`]: `all` and `race` aggregates over views
//! - [`scheduler`]: the deferred-invocation seam and the default FIFO queue
//! - [`context`]: request-context propagation around deferred tasks
//! - [`bus`]: optional instrumentation events for settlement and panics
//! - [`reason`]: the payload-agnostic rejection reason
//!
//! # Example
//!
//! ```
//! use deferral::{Realm, Step};
//!
//! let realm = Realm::new();
//! let cell = realm.resolver::<i32>();
//! let doubled = cell.view().then(|n| Step::Value(n * 2));
//!
//! cell.fulfill(21);
//! realm.run_until_idle();
//! # let _ = doubled;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod bus;
pub mod combinator;
pub mod context;
pub mod realm;
pub mod reason;
pub mod resolve;
pub mod resolver;
pub mod scheduler;
pub mod trace_compat;
pub mod view;

pub use bus::{BusEvent, BusEventKind, EventBus, MemoryBus, NoOpBus};
pub use combinator::{all, race};
pub use context::{ContextScheduler, Propagate};
pub use realm::Realm;
pub use reason::{CallbackPanic, ChainCycle, Reason};
pub use resolve::{OnReason, OnStep, Step, Thenable};
pub use resolver::{Resolver, State};
pub use scheduler::{FifoScheduler, Schedule, Task};
pub use view::View;
