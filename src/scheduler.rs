//! The deferred-invocation seam.
//!
//! Every continuation in this crate runs through a [`Schedule`]
//! implementation. The contract is small: `defer(task)` enqueues `task` to
//! run after the current call stack unwinds, and tasks deferred against the
//! same scheduler run in FIFO order. Nothing here blocks; "waiting" is
//! represented structurally as queue membership.
//!
//! [`FifoScheduler`] is the portable default: an explicitly pumped task
//! queue. Tests (and any host without an event loop) drive it with
//! [`FifoScheduler::run_until_idle`], which makes every asynchrony assertion
//! deterministic.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::trace_compat::trace;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send>;

/// A FIFO-preserving deferred-invocation primitive.
pub trait Schedule: Send + Sync {
    /// Enqueues `task` to run after the current call stack unwinds.
    ///
    /// Implementations must only enqueue. Running the task synchronously
    /// inside `defer` would break the return-before-run guarantee every
    /// consumer of this crate depends on. Relative order of tasks deferred
    /// against the same scheduler must be preserved.
    fn defer(&self, task: Task);
}

/// The default scheduler: a mutex-guarded FIFO task queue pumped explicitly.
///
/// Tasks are popped under the lock but run outside it, so a panicking task
/// neither poisons the queue nor blocks later pumping.
#[derive(Default)]
pub struct FifoScheduler {
    queue: Mutex<VecDeque<Task>>,
}

impl FifoScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tasks currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().expect("scheduler queue lock poisoned").len()
    }

    /// Returns true if no tasks are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue
            .lock()
            .expect("scheduler queue lock poisoned")
            .is_empty()
    }

    /// Runs the next queued task, if any. Returns whether a task ran.
    pub fn tick(&self) -> bool {
        let task = self
            .queue
            .lock()
            .expect("scheduler queue lock poisoned")
            .pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks until the queue is empty, including tasks enqueued while
    /// draining. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.tick() {
            ran += 1;
        }
        trace!(tasks = ran, "scheduler drained to idle");
        ran
    }
}

impl Schedule for FifoScheduler {
    fn defer(&self, task: Task) {
        self.queue
            .lock()
            .expect("scheduler queue lock poisoned")
            .push_back(task);
    }
}

impl fmt::Debug for FifoScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoScheduler")
            .field("queued", &self.len())
            .finish()
    }
}
