//! Payload-agnostic rejection reasons.
//!
//! Any value may serve as a rejection reason; the settlement cell imposes no
//! schema on its failure channel. [`Reason`] erases the payload behind a
//! shared `Any` handle so one rejection can fan out to many continuations,
//! while [`Reason::downcast_ref`] keeps the payload reachable at the seams
//! where callers know what they put in.
//!
//! Two payload types are distinguished:
//!
//! - [`ChainCycle`]: a continuation returned the very view it settles, which
//!   would otherwise wait on itself forever
//! - [`CallbackPanic`]: a continuation panicked and the panic was captured
//!   and folded into the rejection channel

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A rejection reason: an arbitrary shared payload plus a display summary.
///
/// `Reason` is cheap to clone; all clones share the same payload.
#[derive(Clone)]
pub struct Reason {
    payload: Arc<dyn Any + Send + Sync>,
    summary: Arc<str>,
}

impl Reason {
    /// Wraps an arbitrary payload. The summary defaults to the payload's
    /// type name; use [`Reason::with_summary`] for a human-readable one.
    #[must_use]
    pub fn new<P: Any + Send + Sync>(payload: P) -> Self {
        Self {
            summary: Arc::from(any::type_name::<P>()),
            payload: Arc::new(payload),
        }
    }

    /// Wraps a payload together with an explicit display summary.
    #[must_use]
    pub fn with_summary<P: Any + Send + Sync>(payload: P, summary: impl Into<String>) -> Self {
        Self {
            summary: Arc::from(summary.into().as_str()),
            payload: Arc::new(payload),
        }
    }

    /// A plain text reason. The text is both the payload and the summary.
    #[must_use]
    pub fn msg(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            summary: Arc::from(text.as_str()),
            payload: Arc::new(text),
        }
    }

    /// The self-reference rejection raised by the chaining operator.
    pub(crate) fn cycle() -> Self {
        let error = ChainCycle;
        Self {
            summary: Arc::from(error.to_string().as_str()),
            payload: Arc::new(error),
        }
    }

    /// Converts a caught panic payload into a reason.
    ///
    /// Panic payloads are `Box<dyn Any + Send>` and not shareable as-is; the
    /// message is extracted for string payloads (the overwhelmingly common
    /// case) and replaced with a placeholder otherwise.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        let error = CallbackPanic::new(message);
        Self {
            summary: Arc::from(error.to_string().as_str()),
            payload: Arc::new(error),
        }
    }

    /// Returns true if the payload is a `P`.
    #[must_use]
    pub fn is<P: Any>(&self) -> bool {
        self.payload.downcast_ref::<P>().is_some()
    }

    /// Borrows the payload as a `P`, if that is what was stored.
    #[must_use]
    pub fn downcast_ref<P: Any>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }

    /// Returns true if this is the distinguished self-reference rejection.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        self.is::<ChainCycle>()
    }

    /// Returns the text payload of a reason built with [`Reason::msg`].
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    /// The display summary.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reason")
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

/// A continuation returned the view chained off itself.
///
/// Adopting that view would make the downstream cell wait on its own
/// settlement; the chaining operator rejects with this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("continuation returned its own downstream view")]
pub struct ChainCycle;

/// A captured panic from a deferred continuation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("panic in deferred continuation: {message}")]
pub struct CallbackPanic {
    message: String,
}

impl CallbackPanic {
    /// Creates a payload with the given panic message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
