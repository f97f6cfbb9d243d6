//! Aggregate combinators over views.
//!
//! - [`all`]: fulfill with every input's result, positionally aligned;
//!   reject with the first input rejection
//! - [`race`]: adopt the first settlement of either kind
//!
//! Both are built purely on the public [`View::then_else`](crate::View::then_else)
//! contract — no privileged access to resolver internals — so any conforming
//! view can be combined generically. Later settlements of other inputs are
//! observed but discarded, which is harmless under once-only settlement.

pub mod all;
pub mod race;

pub use all::all;
pub use race::race;
