//! Port layer
//!
//! The portable kernel code reaches the execution environment only through
//! this module:
//!
//! - `thread_create` starts a new execution context running an [`Entry`]
//! - `block` parks the calling context until woken or a deadline passes
//! - `wake` makes a parked context re-check its state
//! - `uptime_ticks` / `cycles` read the time base
//! - `exit_aborted` terminates the calling context, unwinding its stack
//! - `current_tcb` returns the control block of the calling context
//!
//! The hosted port maps contexts onto operating system threads.

/// Entry function of a new execution context, called with two
/// register-sized arguments
pub(crate) type Entry = unsafe fn(usize, usize);

#[cfg(feature = "std")]
mod hosted;

#[cfg(feature = "std")]
pub(crate) use hosted::*;
