//! Concurrency primitives for real-time Rust
//!
//! A small kernel object layer with a uniform, fallible operation surface:
//! - [`Outcome`], the result type every fallible operation returns
//! - Mutexes with priority inheritance, counting semaphores, condition
//!   variables and intrusive FIFO queues
//! - [`poll::EventSet`], one blocking wait over semaphores, queues and
//!   poll signals together
//! - Threads on caller-provided storage, with the launched closure packaged
//!   in the stack region or in a bounded allocator
//! - Fixed-block memory slabs and a bounded heap
//! - Clocks and software timers
//!
//! The hosted port (feature `std`) runs every kernel thread on an OS
//! thread.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(not(feature = "std"))]
compile_error!("no port is available without the `std` feature");

// ============ Modules ============

pub mod log;

pub mod core;
pub mod mem;
pub mod sync;
pub mod thread;

#[cfg(feature = "poll")]
pub mod poll;
#[cfg(feature = "timer")]
pub mod timer;

mod port;

// ============ Re-exports ============

pub use crate::core::clock;
pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::critical;
pub use crate::core::cs_cell;
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::prio;
pub use crate::core::prio::ThreadPrio;
pub use crate::core::result;
pub use crate::core::result::Outcome;
pub use crate::core::sched;
pub use crate::core::task;
pub use crate::core::task::ThreadId;
pub use crate::core::types;
pub use crate::core::types::*;

#[cfg(feature = "sem")]
pub use sync::sem;
#[cfg(feature = "mutex")]
pub use sync::mutex;
#[cfg(feature = "condvar")]
pub use sync::condvar;
#[cfg(feature = "fifo")]
pub use sync::fifo;
#[cfg(feature = "poll")]
pub use sync::poll_signal;

pub use thread::{this_thread, Thread, ThreadAttr, ThreadData, ThreadStack};

/// The handle traits, which carry the primitive operations
pub mod prelude {
    #[cfg(feature = "condvar")]
    pub use crate::sync::condvar::CondVarBase;
    #[cfg(feature = "fifo")]
    pub use crate::sync::fifo::FifoBase;
    #[cfg(feature = "mutex")]
    pub use crate::sync::mutex::MutexBase;
    #[cfg(feature = "poll")]
    pub use crate::sync::poll_signal::PollSignalBase;
    #[cfg(feature = "sem")]
    pub use crate::sync::sem::SemBase;
}
