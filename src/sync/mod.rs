//! Synchronization primitives
//!
//! Every primitive comes as a kernel object (`OsXxx`), an owning handle
//! that embeds it and a referencing handle that borrows it. Both handles
//! implement the primitive's `XxxBase` trait, which carries the operations.

#[cfg(feature = "sem")]
pub mod sem;

#[cfg(feature = "mutex")]
pub mod mutex;

#[cfg(feature = "condvar")]
pub mod condvar;

#[cfg(feature = "fifo")]
pub mod fifo;

#[cfg(feature = "poll")]
pub mod poll_signal;
