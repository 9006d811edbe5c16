//! Critical section handling
//!
//! All kernel object state is mutated inside a critical section provided by
//! the `critical-section` crate. On the hosted port this is the crate's
//! `std` implementation (a process-wide reentrant lock); on a bare-metal
//! target it is whatever implementation the application links in.
//!
//! A critical section must never be held across a blocking point. Blocking
//! helpers in [`crate::sched`] take care to leave it before parking.

pub use critical_section::CriticalSection;

/// Execute a closure inside the kernel critical section.
///
/// The closure receives the section token, which is required to access
/// [`CsCell`](crate::cs_cell::CsCell) protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
