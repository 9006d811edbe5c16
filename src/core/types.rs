//! Core type definitions
//!
//! These types provide strong typing for kernel primitives.

use core::time::Duration;

use bitflags::bitflags;

use crate::clock;

/// Tick counter type
pub type Tick = u64;

/// Semaphore counter type
pub type SemCount = u32;

/// How long a blocking operation may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Return immediately if the object is not available
    NoWait,
    /// Wait until the object becomes available
    Forever,
    /// Wait at most this many ticks
    Ticks(Tick),
}

impl Timeout {
    /// Absolute deadline for a wait starting at `now`, `None` for forever
    #[inline]
    pub fn deadline(self, now: Tick) -> Option<Tick> {
        match self {
            Timeout::NoWait => Some(now),
            Timeout::Forever => None,
            Timeout::Ticks(t) => Some(now.saturating_add(t)),
        }
    }

    #[inline]
    pub fn is_no_wait(self) -> bool {
        self == Timeout::NoWait
    }
}

impl From<Duration> for Timeout {
    /// Converts with tick round-up so that a wait never ends early.
    /// A zero duration is [`Timeout::NoWait`].
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Timeout::NoWait
        } else {
            Timeout::Ticks(clock::to_ticks_ceil(d))
        }
    }
}

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ThreadState {
    /// Control block holds no thread
    Dormant = 0,
    /// Created, waiting for its start delay or an explicit start
    Prestart = 1,
    /// Running or ready to run
    Ready = 2,
    /// Pending on a kernel object, a join or a sleep
    Pending = 3,
    /// Suspended
    Suspended = 4,
    /// Terminated
    Terminated = 5,
}

/// What the thread is pending on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PendOn {
    Nothing = 0,
    Mutex = 1,
    Semaphore = 2,
    Fifo = 3,
    CondVar = 4,
    Poll = 5,
    MemSlab = 6,
    Join = 7,
    Sleep = 8,
    Timer = 9,
    Heap = 10,
}

/// Pend status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PendStatus {
    /// Still waiting
    Pending = 0,
    /// Pend succeeded
    Ok = 1,
    /// Timeout occurred
    Timeout = 2,
    /// Wait was cancelled by the object owner
    Canceled = 3,
    /// Object was reset while pending
    Reset = 4,
    /// Thread is being aborted
    Abort = 5,
}

bitflags! {
    /// Thread creation options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ThreadOptions: u32 {
        /// Abnormal termination of the thread is fatal for the system
        const ESSENTIAL = 1 << 0;
        /// Floating point registers are preserved across switches
        const FP_REGS = 1 << 1;
        /// SSE registers are preserved across switches
        const SSE_REGS = 1 << 2;
        /// Thread runs in user mode
        const USER = 1 << 3;
        /// Thread inherits the kernel object permissions of its creator
        const INHERIT_PERMS = 1 << 4;
    }
}
