//! Thread priorities
//!
//! Lower numeric value means more urgent. Negative values are cooperative
//! priorities (never preempted by other threads), non-negative values are
//! preemptive ones.

use crate::config::{CFG_NUM_COOP_PRIORITIES, CFG_NUM_PREEMPT_PRIORITIES};

/// A thread priority, always within the configured range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreadPrio(i32);

impl ThreadPrio {
    /// Build a priority from its numeric value, clamped into the valid range
    pub const fn new(prio: i32) -> Self {
        if prio < -CFG_NUM_COOP_PRIORITIES {
            ThreadPrio(-CFG_NUM_COOP_PRIORITIES)
        } else if prio > CFG_NUM_PREEMPT_PRIORITIES - 1 {
            ThreadPrio(CFG_NUM_PREEMPT_PRIORITIES - 1)
        } else {
            ThreadPrio(prio)
        }
    }

    /// Numeric value
    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    pub const fn highest_coop() -> Self {
        ThreadPrio(-CFG_NUM_COOP_PRIORITIES)
    }

    pub const fn lowest_coop() -> Self {
        ThreadPrio(-1)
    }

    pub const fn highest_preempt() -> Self {
        ThreadPrio(0)
    }

    pub const fn lowest_preempt() -> Self {
        ThreadPrio(CFG_NUM_PREEMPT_PRIORITIES - 1)
    }

    /// Most urgent priority overall
    pub const fn highest() -> Self {
        Self::highest_coop()
    }

    /// Least urgent priority overall
    pub const fn lowest() -> Self {
        Self::lowest_preempt()
    }

    /// Cooperative priority `n` levels above the lowest cooperative one
    pub const fn coop(n: i32) -> Self {
        Self::new(Self::lowest_coop().0 - n)
    }

    /// Preemptive priority `n` levels above the lowest preemptive one.
    /// Values past the top saturate at [`ThreadPrio::highest_preempt`].
    pub const fn preempt(n: i32) -> Self {
        if n >= CFG_NUM_PREEMPT_PRIORITIES {
            Self::highest_preempt()
        } else {
            Self::new(Self::lowest_preempt().0 - n)
        }
    }

    #[inline]
    pub const fn is_coop(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_preempt(self) -> bool {
        self.0 >= 0
    }

    /// True if `self` is strictly more urgent than `other`
    #[inline]
    pub const fn is_higher_than(self, other: ThreadPrio) -> bool {
        self.0 < other.0
    }
}
