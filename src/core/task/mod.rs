//! Thread control blocks and thread identity

mod tcb;

pub use tcb::{OsTcb, ThreadName};
pub(crate) use tcb::TcbInner;

use core::fmt;

use crate::critical::{critical_section, CriticalSection};
use crate::types::ThreadState;

/// Identity of one thread.
///
/// Two ids compare equal only if they name the same control block *and*
/// the same thread instance on it; an id kept after its thread terminated
/// never matches a later thread created on the same control block.
#[derive(Clone, Copy)]
pub struct ThreadId {
    tcb: &'static OsTcb,
    generation: u32,
}

impl ThreadId {
    pub(crate) fn new(tcb: &'static OsTcb, generation: u32) -> Self {
        ThreadId { tcb, generation }
    }

    /// Id of the thread currently hosted by `tcb`
    pub(crate) fn of(cs: CriticalSection<'_>, tcb: &'static OsTcb) -> Self {
        ThreadId::new(tcb, tcb.inner(cs).generation)
    }

    #[inline]
    pub(crate) fn tcb(&self) -> &'static OsTcb {
        self.tcb
    }

    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// True while the control block still hosts this thread instance
    pub(crate) fn is_current_instance(&self, cs: CriticalSection<'_>) -> bool {
        self.tcb.inner(cs).generation == self.generation
    }

    /// True if the thread this id names has terminated
    pub fn is_terminated(&self) -> bool {
        critical_section(|cs| {
            !self.is_current_instance(cs) || self.tcb.inner(cs).state == ThreadState::Terminated
        })
    }
}

impl PartialEq for ThreadId {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.tcb, other.tcb) && self.generation == other.generation
    }
}

impl Eq for ThreadId {}

impl core::hash::Hash for ThreadId {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        (self.tcb as *const OsTcb).hash(state);
        self.generation.hash(state);
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({:p}#{})", self.tcb, self.generation)
    }
}
