//! Poll signal
//!
//! A flag plus an integer result that a thread raises and event sets wait
//! on. Event-set waits clear the flag before blocking, so only raises that
//! happen during a wait are reported by it.

use crate::critical::critical_section;
use crate::cs_cell::CsCell;
use crate::result::Outcome;
use crate::sched::{PollList, POLL_READY};

pub(crate) struct SignalState {
    pub(crate) signaled: bool,
    result: i32,
    /// Event sets watching this signal
    pub(crate) poll_list: PollList,
}

/// Kernel poll signal object
pub struct OsPollSignal {
    state: CsCell<SignalState>,
}

impl OsPollSignal {
    pub const fn new() -> Self {
        OsPollSignal {
            state: CsCell::new(SignalState {
                signaled: false,
                result: 0,
                poll_list: PollList::new(),
            }),
        }
    }

    pub(crate) fn state(&self) -> &CsCell<SignalState> {
        &self.state
    }

    /// Raise the signal with `result` and wake watching event sets
    pub fn raise(&self, result: i32) {
        critical_section(|cs| {
            let s = self.state.get(cs);
            s.result = result;
            s.signaled = true;
            s.poll_list.signal(cs, POLL_READY);
        })
    }

    /// The result of the last raise, if the signal is raised
    pub fn check(&self) -> Option<i32> {
        critical_section(|cs| {
            let s = self.state.get(cs);
            s.signaled.then_some(s.result)
        })
    }

    /// Lower the signal
    pub fn reset(&self) {
        critical_section(|cs| self.state.get(cs).signaled = false)
    }
}

impl Default for OsPollSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Operations shared by [`PollSignal`] and [`PollSignalRef`]
pub trait PollSignalBase {
    /// The kernel object behind this handle
    fn native_handle(&self) -> &OsPollSignal;

    fn raise(&self, result: i32) -> Outcome<()> {
        self.native_handle().raise(result);
        Outcome::success()
    }

    fn check(&self) -> Option<i32> {
        self.native_handle().check()
    }

    fn reset(&self) {
        self.native_handle().reset()
    }
}

/// Owning poll signal handle
pub struct PollSignal {
    inner: OsPollSignal,
}

impl PollSignal {
    pub const fn new() -> Self {
        PollSignal {
            inner: OsPollSignal::new(),
        }
    }
}

impl Default for PollSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl PollSignalBase for PollSignal {
    #[inline]
    fn native_handle(&self) -> &OsPollSignal {
        &self.inner
    }
}

/// Referencing poll signal handle
#[derive(Clone, Copy)]
pub struct PollSignalRef<'a> {
    inner: &'a OsPollSignal,
}

impl<'a> PollSignalRef<'a> {
    pub fn new<S: PollSignalBase + ?Sized>(s: &'a S) -> Self {
        PollSignalRef {
            inner: s.native_handle(),
        }
    }
}

impl<'a> From<&'a PollSignal> for PollSignalRef<'a> {
    fn from(s: &'a PollSignal) -> Self {
        PollSignalRef { inner: &s.inner }
    }
}

impl<'a> From<&'a OsPollSignal> for PollSignalRef<'a> {
    fn from(s: &'a OsPollSignal) -> Self {
        PollSignalRef { inner: s }
    }
}

impl PollSignalBase for PollSignalRef<'_> {
    #[inline]
    fn native_handle(&self) -> &OsPollSignal {
        self.inner
    }
}
