//! Thread Control Block (TCB) definition
//!
//! The TCB contains all the information needed to manage a thread. It is
//! owned by the application (usually a `static`) and reused across the
//! threads it hosts; the generation counter tells them apart.

use core::fmt;

use portable_atomic::AtomicBool;

use crate::config::CFG_THREAD_NAME_LEN;
use crate::critical::CriticalSection;
use crate::cs_cell::CsCell;
use crate::port::PortTcb;
use crate::prio::ThreadPrio;
use crate::sched::PendList;
use crate::types::{PendOn, PendStatus, ThreadOptions, ThreadState, Tick};

/// Thread Control Block
pub struct OsTcb {
    inner: CsCell<TcbInner>,
}

pub(crate) struct TcbInner {
    // ============ Identification ============
    /// Thread name
    pub name: ThreadName,
    /// Bumped every time a new thread is created on this TCB
    pub generation: u32,

    // ============ Priority ============
    /// Current (possibly inherited) priority
    pub prio: ThreadPrio,
    /// Priority assigned by the application
    pub base_prio: ThreadPrio,

    // ============ State ============
    pub state: ThreadState,
    pub options: ThreadOptions,

    // ============ Pend list links ============
    pub pend_next: Option<&'static OsTcb>,
    pub pend_prev: Option<&'static OsTcb>,
    /// What the thread is pending on
    pub pend_on: PendOn,
    /// Result of pend operation
    pub pend_status: PendStatus,
    /// Object a pend handed over (fifo item, memory block)
    pub msg: *mut (),

    // ============ Requests from other threads ============
    pub suspend_req: bool,
    pub abort_req: bool,

    // ============ Start gate ============
    /// Set once the thread may run its entry function
    pub started: bool,
    /// Tick at which a delayed start releases the thread
    pub start_at: Option<Tick>,

    // ============ Termination ============
    /// Threads blocked in `join`
    pub join_list: PendList,
    /// In-use flag of the stack region, released on termination
    pub stack_claim: Option<&'static AtomicBool>,

    // ============ Port ============
    pub port: PortTcb,
}

// SAFETY: `msg` carries a block or item handed from one thread to another
// under the critical section; the receiving thread becomes its owner.
unsafe impl Send for TcbInner {}

impl OsTcb {
    /// Create a new, unused TCB
    pub const fn new() -> Self {
        OsTcb {
            inner: CsCell::new(TcbInner {
                name: ThreadName::new(),
                generation: 0,
                prio: ThreadPrio::highest_preempt(),
                base_prio: ThreadPrio::highest_preempt(),
                state: ThreadState::Dormant,
                options: ThreadOptions::empty(),
                pend_next: None,
                pend_prev: None,
                pend_on: PendOn::Nothing,
                pend_status: PendStatus::Ok,
                msg: core::ptr::null_mut(),
                suspend_req: false,
                abort_req: false,
                started: false,
                start_at: None,
                join_list: PendList::new(),
                stack_claim: None,
                port: PortTcb::new(),
            }),
        }
    }

    #[inline(always)]
    pub(crate) fn inner<'a>(&'a self, cs: CriticalSection<'a>) -> &'a mut TcbInner {
        self.inner.get(cs)
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OsTcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OsTcb@{:p}", self)
    }
}

/// Fixed-capacity thread name
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ThreadName {
    buf: [u8; CFG_THREAD_NAME_LEN],
    len: u8,
}

impl ThreadName {
    pub const fn new() -> Self {
        ThreadName {
            buf: [0; CFG_THREAD_NAME_LEN],
            len: 0,
        }
    }

    /// Build a name from `s`, truncated at a character boundary to fit
    pub fn from_str_truncate(s: &str) -> Self {
        let mut end = s.len().min(CFG_THREAD_NAME_LEN);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut name = Self::new();
        name.buf[..end].copy_from_slice(&s.as_bytes()[..end]);
        name.len = end as u8;
        name
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from a `&str` cut at a char boundary.
        core::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ThreadName {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq<str> for ThreadName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ThreadName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
