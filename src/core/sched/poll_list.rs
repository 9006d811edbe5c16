//! Poll registrations of a kernel object
//!
//! A thread blocked in an event-set wait links one [`PollNode`] per slot
//! into the poll list of the slot's object. When the object's condition
//! becomes true the object marks every registered node and wakes the
//! node's poller. Nodes are only linked for the duration of one wait and
//! always unlinked before the wait returns.

use core::ptr::NonNull;

use crate::critical::CriticalSection;
use crate::cs_cell::CsCell;
use crate::sched;
use crate::task::OsTcb;
use crate::types::{PendOn, PendStatus};

/// Node state: the object's condition became true
pub(crate) const POLL_READY: u8 = 1 << 0;
/// Node state: waiting on the object was cancelled
pub(crate) const POLL_CANCELLED: u8 = 1 << 1;

struct PollLink {
    next: Option<NonNull<PollNode>>,
    prev: Option<NonNull<PollNode>>,
    poller: Option<&'static OsTcb>,
    state: u8,
}

// SAFETY: linked nodes are only followed inside the critical section, and
// stay in place while linked.
unsafe impl Send for PollLink {}

/// One registration of a polling thread on one object
pub(crate) struct PollNode {
    link: CsCell<PollLink>,
}

impl PollNode {
    pub(crate) const fn new() -> Self {
        PollNode {
            link: CsCell::new(PollLink {
                next: None,
                prev: None,
                poller: None,
                state: 0,
            }),
        }
    }

    pub(crate) fn state(&self, cs: CriticalSection<'_>) -> u8 {
        self.link.get(cs).state
    }

    pub(crate) fn set_state(&self, cs: CriticalSection<'_>, state: u8) {
        self.link.get(cs).state = state;
    }

    fn link<'a>(node: NonNull<PollNode>, cs: CriticalSection<'a>) -> &'a mut PollLink {
        // SAFETY: linked nodes stay in place until they are unlinked, which
        // happens inside a critical section before their event set is
        // released.
        unsafe { node.as_ref() }.link.get(cs)
    }
}

/// Registered pollers of one object
pub(crate) struct PollList {
    head: Option<NonNull<PollNode>>,
}

// SAFETY: as for `PollLink`.
unsafe impl Send for PollList {}

impl PollList {
    pub(crate) const fn new() -> Self {
        PollList { head: None }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Link `node` for `poller`, clearing its state
    pub(crate) fn register(&mut self, cs: CriticalSection<'_>, node: &PollNode, poller: &'static OsTcb) {
        let ptr = NonNull::from(node);
        {
            let l = node.link.get(cs);
            l.prev = None;
            l.next = self.head;
            l.poller = Some(poller);
            l.state = 0;
        }
        if let Some(head) = self.head {
            PollNode::link(head, cs).prev = Some(ptr);
        }
        self.head = Some(ptr);
    }

    /// Unlink `node`. Its state is kept so the poller can read it.
    pub(crate) fn unregister(&mut self, cs: CriticalSection<'_>, node: &PollNode) {
        let ptr = NonNull::from(node);
        let (prev, next) = {
            let l = node.link.get(cs);
            if l.poller.is_none() {
                return;
            }
            l.poller = None;
            (l.prev.take(), l.next.take())
        };

        match prev {
            Some(p) => PollNode::link(p, cs).next = next,
            None => {
                if self.head == Some(ptr) {
                    self.head = next;
                }
            }
        }
        if let Some(n) = next {
            PollNode::link(n, cs).prev = prev;
        }
    }

    /// Mark every registered node with `bits` and wake its poller
    pub(crate) fn signal(&mut self, cs: CriticalSection<'_>, bits: u8) {
        let mut cur = self.head;
        while let Some(node) = cur {
            let (poller, next) = {
                let l = PollNode::link(node, cs);
                l.state |= bits;
                (l.poller, l.next)
            };
            if let Some(poller) = poller {
                let t = poller.inner(cs);
                if t.pend_on == PendOn::Poll && t.pend_status == PendStatus::Pending {
                    sched::ready(cs, poller, PendStatus::Ok);
                }
            }
            cur = next;
        }
    }
}

impl Default for PollList {
    fn default() -> Self {
        Self::new()
    }
}
