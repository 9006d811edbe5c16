//! Pend list for threads waiting on a kernel object
//!
//! Doubly linked through the `pend_next`/`pend_prev` fields of the waiting
//! threads' control blocks, ordered by priority (most urgent first, FIFO
//! among equals).

use crate::critical::CriticalSection;
use crate::task::OsTcb;

#[derive(Debug)]
pub struct PendList {
    head: Option<&'static OsTcb>,
    tail: Option<&'static OsTcb>,
}

impl PendList {
    /// Create a new empty pend list
    pub const fn new() -> Self {
        PendList {
            head: None,
            tail: None,
        }
    }

    /// Check if list is empty
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Get head of list
    #[inline(always)]
    pub fn head(&self) -> Option<&'static OsTcb> {
        self.head
    }

    /// Insert TCB at tail
    pub fn insert(&mut self, cs: CriticalSection<'_>, tcb: &'static OsTcb) {
        {
            let t = tcb.inner(cs);
            t.pend_next = None;
            t.pend_prev = self.tail;
        }

        match self.tail {
            Some(tail) => tail.inner(cs).pend_next = Some(tcb),
            None => self.head = Some(tcb),
        }

        self.tail = Some(tcb);
    }

    /// Insert in priority order
    pub fn insert_by_prio(&mut self, cs: CriticalSection<'_>, tcb: &'static OsTcb) {
        let prio = tcb.inner(cs).prio;

        let mut current = self.head;
        let mut prev: Option<&'static OsTcb> = None;

        while let Some(cur) = current {
            let cur_ref = cur.inner(cs);
            if prio.is_higher_than(cur_ref.prio) {
                break;
            }
            prev = current;
            current = cur_ref.pend_next;
        }

        {
            let t = tcb.inner(cs);
            t.pend_prev = prev;
            t.pend_next = current;
        }

        match prev {
            Some(p) => p.inner(cs).pend_next = Some(tcb),
            None => self.head = Some(tcb),
        }

        match current {
            Some(c) => c.inner(cs).pend_prev = Some(tcb),
            None => self.tail = Some(tcb),
        }
    }

    /// True if `tcb` is linked into this list
    pub fn contains(&self, cs: CriticalSection<'_>, tcb: &'static OsTcb) -> bool {
        match tcb.inner(cs).pend_prev {
            Some(_) => true,
            None => self.head.is_some_and(|h| core::ptr::eq(h, tcb)),
        }
    }

    /// Remove specific TCB from list. A TCB that is not linked is ignored.
    pub fn remove(&mut self, cs: CriticalSection<'_>, tcb: &'static OsTcb) {
        if !self.contains(cs, tcb) {
            return;
        }

        let (prev, next) = {
            let t = tcb.inner(cs);
            (t.pend_prev.take(), t.pend_next.take())
        };

        match prev {
            Some(p) => p.inner(cs).pend_next = next,
            None => self.head = next,
        }

        match next {
            Some(n) => n.inner(cs).pend_prev = prev,
            None => self.tail = prev,
        }
    }

    /// Remove and return the most urgent waiter
    pub fn pop(&mut self, cs: CriticalSection<'_>) -> Option<&'static OsTcb> {
        let head = self.head?;
        self.remove(cs, head);
        Some(head)
    }

    /// Re-sort `tcb` after its priority changed
    pub fn reposition(&mut self, cs: CriticalSection<'_>, tcb: &'static OsTcb) {
        self.remove(cs, tcb);
        self.insert_by_prio(cs, tcb);
    }
}

impl Default for PendList {
    fn default() -> Self {
        Self::new()
    }
}
