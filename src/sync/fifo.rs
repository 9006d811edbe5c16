//! FIFO queue of caller-owned items
//!
//! The queue never owns item memory. Every item type embeds a [`FifoLink`]
//! through which the queue chains it; `push_back` hands the exclusive
//! borrow of an item to the queue and `pop_front` hands it back.

use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use core::time::Duration;

use crate::critical::{critical_section, CriticalSection};
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::result::Outcome;
use crate::sched::{self, PendList, PollList, POLL_CANCELLED, POLL_READY};
use crate::types::{PendOn, PendStatus, Timeout};

struct LinkInner {
    next: Option<NonNull<FifoLink>>,
    item: *mut (),
    queued: bool,
}

// SAFETY: the pointers name `'static` items whose exclusive borrow moved
// into the queue; they are only followed inside the critical section.
unsafe impl Send for LinkInner {}

/// Queue link embedded in every item
pub struct FifoLink {
    inner: CsCell<LinkInner>,
}

impl FifoLink {
    pub const fn new() -> Self {
        FifoLink {
            inner: CsCell::new(LinkInner {
                next: None,
                item: ptr::null_mut(),
                queued: false,
            }),
        }
    }

    fn get<'a>(link: NonNull<FifoLink>, cs: CriticalSection<'a>) -> &'a mut LinkInner {
        // SAFETY: a queued link belongs to a `'static` item owned by the queue.
        unsafe { link.as_ref() }.inner.get(cs)
    }
}

impl Default for FifoLink {
    fn default() -> Self {
        Self::new()
    }
}

/// An item that can be queued in a [`Fifo`].
///
/// # Safety
/// `fifo_link` must always return the same link, stored inside `self`.
pub unsafe trait FifoItem {
    fn fifo_link(&self) -> &FifoLink;
}

pub(crate) struct FifoState {
    head: Option<NonNull<FifoLink>>,
    tail: Option<NonNull<FifoLink>>,
    /// Threads waiting for an item
    pend_list: PendList,
    /// Event sets watching this queue
    pub(crate) poll_list: PollList,
}

// SAFETY: as for `LinkInner`.
unsafe impl Send for FifoState {}

impl FifoState {
    #[inline]
    pub(crate) fn is_available(&self) -> bool {
        self.head.is_some()
    }

    fn pop(&mut self, cs: CriticalSection<'_>) -> Option<*mut ()> {
        let head = self.head?;
        let l = FifoLink::get(head, cs);
        self.head = l.next.take();
        if self.head.is_none() {
            self.tail = None;
        }
        l.queued = false;
        Some(l.item)
    }
}

/// Type-erased kernel queue object
pub struct OsFifo {
    state: CsCell<FifoState>,
}

impl OsFifo {
    pub const fn new() -> Self {
        OsFifo {
            state: CsCell::new(FifoState {
                head: None,
                tail: None,
                pend_list: PendList::new(),
                poll_list: PollList::new(),
            }),
        }
    }

    pub(crate) fn state(&self) -> &CsCell<FifoState> {
        &self.state
    }

    /// Append `item` (reached through `link`). A waiting thread receives it
    /// directly; otherwise it is queued and watching event sets notified.
    fn push(&self, link: &FifoLink, item: *mut ()) {
        let link_ptr = NonNull::from(link);
        let already_queued = critical_section(|cs| {
            let s = self.state.get(cs);
            let l = link.inner.get(cs);
            if l.queued {
                return true;
            }

            if let Some(waiter) = s.pend_list.pop(cs) {
                waiter.inner(cs).msg = item;
                sched::ready(cs, waiter, PendStatus::Ok);
                return false;
            }

            l.next = None;
            l.item = item;
            l.queued = true;
            match s.tail {
                Some(tail) => FifoLink::get(tail, cs).next = Some(link_ptr),
                None => s.head = Some(link_ptr),
            }
            s.tail = Some(link_ptr);
            s.poll_list.signal(cs, POLL_READY);
            false
        });

        assert!(!already_queued, "item is already in a fifo");
    }

    fn pop(&self, timeout: Timeout) -> OsResult<*mut ()> {
        let cur = sched::current();

        let ready = critical_section(|cs| {
            let s = self.state.get(cs);
            if let Some(item) = s.pop(cs) {
                return Ok(Some(item));
            }
            if timeout.is_no_wait() {
                return Err(OsError::WouldBlock);
            }
            sched::pend_prepare(cs, cur, PendOn::Fifo);
            s.pend_list.insert_by_prio(cs, cur);
            Ok(None)
        })?;

        if let Some(item) = ready {
            return Ok(item);
        }

        let deadline = timeout.deadline(crate::clock::uptime_ticks());
        let status = sched::pend_wait(cur, deadline, |cs| {
            self.state.get(cs).pend_list.remove(cs, cur)
        });
        sched::pend_result(status)?;
        Ok(critical_section(|cs| cur.inner(cs).msg))
    }

    fn peek<R>(&self, back: bool, f: impl FnOnce(*mut ()) -> R) -> Option<R> {
        critical_section(|cs| {
            let s = self.state.get(cs);
            let link = if back { s.tail } else { s.head }?;
            Some(f(FifoLink::get(link, cs).item))
        })
    }

    /// True if no item is queued
    pub fn is_empty(&self) -> bool {
        critical_section(|cs| self.state.get(cs).head.is_none())
    }

    /// Release the most urgent thread blocked in a pop with `Canceled` and
    /// flag every watching event set as cancelled
    pub fn cancel_wait(&self) {
        critical_section(|cs| {
            let s = self.state.get(cs);
            if let Some(waiter) = s.pend_list.pop(cs) {
                sched::ready(cs, waiter, PendStatus::Canceled);
            }
            s.poll_list.signal(cs, POLL_CANCELLED);
        })
    }
}

impl Default for OsFifo {
    fn default() -> Self {
        Self::new()
    }
}

/// Operations shared by [`Fifo`] and [`FifoRef`]
pub trait FifoBase<T: FifoItem + 'static> {
    /// The kernel object behind this handle
    fn native_handle(&self) -> &OsFifo;

    /// Append an item. The queue holds it until it is popped.
    ///
    /// # Panics
    /// Panics if the item is already queued.
    fn push_back(&self, item: &'static mut T) {
        let item: *mut T = item;
        // SAFETY: the link lives inside the item, which is `'static`.
        let link = unsafe { (*item).fifo_link() };
        self.native_handle().push(link, item.cast())
    }

    /// Remove the oldest item, waiting as long as needed
    fn pop_front(&self) -> Outcome<&'static mut T> {
        pop_typed(self.native_handle(), Timeout::Forever)
    }

    /// Remove the oldest item if there is one, `WouldBlock` otherwise
    fn try_pop_front(&self) -> Outcome<&'static mut T> {
        pop_typed(self.native_handle(), Timeout::NoWait)
    }

    /// Remove the oldest item, waiting at most `timeout`
    fn try_pop_front_for(&self, timeout: Duration) -> Outcome<&'static mut T> {
        pop_typed(self.native_handle(), Timeout::from(timeout))
    }

    /// Inspect the oldest item without removing it
    fn with_front<R, F: FnOnce(&T) -> R>(&self, f: F) -> Option<R> {
        // SAFETY: only `T` items are ever pushed through this handle type.
        self.native_handle().peek(false, |p| f(unsafe { &*(p as *const T) }))
    }

    /// Inspect the newest item without removing it
    fn with_back<R, F: FnOnce(&T) -> R>(&self, f: F) -> Option<R> {
        // SAFETY: as in `with_front`.
        self.native_handle().peek(true, |p| f(unsafe { &*(p as *const T) }))
    }

    fn is_empty(&self) -> bool {
        self.native_handle().is_empty()
    }

    fn cancel_wait(&self) {
        self.native_handle().cancel_wait()
    }
}

fn pop_typed<T: FifoItem + 'static>(fifo: &OsFifo, timeout: Timeout) -> Outcome<&'static mut T> {
    // SAFETY: typed handles only ever push `&'static mut T` of their own `T`.
    fifo.pop(timeout).map(|p| unsafe { &mut *(p as *mut T) }).into()
}

/// Owning queue handle
pub struct Fifo<T> {
    inner: OsFifo,
    _items: PhantomData<fn(T) -> T>,
}

// SAFETY: items cross threads through the queue.
unsafe impl<T: Send> Sync for Fifo<T> {}

impl<T> Fifo<T> {
    pub const fn new() -> Self {
        Fifo {
            inner: OsFifo::new(),
            _items: PhantomData,
        }
    }

    /// Untyped view of the queue
    pub(crate) fn os_fifo(&self) -> &OsFifo {
        &self.inner
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FifoItem + 'static> FifoBase<T> for Fifo<T> {
    #[inline]
    fn native_handle(&self) -> &OsFifo {
        &self.inner
    }
}

/// Referencing queue handle
pub struct FifoRef<'a, T> {
    inner: &'a OsFifo,
    _items: PhantomData<fn(T) -> T>,
}

impl<T> Clone for FifoRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FifoRef<'_, T> {}

impl<'a, T> FifoRef<'a, T> {
    /// Typed view of a queue known to hold `T` items
    pub(crate) fn from_os(inner: &'a OsFifo) -> Self {
        FifoRef {
            inner,
            _items: PhantomData,
        }
    }

    pub(crate) fn os_fifo(&self) -> &OsFifo {
        self.inner
    }
}

impl<'a, T> From<&'a Fifo<T>> for FifoRef<'a, T> {
    fn from(f: &'a Fifo<T>) -> Self {
        FifoRef {
            inner: &f.inner,
            _items: PhantomData,
        }
    }
}

impl<T: FifoItem + 'static> FifoBase<T> for FifoRef<'_, T> {
    #[inline]
    fn native_handle(&self) -> &OsFifo {
        self.inner
    }
}
