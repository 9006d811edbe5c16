//! Bounded variable-size allocator
//!
//! A heap carves blocks of any size out of `N` bytes of static storage.
//! Memory is handed out in 16-byte units; every block is preceded by a
//! one-unit header holding its length and whether it is in use. Allocation
//! is first fit, and released blocks merge with free neighbours. A thread
//! waiting for memory retries each time a block is released.

use core::alloc::Layout;
use core::cell::UnsafeCell;
use core::ptr::NonNull;
use core::time::Duration;

use crate::critical::critical_section;
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::result::Outcome;
use crate::sched::{self, PendList};
use crate::types::{PendOn, PendStatus, Timeout};
use crate::warn;

use super::ThreadAlloc;

/// Allocation unit, and the largest alignment a heap block has
const UNIT: usize = 16;

#[repr(C, align(16))]
struct Storage<const N: usize>([u8; N]);

#[repr(C)]
#[derive(Clone, Copy)]
struct Header {
    /// Block length in units, header included
    units: usize,
    used: bool,
}

struct HeapState {
    /// Headers are written on first use
    init: bool,
    /// Units in use, headers included
    used: usize,
    /// Threads waiting for memory
    pend_list: PendList,
}

/// Heap of `N` bytes
pub struct Heap<const N: usize> {
    storage: UnsafeCell<Storage<N>>,
    state: CsCell<HeapState>,
}

// SAFETY: blocks are handed out exclusively; headers and bookkeeping are
// only touched inside critical sections.
unsafe impl<const N: usize> Sync for Heap<N> {}

impl<const N: usize> Heap<N> {
    const UNITS: usize = N / UNIT;

    const VALID: () = {
        assert!(N % UNIT == 0, "heap size must be a multiple of 16");
        assert!(N >= 2 * UNIT, "heap too small");
    };

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        Heap {
            storage: UnsafeCell::new(Storage([0; N])),
            state: CsCell::new(HeapState {
                init: false,
                used: 0,
                pend_list: PendList::new(),
            }),
        }
    }

    /// Size of the heap in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes taken by live blocks and their headers
    pub fn bytes_used(&self) -> usize {
        critical_section(|cs| self.state.get(cs).used * UNIT)
    }

    pub fn bytes_free(&self) -> usize {
        N - self.bytes_used()
    }

    fn base(&self) -> *mut u8 {
        self.storage.get().cast()
    }

    fn header(&self, unit: usize) -> *mut Header {
        debug_assert!(unit < Self::UNITS);
        // SAFETY: `unit` is inside the storage, and unit starts are aligned
        // for a header.
        unsafe { self.base().add(unit * UNIT) }.cast()
    }

    /// Read the header at `unit`. Callers hold the critical section and
    /// pass the start of a block.
    fn read(&self, unit: usize) -> Header {
        // SAFETY: see `header`; block starts always carry a header.
        unsafe { self.header(unit).read() }
    }

    fn write(&self, unit: usize, h: Header) {
        // SAFETY: see `header`.
        unsafe { self.header(unit).write(h) }
    }

    fn ensure_init(&self, s: &mut HeapState) {
        if !s.init {
            self.write(0, Header { units: Self::UNITS, used: false });
            s.init = true;
        }
    }

    /// Units a request needs, header included
    fn units_for(layout: Layout) -> OsResult<usize> {
        if layout.align() > UNIT {
            return Err(OsError::Inval);
        }
        let units = 1 + layout.size().div_ceil(UNIT).max(1);
        if units > Self::UNITS {
            return Err(OsError::Inval);
        }
        Ok(units)
    }

    /// First-fit search; splits the block found
    fn carve(&self, s: &mut HeapState, units: usize) -> Option<NonNull<u8>> {
        self.ensure_init(s);

        let mut at = 0;
        while at < Self::UNITS {
            let h = self.read(at);
            if !h.used && h.units >= units {
                if h.units > units {
                    self.write(at + units, Header { units: h.units - units, used: false });
                }
                self.write(at, Header { units, used: true });
                s.used += units;
                // SAFETY: the payload starts one unit past the header,
                // inside the block.
                return NonNull::new(unsafe { self.base().add((at + 1) * UNIT) });
            }
            at += h.units;
        }
        None
    }

    /// Merge runs of free blocks
    fn coalesce(&self) {
        let mut at = 0;
        while at < Self::UNITS {
            let mut h = self.read(at);
            if !h.used {
                while at + h.units < Self::UNITS {
                    let next = self.read(at + h.units);
                    if next.used {
                        break;
                    }
                    h.units += next.units;
                }
                self.write(at, h);
            }
            at += h.units;
        }
    }

    fn alloc(&self, layout: Layout, timeout: Timeout) -> OsResult<NonNull<u8>> {
        let units = Self::units_for(layout)?;
        let cur = sched::current();
        let deadline = timeout.deadline(crate::clock::uptime_ticks());

        loop {
            let got = critical_section(|cs| {
                let s = self.state.get(cs);
                if let Some(p) = self.carve(s, units) {
                    return Ok(Some(p));
                }
                if timeout.is_no_wait() {
                    return Err(OsError::NoMem);
                }
                sched::pend_prepare(cs, cur, PendOn::Heap);
                s.pend_list.insert_by_prio(cs, cur);
                Ok(None)
            })?;

            if let Some(p) = got {
                return Ok(p);
            }

            let status = sched::pend_wait(cur, deadline, |cs| {
                self.state.get(cs).pend_list.remove(cs, cur)
            });
            sched::pend_result(status)?;
        }
    }

    /// Allocate memory for `layout`, waiting as long as needed. `Inval` if
    /// the request can never be met.
    pub fn allocate(&self, layout: Layout) -> Outcome<NonNull<u8>> {
        self.alloc(layout, Timeout::Forever).into()
    }

    /// Allocate memory for `layout` if it is available now, `NoMem`
    /// otherwise
    pub fn try_allocate(&self, layout: Layout) -> Outcome<NonNull<u8>> {
        self.alloc(layout, Timeout::NoWait).into()
    }

    /// Allocate memory for `layout`, waiting at most `timeout`
    pub fn try_allocate_for(&self, layout: Layout, timeout: Duration) -> Outcome<NonNull<u8>> {
        self.alloc(layout, Timeout::from(timeout)).into()
    }

    /// Release a block. Every waiting thread retries its allocation.
    ///
    /// # Safety
    /// `block` must have been allocated from this heap and not released
    /// since.
    ///
    /// # Panics
    /// Panics if `block` does not point at a block payload of this heap.
    pub unsafe fn deallocate(&self, block: NonNull<u8>) {
        let offset = (block.as_ptr() as usize).wrapping_sub(self.base() as usize);
        assert!(
            offset < N && offset % UNIT == 0 && offset >= UNIT,
            "pointer does not belong to this heap"
        );
        let at = offset / UNIT - 1;

        critical_section(|cs| {
            let s = self.state.get(cs);
            let h = self.read(at);
            assert!(h.used, "heap block released twice");
            self.write(at, Header { used: false, ..h });
            s.used -= h.units;
            self.coalesce();

            while let Some(waiter) = s.pend_list.pop(cs) {
                sched::ready(cs, waiter, PendStatus::Ok);
            }
        })
    }
}

impl<const N: usize> Default for Heap<N> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: blocks never overlap and stay valid for the life of the heap.
unsafe impl<const N: usize> ThreadAlloc for Heap<N> {
    fn allocate(&self, layout: Layout) -> OsResult<NonNull<u8>> {
        self.alloc(layout, Timeout::NoWait).inspect_err(|e| {
            if *e == OsError::NoMem {
                warn!("heap exhausted");
            }
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        // SAFETY: forwarded from the caller.
        unsafe { Heap::deallocate(self, ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(n: usize) -> Layout {
        Layout::from_size_align(n, 8).unwrap()
    }

    #[test]
    fn first_fit_splits_and_merges() {
        static HEAP: Heap<128> = Heap::new();

        let a = HEAP.try_allocate(bytes(16)).into_value();
        let b = HEAP.try_allocate(bytes(40)).into_value();
        assert_eq!(HEAP.bytes_used(), 32 + 64);
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 32);

        // 32 bytes left: one header and one unit
        assert_eq!(HEAP.try_allocate(bytes(17)).into_error(), OsError::NoMem);
        let c = HEAP.try_allocate(bytes(1)).into_value();

        unsafe {
            HEAP.deallocate(a);
            HEAP.deallocate(b);
        }
        // the freed neighbours merged into one block
        let d = HEAP.try_allocate(bytes(80)).into_value();
        assert_eq!(d, a);

        unsafe {
            HEAP.deallocate(c);
            HEAP.deallocate(d);
        }
        assert_eq!(HEAP.bytes_used(), 0);
        assert_eq!(HEAP.try_allocate(bytes(112)).into_value(), a);
    }

    #[test]
    fn impossible_requests_are_invalid() {
        static HEAP: Heap<64> = Heap::new();
        assert_eq!(HEAP.try_allocate(bytes(64)).into_error(), OsError::Inval);
        assert_eq!(
            HEAP.try_allocate(Layout::from_size_align(8, 32).unwrap()).into_error(),
            OsError::Inval
        );
        assert_eq!(HEAP.bytes_free(), 64);
    }
}
