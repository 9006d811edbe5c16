//! Fixed-size block allocator
//!
//! A slab owns `COUNT` blocks of `BLOCK` bytes in static storage. Free
//! blocks are chained by index, so allocation and release are O(1) and
//! never touch the heap. A thread waiting for a block receives the next
//! released block directly.

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

/// Largest alignment a slab guarantees for its blocks
const SLAB_ALIGN: usize = 16;

#[repr(C, align(16))]
struct Storage<const BLOCK: usize, const COUNT: usize>([[u8; BLOCK]; COUNT]);

struct SlabState<const COUNT: usize> {
    /// Free chain: `next[i]` follows block `i`, `COUNT` ends the chain
    next: [usize; COUNT],
    free_head: usize,
    used: usize,
    /// Threads waiting for a block
    pend_list: PendList,
}

impl<const COUNT: usize> SlabState<COUNT> {
    fn take(&mut self) -> Option<usize> {
        if self.free_head == COUNT {
            return None;
        }
        let idx = self.free_head;
        self.free_head = self.next[idx];
        self.used += 1;
        Some(idx)
    }

    fn put(&mut self, idx: usize) {
        self.next[idx] = self.free_head;
        self.free_head = idx;
        self.used -= 1;
    }
}

/// Slab of `COUNT` blocks of `BLOCK` bytes
pub struct MemSlab<const BLOCK: usize, const COUNT: usize> {
    storage: UnsafeCell<Storage<BLOCK, COUNT>>,
    state: CsCell<SlabState<COUNT>>,
}

// SAFETY: block memory is handed out exclusively; the bookkeeping is only
// touched inside critical sections.
unsafe impl<const BLOCK: usize, const COUNT: usize> Sync for MemSlab<BLOCK, COUNT> {}

impl<const BLOCK: usize, const COUNT: usize> MemSlab<BLOCK, COUNT> {
    const VALID: () = {
        assert!(COUNT > 0, "slab needs at least one block");
        assert!(BLOCK >= core::mem::size_of::<usize>(), "slab block too small");
        assert!(BLOCK % core::mem::align_of::<usize>() == 0, "slab block size must be word aligned");
    };

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        let mut next = [0usize; COUNT];
        let mut i = 0;
        while i < COUNT {
            next[i] = i + 1;
            i += 1;
        }

        MemSlab {
            storage: UnsafeCell::new(Storage([[0; BLOCK]; COUNT])),
            state: CsCell::new(SlabState {
                next,
                free_head: 0,
                used: 0,
                pend_list: PendList::new(),
            }),
        }
    }

    /// Size of one block in bytes
    pub const fn block_size(&self) -> usize {
        BLOCK
    }

    /// Alignment every block is guaranteed to have
    pub const fn block_align(&self) -> usize {
        let natural = 1usize << BLOCK.trailing_zeros();
        if natural < SLAB_ALIGN { natural } else { SLAB_ALIGN }
    }

    /// Number of blocks in the slab
    pub const fn num_blocks(&self) -> usize {
        COUNT
    }

    /// Blocks currently allocated
    pub fn num_used(&self) -> usize {
        critical_section(|cs| self.state.get(cs).used)
    }

    /// Blocks currently free
    pub fn num_free(&self) -> usize {
        COUNT - self.num_used()
    }

    fn base(&self) -> *mut u8 {
        self.storage.get().cast()
    }

    fn block_ptr(&self, idx: usize) -> NonNull<u8> {
        // SAFETY: `idx < COUNT`, so the offset stays inside the storage.
        unsafe { NonNull::new_unchecked(self.base().add(idx * BLOCK)) }
    }

    fn alloc(&self, timeout: Timeout) -> OsResult<NonNull<u8>> {
        let cur = sched::current();

        let ready = critical_section(|cs| {
            let s = self.state.get(cs);
            if let Some(idx) = s.take() {
                return Ok(Some(idx));
            }
            if timeout.is_no_wait() {
                return Err(OsError::NoMem);
            }
            sched::pend_prepare(cs, cur, PendOn::MemSlab);
            s.pend_list.insert_by_prio(cs, cur);
            Ok(None)
        })?;

        if let Some(idx) = ready {
            return Ok(self.block_ptr(idx));
        }

        let deadline = timeout.deadline(crate::clock::uptime_ticks());
        let status = sched::pend_wait(cur, deadline, |cs| {
            self.state.get(cs).pend_list.remove(cs, cur)
        });
        sched::pend_result(status)?;

        let block = critical_section(|cs| cur.inner(cs).msg);
        NonNull::new(block.cast()).ok_or(OsError::Fault)
    }

    /// Allocate a block, waiting as long as needed
    pub fn allocate(&self) -> Outcome<NonNull<u8>> {
        self.alloc(Timeout::Forever).into()
    }

    /// Allocate a block if one is free, `NoMem` otherwise
    pub fn try_allocate(&self) -> Outcome<NonNull<u8>> {
        self.alloc(Timeout::NoWait).into()
    }

    /// Allocate a block, waiting at most `timeout`
    pub fn try_allocate_for(&self, timeout: Duration) -> Outcome<NonNull<u8>> {
        self.alloc(Timeout::from(timeout)).into()
    }

    /// Return a block to the slab. The most urgent waiter receives it
    /// directly.
    ///
    /// # Safety
    /// `block` must have been allocated from this slab and not released
    /// since.
    ///
    /// # Panics
    /// Panics if `block` does not point at a block of this slab.
    pub unsafe fn deallocate(&self, block: NonNull<u8>) {
        let offset = (block.as_ptr() as usize).wrapping_sub(self.base() as usize);
        assert!(
            offset < BLOCK * COUNT && offset % BLOCK == 0,
            "pointer does not belong to this slab"
        );

        critical_section(|cs| {
            let s = self.state.get(cs);
            match s.pend_list.pop(cs) {
                Some(waiter) => {
                    waiter.inner(cs).msg = block.as_ptr().cast();
                    sched::ready(cs, waiter, PendStatus::Ok);
                }
                None => s.put(offset / BLOCK),
            }
        })
    }
}

impl<const BLOCK: usize, const COUNT: usize> Default for MemSlab<BLOCK, COUNT> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: blocks are disjoint and stay valid for the life of the slab.
unsafe impl<const BLOCK: usize, const COUNT: usize> ThreadAlloc for MemSlab<BLOCK, COUNT> {
    fn allocate(&self, layout: Layout) -> OsResult<NonNull<u8>> {
        if layout.size() > BLOCK || layout.align() > self.block_align() {
            return Err(OsError::Inval);
        }
        self.alloc(Timeout::NoWait).inspect_err(|_| {
            warn!("mem slab exhausted");
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        // SAFETY: forwarded from the caller.
        unsafe { MemSlab::deallocate(self, ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_chain_hands_out_every_block_once() {
        static SLAB: MemSlab<32, 3> = MemSlab::new();
        let a = SLAB.try_allocate().into_value();
        let b = SLAB.try_allocate().into_value();
        let c = SLAB.try_allocate().into_value();
        assert!(a != b && b != c && a != c);
        assert_eq!(SLAB.try_allocate().into_error(), OsError::NoMem);
        assert_eq!(SLAB.num_free(), 0);

        unsafe { SLAB.deallocate(b) };
        assert_eq!(SLAB.try_allocate().into_value(), b);

        unsafe {
            SLAB.deallocate(a);
            SLAB.deallocate(b);
            SLAB.deallocate(c);
        }
        assert_eq!(SLAB.num_used(), 0);
    }

    #[test]
    fn block_alignment() {
        static SLAB: MemSlab<24, 2> = MemSlab::new();
        assert_eq!(SLAB.block_align(), 8);
        let p = SLAB.try_allocate().into_value();
        assert_eq!(p.as_ptr() as usize % 8, 0);
        assert_eq!(
            ThreadAlloc::allocate(&SLAB, Layout::from_size_align(8, 16).unwrap()),
            Err(OsError::Inval)
        );
        unsafe { SLAB.deallocate(p) };
    }
}
