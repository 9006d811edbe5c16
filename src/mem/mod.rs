//! Bounded memory for thread launch packages
//!
//! Threads launched with an allocator take the memory for their closure
//! package from a [`ThreadAlloc`]. The package is released before the
//! closure runs, so a slab sized for the number of threads being launched
//! concurrently is enough. A [`Heap`] serves packages of mixed sizes from
//! one bounded region.

#[cfg(feature = "heap")]
mod heap;
#[cfg(feature = "mem-slab")]
mod slab;

#[cfg(feature = "heap")]
pub use heap::Heap;
#[cfg(feature = "mem-slab")]
pub use slab::MemSlab;

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::{OsError, OsResult};

/// An allocator thread packages can be placed in.
///
/// # Safety
/// `allocate` must return memory valid for reads and writes of
/// `layout.size()` bytes at `layout.align()` alignment, not aliased by any
/// other live allocation, and usable from any thread until it is passed
/// back to `deallocate`.
pub unsafe trait ThreadAlloc: Sync {
    fn allocate(&self, layout: Layout) -> OsResult<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same
    /// `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process heap
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SysHeap;

#[cfg(feature = "std")]
unsafe impl ThreadAlloc for SysHeap {
    fn allocate(&self, layout: Layout) -> OsResult<NonNull<u8>> {
        if layout.size() == 0 {
            // any non-null address aligned for the layout will do
            return NonNull::new(core::ptr::null_mut::<u8>().wrapping_add(layout.align()))
                .ok_or(OsError::Inval);
        }
        // SAFETY: the layout has a non-zero size.
        let p = unsafe { std::alloc::alloc(layout) };
        NonNull::new(p).ok_or_else(|| {
            crate::warn!("heap allocation failed");
            OsError::NoMem
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            // SAFETY: the caller passes back a block from `allocate`.
            unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }
}
