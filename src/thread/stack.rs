//! Thread control block and stack storage

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

use portable_atomic::{AtomicBool, Ordering};

use crate::error::{OsError, OsResult};
use crate::task::OsTcb;

/// Storage for the control block of one thread at a time
pub struct ThreadData {
    tcb: OsTcb,
}

impl ThreadData {
    pub const fn new() -> Self {
        ThreadData { tcb: OsTcb::new() }
    }

    #[inline]
    pub(crate) fn tcb(&'static self) -> &'static OsTcb {
        &self.tcb
    }
}

impl Default for ThreadData {
    fn default() -> Self {
        Self::new()
    }
}

#[repr(C, align(16))]
struct StackBuf<const N: usize>([MaybeUninit<u8>; N]);

/// Stack region of `N` bytes for one thread at a time.
///
/// The region is claimed when a thread is created on it and released when
/// that thread terminates. The tail of the region holds the thread's
/// closure package until the thread starts.
pub struct ThreadStack<const N: usize> {
    buf: UnsafeCell<StackBuf<N>>,
    in_use: AtomicBool,
}

// SAFETY: the buffer is only written by the thread that holds the claim.
unsafe impl<const N: usize> Sync for ThreadStack<N> {}

impl<const N: usize> ThreadStack<N> {
    const VALID: () = assert!(N >= crate::config::CFG_STACK_SIZE_MIN, "thread stack too small");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        ThreadStack {
            buf: UnsafeCell::new(StackBuf([MaybeUninit::uninit(); N])),
            in_use: AtomicBool::new(false),
        }
    }

    /// Size of the region in bytes
    pub const fn size(&self) -> usize {
        N
    }

    /// True while a thread created on this region has not terminated
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    pub(crate) fn base(&self) -> *mut u8 {
        self.buf.get().cast()
    }

    /// Claim the region for a new thread. `Busy` if a thread created on
    /// it is still alive.
    pub(crate) fn try_claim(&'static self) -> OsResult<&'static AtomicBool> {
        if self.in_use.swap(true, Ordering::AcqRel) {
            return Err(OsError::Busy);
        }
        Ok(&self.in_use)
    }
}

impl<const N: usize> Default for ThreadStack<N> {
    fn default() -> Self {
        Self::new()
    }
}
