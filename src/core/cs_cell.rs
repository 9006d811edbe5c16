//! Critical section protected cell
//!
//! Zero-overhead wrapper for data that must be accessed within critical sections.

use core::cell::UnsafeCell;

use crate::critical::CriticalSection;

/// A cell that can only be accessed within a critical section.
///
/// Callers must not hold two references obtained from the same cell at
/// once; kernel code keeps each borrow to a single statement or block.
///
/// The cell is shared across threads only if its contents may move
/// between them:
///
/// ```compile_fail
/// use std::rc::Rc;
/// use zpp::cs_cell::CsCell;
///
/// fn shared<T: Sync>(_: &T) {}
/// shared(&CsCell::new(Rc::new(0u8)));
/// ```
pub struct CsCell<T>(UnsafeCell<T>);

// SAFETY: the value is only reached through a critical section, which
// serializes access across threads.
unsafe impl<T: Send> Sync for CsCell<T> {}
unsafe impl<T: Send> Send for CsCell<T> {}

impl<T> CsCell<T> {
    /// Create a new CsCell
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Get a mutable reference to the inner value
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get<'a>(&'a self, _cs: CriticalSection<'a>) -> &'a mut T {
        unsafe { &mut *self.0.get() }
    }

    /// Get a raw pointer
    #[inline(always)]
    pub const fn as_ptr(&self) -> *mut T {
        self.0.get()
    }
}
