//! Mutex implementation with priority inheritance
//!
//! Mutexes are recursive: the owner may lock again and must unlock as many
//! times. A more urgent waiter boosts the owner's priority until the owner
//! releases the mutex.

use core::ptr;
use core::time::Duration;

use crate::critical::{critical_section, CriticalSection};
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::result::Outcome;
use crate::sched::{self, PendList};
use crate::task::OsTcb;
use crate::types::{PendOn, PendStatus, Timeout};
use crate::config::CFG_MUTEX_NESTING_MAX;

struct MutexState {
    /// Threads waiting on this mutex
    pend_list: PendList,
    /// Thread that owns the mutex
    owner: Option<&'static OsTcb>,
    /// Recursion depth of the owner
    nesting: u32,
}

/// Kernel mutex object
pub struct OsMutex {
    state: CsCell<MutexState>,
}

impl OsMutex {
    /// Create a new, unlocked mutex
    pub const fn new() -> Self {
        OsMutex {
            state: CsCell::new(MutexState {
                pend_list: PendList::new(),
                owner: None,
                nesting: 0,
            }),
        }
    }

    /// Acquire the mutex
    ///
    /// If the mutex is owned by a less urgent thread, the owner's priority
    /// is raised to the caller's while the caller waits.
    pub fn lock(&self, timeout: Timeout) -> OsResult<()> {
        let cur = sched::current();

        let pending = critical_section(|cs| {
            let m = self.state.get(cs);

            let owner = match m.owner {
                None => {
                    m.owner = Some(cur);
                    m.nesting = 1;
                    return Ok(false);
                }
                Some(owner) if ptr::eq(owner, cur) => {
                    if m.nesting == CFG_MUTEX_NESTING_MAX {
                        return Err(OsError::Overflow);
                    }
                    m.nesting += 1;
                    return Ok(false);
                }
                Some(owner) => owner,
            };

            if timeout.is_no_wait() {
                return Err(OsError::WouldBlock);
            }

            // Priority inheritance
            let cur_prio = cur.inner(cs).prio;
            let o = owner.inner(cs);
            if cur_prio.is_higher_than(o.prio) {
                o.prio = cur_prio;
            }

            sched::pend_prepare(cs, cur, PendOn::Mutex);
            m.pend_list.insert_by_prio(cs, cur);
            Ok(true)
        })?;

        if !pending {
            return Ok(());
        }

        let deadline = timeout.deadline(crate::clock::uptime_ticks());
        let status = sched::pend_wait(cur, deadline, |cs| {
            let m = self.state.get(cs);
            m.pend_list.remove(cs, cur);
            Self::adjust_owner_prio(cs, m);
        });
        sched::pend_result(status)
    }

    /// Release the mutex
    ///
    /// On the final unlock the caller's priority returns to its base value
    /// and ownership passes directly to the most urgent waiter.
    pub fn unlock(&self) -> OsResult<()> {
        let cur = sched::current();
        critical_section(|cs| self.release(cs, cur, false))
    }

    /// Unlock on behalf of `cur`. With `exactly_once` the mutex must be held
    /// with a recursion depth of one, as required before a condition wait.
    pub(crate) fn release(
        &self,
        cs: CriticalSection<'_>,
        cur: &'static OsTcb,
        exactly_once: bool,
    ) -> OsResult<()> {
        let m = self.state.get(cs);

        let owner = m.owner.ok_or(OsError::Inval)?;
        if !ptr::eq(owner, cur) {
            return Err(OsError::Perm);
        }

        if m.nesting > 1 {
            if exactly_once {
                return Err(OsError::Inval);
            }
            m.nesting -= 1;
            return Ok(());
        }

        // Restore owner's priority if it was boosted
        {
            let t = cur.inner(cs);
            t.prio = t.base_prio;
        }

        match m.pend_list.pop(cs) {
            Some(waiter) => {
                m.owner = Some(waiter);
                m.nesting = 1;
                Self::adjust_owner_prio(cs, m);
                sched::ready(cs, waiter, PendStatus::Ok);
            }
            None => {
                m.owner = None;
                m.nesting = 0;
            }
        }

        Ok(())
    }

    /// Recompute the owner's priority from its base and the most urgent waiter
    fn adjust_owner_prio(cs: CriticalSection<'_>, m: &mut MutexState) {
        let Some(owner) = m.owner else { return };
        let top = m.pend_list.head().map(|w| w.inner(cs).prio);
        let o = owner.inner(cs);
        o.prio = match top {
            Some(p) if p.is_higher_than(o.base_prio) => p,
            _ => o.base_prio,
        };
    }

    /// Check if mutex is owned
    pub fn is_locked(&self) -> bool {
        critical_section(|cs| self.state.get(cs).owner.is_some())
    }

    /// True if the calling thread owns the mutex
    pub fn is_owned_by_current(&self) -> bool {
        let cur = sched::current();
        critical_section(|cs| self.state.get(cs).owner.is_some_and(|o| ptr::eq(o, cur)))
    }
}

impl Default for OsMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Operations shared by [`Mutex`] and [`MutexRef`]
pub trait MutexBase {
    /// The kernel object behind this handle
    fn native_handle(&self) -> &OsMutex;

    /// Lock, waiting as long as needed
    fn lock(&self) -> Outcome<()> {
        self.native_handle().lock(Timeout::Forever).into()
    }

    /// Lock if the mutex is free, `WouldBlock` otherwise
    fn try_lock(&self) -> Outcome<()> {
        self.native_handle().lock(Timeout::NoWait).into()
    }

    /// Lock, waiting at most `timeout`
    fn try_lock_for(&self, timeout: Duration) -> Outcome<()> {
        self.native_handle().lock(Timeout::from(timeout)).into()
    }

    fn unlock(&self) -> Outcome<()> {
        self.native_handle().unlock().into()
    }

    /// Lock and return a guard that unlocks when dropped
    fn lock_guard(&self) -> Outcome<LockGuard<'_>> {
        let m = self.native_handle();
        m.lock(Timeout::Forever).map(|()| LockGuard { mutex: m }).into()
    }

    fn is_locked(&self) -> bool {
        self.native_handle().is_locked()
    }
}

/// Owning mutex handle
pub struct Mutex {
    inner: OsMutex,
}

impl Mutex {
    pub const fn new() -> Self {
        Mutex {
            inner: OsMutex::new(),
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl MutexBase for Mutex {
    #[inline]
    fn native_handle(&self) -> &OsMutex {
        &self.inner
    }
}

/// Referencing mutex handle
#[derive(Clone, Copy)]
pub struct MutexRef<'a> {
    inner: &'a OsMutex,
}

impl<'a> MutexRef<'a> {
    pub fn new<M: MutexBase + ?Sized>(m: &'a M) -> Self {
        MutexRef {
            inner: m.native_handle(),
        }
    }
}

impl<'a> From<&'a Mutex> for MutexRef<'a> {
    fn from(m: &'a Mutex) -> Self {
        MutexRef { inner: &m.inner }
    }
}

impl<'a> From<&'a OsMutex> for MutexRef<'a> {
    fn from(m: &'a OsMutex) -> Self {
        MutexRef { inner: m }
    }
}

impl MutexBase for MutexRef<'_> {
    #[inline]
    fn native_handle(&self) -> &OsMutex {
        self.inner
    }
}

/// Scoped lock; the mutex is unlocked when the guard is dropped
pub struct LockGuard<'a> {
    mutex: &'a OsMutex,
}

impl<'a> LockGuard<'a> {
    /// Lock `m` and hold it for the lifetime of the guard
    ///
    /// # Panics
    /// Panics if the mutex cannot be locked (recursion overflow).
    #[track_caller]
    pub fn new<M: MutexBase + ?Sized>(m: &'a M) -> Self {
        let mutex = m.native_handle();
        if let Err(e) = mutex.lock(Timeout::Forever) {
            panic!("LockGuard: lock failed: {}", e);
        }
        LockGuard { mutex }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let r = self.mutex.unlock();
        debug_assert!(r.is_ok(), "LockGuard: unlock failed");
    }
}

/// Movable lock ownership that may or may not hold its mutex
///
/// Unlike [`LockGuard`], a unique lock can be created without locking, can
/// lock and unlock repeatedly, and can hand its mutex back with
/// [`UniqueLock::release`]. It unlocks on drop only if it holds the lock.
pub struct UniqueLock<'a> {
    mutex: Option<&'a OsMutex>,
    owns: bool,
}

impl<'a> UniqueLock<'a> {
    /// Lock `m` and own the lock
    pub fn new<M: MutexBase + ?Sized>(m: &'a M) -> Outcome<Self> {
        let mutex = m.native_handle();
        mutex
            .lock(Timeout::Forever)
            .map(|()| UniqueLock { mutex: Some(mutex), owns: true })
            .into()
    }

    /// Bind `m` without locking it
    pub fn deferred<M: MutexBase + ?Sized>(m: &'a M) -> Self {
        UniqueLock {
            mutex: Some(m.native_handle()),
            owns: false,
        }
    }

    /// A lock bound to no mutex
    pub const fn unbound() -> Self {
        UniqueLock { mutex: None, owns: false }
    }

    fn acquire(&mut self, timeout: Timeout) -> OsResult<()> {
        let mutex = self.mutex.ok_or(OsError::Inval)?;
        if self.owns {
            return Err(OsError::Deadlk);
        }
        mutex.lock(timeout)?;
        self.owns = true;
        Ok(())
    }

    /// Lock, waiting as long as needed. `Inval` if unbound, `Deadlk` if
    /// the lock is held already.
    pub fn lock(&mut self) -> Outcome<()> {
        self.acquire(Timeout::Forever).into()
    }

    pub fn try_lock(&mut self) -> Outcome<()> {
        self.acquire(Timeout::NoWait).into()
    }

    pub fn try_lock_for(&mut self, timeout: Duration) -> Outcome<()> {
        self.acquire(Timeout::from(timeout)).into()
    }

    /// Unlock. `Perm` if the lock is not held.
    pub fn unlock(&mut self) -> Outcome<()> {
        let res = match (self.mutex, self.owns) {
            (None, _) => Err(OsError::Inval),
            (Some(_), false) => Err(OsError::Perm),
            (Some(m), true) => m.unlock().inspect(|_| self.owns = false),
        };
        res.into()
    }

    /// Give up the mutex without unlocking it. The caller becomes
    /// responsible for unlocking if the lock was held.
    pub fn release(&mut self) -> Option<&'a OsMutex> {
        self.owns = false;
        self.mutex.take()
    }

    pub fn owns_lock(&self) -> bool {
        self.owns
    }

    pub fn mutex(&self) -> Option<&'a OsMutex> {
        self.mutex
    }
}

impl Default for UniqueLock<'_> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl Drop for UniqueLock<'_> {
    fn drop(&mut self) {
        if let (true, Some(m)) = (self.owns, self.mutex) {
            let r = m.unlock();
            debug_assert!(r.is_ok(), "UniqueLock: unlock failed");
        }
    }
}
