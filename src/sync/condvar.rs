//! Condition variable
//!
//! A wait releases the mutex and enqueues the caller in one critical
//! section, so a notify issued after the caller released the mutex is
//! never lost. The mutex is re-acquired before the wait returns, whatever
//! its outcome.

use core::time::Duration;

use crate::clock;
use crate::critical::critical_section;
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::result::Outcome;
use crate::sched::{self, PendList};
use crate::sync::mutex::{MutexBase, OsMutex};
use crate::types::{PendOn, PendStatus, Tick, Timeout};

/// Kernel condition variable object
pub struct OsCondVar {
    pend_list: CsCell<PendList>,
}

impl OsCondVar {
    pub const fn new() -> Self {
        OsCondVar {
            pend_list: CsCell::new(PendList::new()),
        }
    }

    /// Wake the most urgent waiter
    pub fn notify_one(&self) {
        critical_section(|cs| {
            if let Some(waiter) = self.pend_list.get(cs).pop(cs) {
                sched::ready(cs, waiter, PendStatus::Ok);
            }
        })
    }

    /// Wake every waiter
    pub fn notify_all(&self) {
        critical_section(|cs| {
            let list = self.pend_list.get(cs);
            while let Some(waiter) = list.pop(cs) {
                sched::ready(cs, waiter, PendStatus::Ok);
            }
        })
    }

    /// Release `mutex`, wait for a notification until `deadline`, then
    /// re-acquire `mutex`.
    ///
    /// The caller must hold `mutex` exactly once: `Perm` if it does not own
    /// it, `Inval` if it is unlocked or locked recursively.
    pub(crate) fn wait_deadline(&self, mutex: &OsMutex, deadline: Option<Tick>) -> OsResult<()> {
        let cur = sched::current();

        critical_section(|cs| {
            mutex.release(cs, cur, true)?;
            if deadline.is_some_and(|d| clock::uptime_ticks() >= d) {
                return Ok(false);
            }
            sched::pend_prepare(cs, cur, PendOn::CondVar);
            self.pend_list.get(cs).insert_by_prio(cs, cur);
            Ok(true)
        })
        .and_then(|pending| {
            let status = if pending {
                sched::pend_wait(cur, deadline, |cs| self.pend_list.get(cs).remove(cs, cur))
            } else {
                PendStatus::Timeout
            };
            mutex.lock(Timeout::Forever)?;
            sched::pend_result(status)
        })
    }
}

impl Default for OsCondVar {
    fn default() -> Self {
        Self::new()
    }
}

fn deadline_after(timeout: Duration) -> Option<Tick> {
    Timeout::from(timeout).deadline(clock::uptime_ticks())
}

/// Operations shared by [`CondVar`] and [`CondVarRef`]
pub trait CondVarBase {
    /// The kernel object behind this handle
    fn native_handle(&self) -> &OsCondVar;

    fn notify_one(&self) -> Outcome<()> {
        self.native_handle().notify_one();
        Outcome::success()
    }

    fn notify_all(&self) -> Outcome<()> {
        self.native_handle().notify_all();
        Outcome::success()
    }

    /// Wait for a notification, releasing `mutex` while waiting
    fn wait<M: MutexBase + ?Sized>(&self, mutex: &M) -> Outcome<()> {
        self.native_handle()
            .wait_deadline(mutex.native_handle(), None)
            .into()
    }

    /// Wait at most `timeout` for a notification
    fn try_wait_for<M: MutexBase + ?Sized>(&self, mutex: &M, timeout: Duration) -> Outcome<()> {
        self.native_handle()
            .wait_deadline(mutex.native_handle(), deadline_after(timeout))
            .into()
    }

    /// Wait until `pred` returns true. `pred` is evaluated with `mutex` held.
    fn wait_until<M, P>(&self, mutex: &M, mut pred: P) -> Outcome<()>
    where
        M: MutexBase + ?Sized,
        P: FnMut() -> bool,
    {
        while !pred() {
            if let Err(e) = self.native_handle().wait_deadline(mutex.native_handle(), None) {
                return Outcome::err(e);
            }
        }
        Outcome::success()
    }

    /// Wait until `pred` returns true or `timeout` has passed. Fails with
    /// `TimedOut` if `pred` is still false at the deadline.
    fn try_wait_until_for<M, P>(&self, mutex: &M, timeout: Duration, mut pred: P) -> Outcome<()>
    where
        M: MutexBase + ?Sized,
        P: FnMut() -> bool,
    {
        let deadline = deadline_after(timeout);
        while !pred() {
            match self.native_handle().wait_deadline(mutex.native_handle(), deadline) {
                Ok(()) => {}
                Err(OsError::TimedOut) => {
                    return if pred() {
                        Outcome::success()
                    } else {
                        Outcome::err(OsError::TimedOut)
                    };
                }
                Err(e) => return Outcome::err(e),
            }
        }
        Outcome::success()
    }
}

/// Owning condition variable handle
pub struct CondVar {
    inner: OsCondVar,
}

impl CondVar {
    pub const fn new() -> Self {
        CondVar {
            inner: OsCondVar::new(),
        }
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

impl CondVarBase for CondVar {
    #[inline]
    fn native_handle(&self) -> &OsCondVar {
        &self.inner
    }
}

/// Referencing condition variable handle
#[derive(Clone, Copy)]
pub struct CondVarRef<'a> {
    inner: &'a OsCondVar,
}

impl<'a> From<&'a CondVar> for CondVarRef<'a> {
    fn from(c: &'a CondVar) -> Self {
        CondVarRef { inner: &c.inner }
    }
}

impl<'a> From<&'a OsCondVar> for CondVarRef<'a> {
    fn from(c: &'a OsCondVar) -> Self {
        CondVarRef { inner: c }
    }
}

impl CondVarBase for CondVarRef<'_> {
    #[inline]
    fn native_handle(&self) -> &OsCondVar {
        self.inner
    }
}
