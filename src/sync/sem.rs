//! Semaphore implementation
//!
//! Counting semaphores for thread synchronization and resource counting.
//! The count never exceeds the limit given at creation; giving a full
//! semaphore is not an error.

use core::time::Duration;

use crate::critical::critical_section;
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::result::Outcome;
use crate::sched::{self, PendList, PollList, POLL_READY};
use crate::types::{PendOn, PendStatus, SemCount, Timeout};

pub(crate) struct SemState {
    /// Threads waiting on this semaphore
    pend_list: PendList,
    /// Event sets watching this semaphore
    pub(crate) poll_list: PollList,
    /// Current count
    count: SemCount,
    /// Upper bound of the count
    limit: SemCount,
}

impl SemState {
    #[inline]
    pub(crate) fn is_available(&self) -> bool {
        self.count > 0
    }
}

/// Counting semaphore
pub struct OsSem {
    state: CsCell<SemState>,
}

impl OsSem {
    /// Create a new semaphore
    ///
    /// # Panics
    /// Panics (at compile time in a `const` context) if `limit` is zero or
    /// `initial` exceeds `limit`.
    pub const fn new(initial: SemCount, limit: SemCount) -> Self {
        assert!(limit > 0, "semaphore limit must be non-zero");
        assert!(initial <= limit, "semaphore initial count exceeds limit");
        OsSem {
            state: CsCell::new(SemState {
                pend_list: PendList::new(),
                poll_list: PollList::new(),
                count: initial,
                limit,
            }),
        }
    }

    pub(crate) fn state(&self) -> &CsCell<SemState> {
        &self.state
    }

    /// Wait on (take) the semaphore
    ///
    /// # Returns
    /// * `Ok(())` - Semaphore acquired
    /// * `Err(OsError::WouldBlock)` - Non-blocking and not available
    /// * `Err(OsError::TimedOut)` - Timeout expired
    /// * `Err(OsError::Again)` - Semaphore was reset while waiting
    pub fn take(&self, timeout: Timeout) -> OsResult<()> {
        let cur = sched::current();

        let pending = critical_section(|cs| {
            let s = self.state.get(cs);
            if s.count > 0 {
                s.count -= 1;
                return Ok(false);
            }

            if timeout.is_no_wait() {
                return Err(OsError::WouldBlock);
            }

            sched::pend_prepare(cs, cur, PendOn::Semaphore);
            s.pend_list.insert_by_prio(cs, cur);
            Ok(true)
        })?;

        if !pending {
            return Ok(());
        }

        let deadline = timeout.deadline(crate::clock::uptime_ticks());
        let status = sched::pend_wait(cur, deadline, |cs| {
            self.state.get(cs).pend_list.remove(cs, cur)
        });
        sched::pend_result(status)
    }

    /// Signal (give) the semaphore
    ///
    /// The most urgent waiter receives the semaphore directly. Without
    /// waiters the count is incremented, saturating at the limit, and
    /// watching event sets are notified.
    pub fn give(&self) {
        critical_section(|cs| {
            let s = self.state.get(cs);
            match s.pend_list.pop(cs) {
                Some(waiter) => sched::ready(cs, waiter, PendStatus::Ok),
                None => {
                    if s.count < s.limit {
                        s.count += 1;
                    }
                    s.poll_list.signal(cs, POLL_READY);
                }
            }
        })
    }

    /// Set the count to zero. Waiting threads fail with `Again`.
    pub fn reset(&self) {
        critical_section(|cs| {
            let s = self.state.get(cs);
            s.count = 0;
            while let Some(waiter) = s.pend_list.pop(cs) {
                sched::ready(cs, waiter, PendStatus::Reset);
            }
        })
    }

    /// Get current semaphore count
    pub fn count(&self) -> SemCount {
        critical_section(|cs| self.state.get(cs).count)
    }

    /// Get the count limit
    pub fn limit(&self) -> SemCount {
        critical_section(|cs| self.state.get(cs).limit)
    }
}

/// Operations shared by [`Sem`] and [`SemRef`]
pub trait SemBase {
    /// The kernel object behind this handle
    fn native_handle(&self) -> &OsSem;

    /// Take the semaphore, waiting as long as needed
    fn take(&self) -> Outcome<()> {
        self.native_handle().take(Timeout::Forever).into()
    }

    /// Take the semaphore if available, `WouldBlock` otherwise
    fn try_take(&self) -> Outcome<()> {
        self.native_handle().take(Timeout::NoWait).into()
    }

    /// Take the semaphore, waiting at most `timeout`
    fn try_take_for(&self, timeout: Duration) -> Outcome<()> {
        self.native_handle().take(Timeout::from(timeout)).into()
    }

    fn give(&self) {
        self.native_handle().give()
    }

    fn reset(&self) {
        self.native_handle().reset()
    }

    fn count(&self) -> SemCount {
        self.native_handle().count()
    }

    fn limit(&self) -> SemCount {
        self.native_handle().limit()
    }
}

/// Owning semaphore handle
pub struct Sem {
    inner: OsSem,
}

impl Sem {
    /// Semaphore with an initial count and a count limit
    pub const fn new(initial: SemCount, limit: SemCount) -> Self {
        Sem {
            inner: OsSem::new(initial, limit),
        }
    }

    /// Semaphore with an initial count and no practical limit
    pub const fn with_count(initial: SemCount) -> Self {
        Self::new(initial, SemCount::MAX)
    }
}

impl Default for Sem {
    fn default() -> Self {
        Self::with_count(0)
    }
}

impl SemBase for Sem {
    #[inline]
    fn native_handle(&self) -> &OsSem {
        &self.inner
    }
}

/// Referencing semaphore handle
#[derive(Clone, Copy)]
pub struct SemRef<'a> {
    inner: &'a OsSem,
}

impl<'a> SemRef<'a> {
    pub fn new<S: SemBase + ?Sized>(s: &'a S) -> Self {
        SemRef {
            inner: s.native_handle(),
        }
    }
}

impl<'a> From<&'a Sem> for SemRef<'a> {
    fn from(s: &'a Sem) -> Self {
        SemRef { inner: &s.inner }
    }
}

impl<'a> From<&'a OsSem> for SemRef<'a> {
    fn from(s: &'a OsSem) -> Self {
        SemRef { inner: s }
    }
}

impl SemBase for SemRef<'_> {
    #[inline]
    fn native_handle(&self) -> &OsSem {
        self.inner
    }
}
