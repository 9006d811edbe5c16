//! Fixed-size set of poll events

use core::ops::{Index, IndexMut};
use core::time::Duration;

use crate::clock;
use crate::critical::{critical_section, CriticalSection};
use crate::error::{OsError, OsResult};
use crate::result::Outcome;
use crate::sched::{self, POLL_CANCELLED, POLL_READY};
use crate::types::{PendOn, Timeout};

use super::event::PollEvent;

/// `N` event slots waited on together.
///
/// A wait clears every slot, then returns as soon as at least one slot is
/// ready. Semaphore and queue slots are level-triggered: they are ready
/// whenever the object has something to take at the time of the wait.
/// Signal slots are edge-triggered: only a raise during the wait counts.
/// After a wait each slot tells whether it was ready or cancelled.
pub struct EventSet<'a, const N: usize> {
    events: [PollEvent<'a>; N],
}

impl<'a, const N: usize> EventSet<'a, N> {
    pub fn new(events: [PollEvent<'a>; N]) -> Self {
        EventSet { events }
    }

    /// Wait until at least one slot is ready
    pub fn wait(&mut self) -> Outcome<()> {
        self.poll(Timeout::Forever).into()
    }

    /// Check the slots without waiting. `WouldBlock` if none is ready.
    pub fn try_wait(&mut self) -> Outcome<()> {
        self.poll(Timeout::NoWait).into()
    }

    /// Wait at most `timeout` for a slot to become ready
    pub fn try_wait_for(&mut self, timeout: Duration) -> Outcome<()> {
        self.poll(Timeout::from(timeout)).into()
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn get(&self, idx: usize) -> Option<&PollEvent<'a>> {
        self.events.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut PollEvent<'a>> {
        self.events.get_mut(idx)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, PollEvent<'a>> {
        self.events.iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, PollEvent<'a>> {
        self.events.iter_mut()
    }

    fn unregister_all(&self, cs: CriticalSection<'_>) {
        for ev in &self.events {
            ev.unregister(cs);
        }
    }

    fn poll(&mut self, timeout: Timeout) -> OsResult<()> {
        let cur = sched::current();
        let deadline = timeout.deadline(clock::uptime_ticks());

        let pending = critical_section(|cs| {
            for ev in &self.events {
                ev.arm(cs);
            }

            // check every slot so each one reports its own readiness
            let mut any = false;
            for ev in &self.events {
                any |= ev.check(cs);
            }
            if any {
                return Ok(false);
            }
            if timeout.is_no_wait() {
                return Err(OsError::WouldBlock);
            }

            sched::pend_prepare(cs, cur, PendOn::Poll);
            for ev in &self.events {
                ev.register(cs, cur);
            }
            Ok(true)
        })?;

        if !pending {
            return Ok(());
        }

        let this = &*self;
        let status = sched::pend_wait(cur, deadline, |cs| this.unregister_all(cs));

        let flags = critical_section(|cs| {
            this.unregister_all(cs);
            this.events.iter().fold(0u8, |acc, ev| acc | ev.state(cs))
        });

        if flags & POLL_READY != 0 {
            Ok(())
        } else if flags & POLL_CANCELLED != 0 {
            Err(OsError::Canceled)
        } else {
            sched::pend_result(status).and(Err(OsError::TimedOut))
        }
    }
}

impl<'a, const N: usize> From<[PollEvent<'a>; N]> for EventSet<'a, N> {
    fn from(events: [PollEvent<'a>; N]) -> Self {
        Self::new(events)
    }
}

impl<'a, const N: usize> Index<usize> for EventSet<'a, N> {
    type Output = PollEvent<'a>;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.events[idx]
    }
}

impl<const N: usize> IndexMut<usize> for EventSet<'_, N> {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.events[idx]
    }
}

impl<'s, 'a, const N: usize> IntoIterator for &'s EventSet<'a, N> {
    type Item = &'s PollEvent<'a>;
    type IntoIter = core::slice::Iter<'s, PollEvent<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Build an [`EventSet`] from handles, one slot per handle.
///
/// ```ignore
/// let mut set = event_set![&sem, &fifo, PollSource::Ignore, &signal];
/// ```
#[macro_export]
macro_rules! event_set {
    ($($src:expr),* $(,)?) => {
        $crate::poll::EventSet::new([$($crate::poll::PollEvent::new($src)),*])
    };
}
