//! Operations on the calling thread

use core::time::Duration;

use crate::clock::{self, CycleClock, TimePoint, UptimeClock};
use crate::critical::critical_section;
use crate::port;
use crate::prio::ThreadPrio;
use crate::sched;
use crate::task::ThreadId;
use crate::types::Timeout;

/// Id of the calling thread
pub fn get_id() -> ThreadId {
    let cur = sched::current();
    critical_section(|cs| ThreadId::of(cs, cur))
}

/// Let other threads run
pub fn yield_now() {
    sched::yield_now()
}

/// Sleep for `d`. Returns the part of `d` left when the sleep was cut
/// short by [`Thread::wakeup`](super::Thread::wakeup), zero otherwise.
pub fn sleep_for(d: Duration) -> Duration {
    let left = sched::sleep(Timeout::from(d));
    clock::ticks_to_duration(left).min(d)
}

/// Sleep until the uptime clock reaches `tp`
pub fn sleep_until(tp: TimePoint) {
    loop {
        let now = UptimeClock::now();
        if tp <= now {
            break;
        }
        sleep_for(tp - now);
    }
}

/// Spin without blocking for `d`
pub fn busy_wait_for(d: Duration) {
    let until = CycleClock::now() + d;
    while CycleClock::now() < until {
        core::hint::spin_loop();
    }
}

/// Terminate the calling thread
pub fn abort() -> ! {
    port::exit_aborted()
}

/// Suspend the calling thread until another thread resumes it
pub fn suspend() {
    let res = sched::suspend(get_id());
    debug_assert!(res.is_ok());
}

/// Current (possibly inherited) priority of the calling thread
pub fn priority() -> ThreadPrio {
    let cur = sched::current();
    critical_section(|cs| cur.inner(cs).prio)
}

pub fn set_priority(prio: ThreadPrio) {
    let res = sched::set_priority(get_id(), prio);
    debug_assert!(res.is_ok());
}
