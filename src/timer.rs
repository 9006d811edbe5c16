//! Software timers
//!
//! A timer expires once after an initial duration and then, if it has a
//! non-zero period, every period. Each expiry bumps the timer's status
//! counter and runs the optional expiry callback on the timer service
//! thread. Stopping a running timer runs the optional stop callback on the
//! caller's thread.
//!
//! The service thread is a kernel thread started with the first timer. It
//! sleeps until the earliest deadline of the running timers and is woken
//! early when a timer is started or stopped. Threads waiting in
//! [`Timer::sync`] pend like on any other kernel object, so timeouts,
//! suspension and abort reach them there.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use core::mem;
use core::ptr;

use portable_atomic::{AtomicBool, Ordering};

use crate::clock::{self, ticks_to_duration};
use crate::config::CFG_TIMER_STACK_SIZE;
use crate::critical::{critical_section, CriticalSection};
use crate::cs_cell::CsCell;
use crate::prio::ThreadPrio;
use crate::sched::{self, PendList};
use crate::task::OsTcb;
use crate::thread::{self, ThreadAttr, ThreadData, ThreadStack};
use crate::types::{PendOn, PendStatus, Tick};
use crate::{debug, error};

type Callback = Box<dyn Fn() + Send + Sync + 'static>;

struct TimerState {
    running: bool,
    /// Expiries since the status was last read
    status: u32,
    next: Option<Tick>,
    period: Tick,
    /// Threads blocked in `sync`
    sync_list: PendList,
}

struct TimerShared {
    state: CsCell<TimerState>,
    on_expiry: Option<Callback>,
    on_stop: Option<Callback>,
}

impl TimerShared {
    fn state<'a>(&'a self, cs: CriticalSection<'a>) -> &'a mut TimerState {
        self.state.get(cs)
    }
}

struct Service {
    /// Running timers
    timers: Vec<Arc<TimerShared>>,
    tcb: Option<&'static OsTcb>,
    /// Expiry callbacks of a batch are being run
    firing: bool,
    /// Threads in `stop` waiting for the running batch to finish
    idle_list: PendList,
}

static SERVICE: CsCell<Service> = CsCell::new(Service {
    timers: Vec::new(),
    tcb: None,
    firing: false,
    idle_list: PendList::new(),
});

static SERVICE_STARTED: AtomicBool = AtomicBool::new(false);
static SERVICE_TD: ThreadData = ThreadData::new();
static SERVICE_STK: ThreadStack<CFG_TIMER_STACK_SIZE> = ThreadStack::new();

/// Start the service thread unless it runs already
fn ensure_service() -> bool {
    if SERVICE_STARTED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return true;
    }

    let attr = ThreadAttr::new().with_prio(ThreadPrio::highest_preempt());
    match thread::spawn_detached(&SERVICE_TD, &SERVICE_STK, &attr, service) {
        Ok(_) => {
            debug!("timer service started");
            true
        }
        Err(_e) => {
            error!("timer service thread spawn failed");
            SERVICE_STARTED.store(false, Ordering::Release);
            false
        }
    }
}

/// Wake the service so it picks up a changed timer set
fn kick(cs: CriticalSection<'_>, svc: &Service) {
    if let Some(tcb) = svc.tcb {
        sched::ready_if_pending(cs, tcb, PendOn::Timer);
    }
}

enum Step {
    Fire(Vec<Arc<TimerShared>>),
    Sleep(Option<Tick>),
}

fn service() {
    let cur = sched::current();
    critical_section(|cs| SERVICE.get(cs).tcb = Some(cur));

    loop {
        let step = critical_section(|cs| {
            let now = clock::uptime_ticks();
            let svc = SERVICE.get(cs);
            let mut due = Vec::new();

            svc.timers.retain(|timer| {
                let s = timer.state(cs);
                let Some(next) = s.next else {
                    return false;
                };
                if next > now {
                    return true;
                }

                s.status = s.status.saturating_add(1);
                if s.period == 0 {
                    s.running = false;
                    s.next = None;
                } else {
                    s.next = Some(next.saturating_add(s.period));
                }
                while let Some(waiter) = s.sync_list.pop(cs) {
                    sched::ready(cs, waiter, PendStatus::Ok);
                }
                due.push(Arc::clone(timer));
                s.running
            });

            if !due.is_empty() {
                svc.firing = true;
                return Step::Fire(due);
            }

            let earliest = svc
                .timers
                .iter()
                .filter_map(|timer| timer.state(cs).next)
                .min();
            sched::pend_prepare(cs, cur, PendOn::Timer);
            Step::Sleep(earliest)
        });

        match step {
            Step::Fire(due) => {
                for timer in &due {
                    if let Some(on_expiry) = &timer.on_expiry {
                        if panic::catch_unwind(AssertUnwindSafe(on_expiry)).is_err() {
                            error!("timer expiry callback panicked");
                        }
                    }
                }
                critical_section(|cs| {
                    let svc = SERVICE.get(cs);
                    svc.firing = false;
                    while let Some(waiter) = svc.idle_list.pop(cs) {
                        sched::ready(cs, waiter, PendStatus::Ok);
                    }
                });
            }
            Step::Sleep(deadline) => {
                sched::pend_wait(cur, deadline, |_| {});
            }
        }
    }
}

/// A software timer
pub struct Timer {
    shared: Arc<TimerShared>,
}

impl Timer {
    /// A timer without callbacks, observed through [`Timer::status`] and
    /// [`Timer::sync`]
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// A timer running `on_expiry` at every expiry
    pub fn with_expiry<E>(on_expiry: E) -> Self
    where
        E: Fn() + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(on_expiry)), None)
    }

    /// A timer running `on_expiry` at every expiry and `on_stop` when it is
    /// stopped while running
    pub fn with_callbacks<E, S>(on_expiry: E, on_stop: S) -> Self
    where
        E: Fn() + Send + Sync + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(on_expiry)), Some(Box::new(on_stop)))
    }

    fn build(on_expiry: Option<Callback>, on_stop: Option<Callback>) -> Self {
        Timer {
            shared: Arc::new(TimerShared {
                state: CsCell::new(TimerState {
                    running: false,
                    status: 0,
                    next: None,
                    period: 0,
                    sync_list: PendList::new(),
                }),
                on_expiry,
                on_stop,
            }),
        }
    }

    /// (Re)start the timer: first expiry after `initial`, then every
    /// `period`. A zero period makes a one-shot timer. Restarting resets
    /// the status.
    pub fn start(&self, initial: Duration, period: Duration) {
        if !ensure_service() {
            return;
        }

        critical_section(|cs| {
            let s = self.shared.state(cs);
            s.running = true;
            s.status = 0;
            s.next = Some(clock::uptime_ticks().saturating_add(clock::to_ticks_ceil(initial)));
            s.period = clock::to_ticks_ceil(period);

            let svc = SERVICE.get(cs);
            if !svc.timers.iter().any(|t| Arc::ptr_eq(t, &self.shared)) {
                svc.timers.push(Arc::clone(&self.shared));
            }
            kick(cs, svc);
        });
    }

    /// Start a one-shot timer
    pub fn start_once(&self, initial: Duration) {
        self.start(initial, Duration::ZERO)
    }

    /// Stop the timer. Threads blocked in [`Timer::sync`] return, and an
    /// expiry callback already under way finishes before this returns.
    pub fn stop(&self) {
        let cur = sched::current();

        let (was_running, busy) = critical_section(|cs| {
            let s = self.shared.state(cs);
            let was_running = s.running;
            s.running = false;
            s.next = None;
            while let Some(waiter) = s.sync_list.pop(cs) {
                sched::ready(cs, waiter, PendStatus::Ok);
            }

            let svc = SERVICE.get(cs);
            svc.timers.retain(|t| !Arc::ptr_eq(t, &self.shared));
            kick(cs, svc);

            let on_service = svc.tcb.is_some_and(|tcb| ptr::eq(tcb, cur));
            // an unwinding thread must not pend
            let busy = svc.firing && !on_service && !std::thread::panicking();
            if busy {
                sched::pend_prepare(cs, cur, PendOn::Timer);
                svc.idle_list.insert_by_prio(cs, cur);
            }
            (was_running, busy)
        });

        if busy {
            sched::pend_wait(cur, None, |cs| SERVICE.get(cs).idle_list.remove(cs, cur));
        }

        if was_running {
            debug!("timer stopped");
            if let Some(on_stop) = &self.shared.on_stop {
                on_stop();
            }
        }
    }

    /// Expiries since the status was last read. Resets the status.
    pub fn status(&self) -> u32 {
        critical_section(|cs| mem::take(&mut self.shared.state(cs).status))
    }

    /// Wait for the next expiry unless one happened since the status was
    /// last read. Returns the status, which is zero if the timer is or
    /// becomes stopped. Resets the status.
    pub fn sync(&self) -> u32 {
        let cur = sched::current();

        let done = critical_section(|cs| {
            let s = self.shared.state(cs);
            if s.status > 0 {
                return Some(mem::take(&mut s.status));
            }
            if !s.running {
                return Some(0);
            }
            sched::pend_prepare(cs, cur, PendOn::Timer);
            s.sync_list.insert_by_prio(cs, cur);
            None
        });
        if let Some(status) = done {
            return status;
        }

        sched::pend_wait(cur, None, |cs| self.shared.state(cs).sync_list.remove(cs, cur));
        self.status()
    }

    /// Time until the next expiry, zero if the timer is not running
    pub fn remaining_time(&self) -> Duration {
        critical_section(|cs| {
            self.shared.state(cs).next.map_or(Duration::ZERO, |next| {
                ticks_to_duration(next.saturating_sub(clock::uptime_ticks()))
            })
        })
    }

    pub fn is_running(&self) -> bool {
        critical_section(|cs| self.shared.state(cs).running)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
