//! Hosted port
//!
//! Every kernel thread is an OS thread. Blocking is `park`/`unpark`, the
//! time base is derived from a process-wide [`Instant`]. Threads that were
//! not created through the kernel (the process main thread, test harness
//! threads) get a control block on first use.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use std::thread;
use std::time::Instant;

use super::Entry;
use crate::clock::{self, ticks_to_duration};
use crate::config::CFG_HOST_STACK_MIN;
use crate::critical::{critical_section, CriticalSection};
use crate::error::{OsError, OsResult};
use crate::sched;
use crate::task::{OsTcb, ThreadName};
use crate::types::{ThreadOptions, ThreadState, Tick};
use crate::{debug, error};

/// Port-specific part of a thread control block
pub(crate) struct PortTcb {
    thread: Option<thread::Thread>,
}

impl PortTcb {
    pub(crate) const fn new() -> Self {
        PortTcb { thread: None }
    }
}

/// Unwind payload used to terminate an aborted thread
struct ThreadAborted;

static EPOCH: OnceLock<Instant> = OnceLock::new();

thread_local! {
    static CURRENT: Cell<Option<&'static OsTcb>> = const { Cell::new(None) };
}

fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

pub(crate) fn uptime_ticks() -> Tick {
    clock::to_ticks(epoch().elapsed())
}

pub(crate) fn cycles() -> u64 {
    let ns = epoch().elapsed().as_nanos();
    if ns > u64::MAX as u128 { u64::MAX } else { ns as u64 }
}

pub(crate) fn current_tcb() -> &'static OsTcb {
    CURRENT.with(|c| match c.get() {
        Some(tcb) => tcb,
        None => {
            let tcb = adopt();
            c.set(Some(tcb));
            tcb
        }
    })
}

/// Give a thread the kernel did not create a control block of its own
fn adopt() -> &'static OsTcb {
    let tcb: &'static OsTcb = Box::leak(Box::new(OsTcb::new()));
    let me = thread::current();
    critical_section(|cs| {
        let t = tcb.inner(cs);
        t.generation = 1;
        t.state = ThreadState::Ready;
        t.started = true;
        t.name = ThreadName::from_str_truncate(me.name().unwrap_or("adopted"));
        t.port.thread = Some(me);
    });
    debug!("adopted foreign thread");
    tcb
}

pub(crate) fn thread_create(
    tcb: &'static OsTcb,
    entry: Entry,
    p1: usize,
    p2: usize,
    stack_size: usize,
) -> OsResult<()> {
    let name = critical_section(|cs| {
        let t = tcb.inner(cs);
        t.port.thread = None;
        t.name
    });

    let mut builder = thread::Builder::new().stack_size(stack_size.max(CFG_HOST_STACK_MIN));
    if !name.is_empty() {
        builder = builder.name(name.as_str().into());
    }

    match builder.spawn(move || run(tcb, entry, p1, p2)) {
        Ok(handle) => {
            critical_section(|cs| tcb.inner(cs).port.thread = Some(handle.thread().clone()));
            Ok(())
        }
        Err(_err) => {
            error!("host thread spawn failed");
            Err(OsError::NoMem)
        }
    }
}

fn run(tcb: &'static OsTcb, entry: Entry, p1: usize, p2: usize) {
    CURRENT.with(|c| c.set(Some(tcb)));
    let essential = critical_section(|cs| {
        let t = tcb.inner(cs);
        t.port.thread = Some(thread::current());
        t.options.contains(ThreadOptions::ESSENTIAL)
    });

    // SAFETY: `entry` and its arguments were paired by the thread launcher.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| unsafe { entry(p1, p2) }));

    let failed = match outcome {
        Ok(()) => false,
        Err(payload) if payload.is::<ThreadAborted>() => {
            debug!("thread aborted");
            true
        }
        Err(_) => {
            error!("thread terminated by panic");
            true
        }
    };

    critical_section(|cs| sched::terminate(cs, tcb));
    debug!("thread terminated");

    if essential && failed {
        error!("essential thread terminated abnormally");
        std::process::abort();
    }
}

pub(crate) fn block(deadline: Option<Tick>) {
    match deadline {
        None => thread::park(),
        Some(deadline) => {
            let now = uptime_ticks();
            if deadline > now {
                thread::park_timeout(ticks_to_duration(deadline - now));
            }
        }
    }
}

pub(crate) fn wake(cs: CriticalSection<'_>, tcb: &'static OsTcb) {
    if let Some(thread) = &tcb.inner(cs).port.thread {
        thread.unpark();
    }
}

pub(crate) fn yield_now() {
    thread::yield_now();
}

pub(crate) fn exit_aborted() -> ! {
    panic::resume_unwind(Box::new(ThreadAborted))
}
