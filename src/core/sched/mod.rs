//! Blocking and wake-up machinery
//!
//! Kernel objects block the calling thread in two steps. Inside the
//! object's critical section they call [`pend_prepare`] and link the thread
//! into their [`PendList`]. After leaving the section they call
//! [`pend_wait`], which parks the thread until a waker resolves the pend
//! through [`ready`], the deadline passes, or the thread is aborted.
//!
//! Requests from other threads (abort, suspend) are honoured at the next
//! [`checkpoint`], which every blocking path passes through.

mod pend_list;
mod poll_list;

pub use pend_list::PendList;
pub(crate) use poll_list::{PollList, PollNode, POLL_CANCELLED, POLL_READY};

use core::ptr;

use crate::critical::{critical_section, CriticalSection};
use crate::error::{OsError, OsResult};
use crate::port;
use crate::prio::ThreadPrio;
use crate::task::{OsTcb, ThreadId};
use crate::types::{PendOn, PendStatus, ThreadState, Tick, Timeout};

/// Control block of the calling thread
#[inline]
pub(crate) fn current() -> &'static OsTcb {
    port::current_tcb()
}

/// Mark `cur` as pending on `on`. The caller links it into a wait list.
pub(crate) fn pend_prepare(cs: CriticalSection<'_>, cur: &'static OsTcb, on: PendOn) {
    let t = cur.inner(cs);
    t.pend_on = on;
    t.pend_status = PendStatus::Pending;
    t.state = ThreadState::Pending;
    t.msg = ptr::null_mut();
}

/// Resolve the pend of `tcb` with `status` and wake it
pub(crate) fn ready(cs: CriticalSection<'_>, tcb: &'static OsTcb, status: PendStatus) {
    tcb.inner(cs).pend_status = status;
    port::wake(cs, tcb);
}

/// Block the calling thread until its pend is resolved.
///
/// `give_up` runs inside the critical section when the wait ends without a
/// waker (timeout or abort) and must unlink `cur` from every list it was
/// put on.
pub(crate) fn pend_wait<G>(cur: &'static OsTcb, deadline: Option<Tick>, mut give_up: G) -> PendStatus
where
    G: FnMut(CriticalSection<'_>),
{
    loop {
        let resolved = critical_section(|cs| {
            let (status, abort) = {
                let t = cur.inner(cs);
                (t.pend_status, t.abort_req)
            };

            let status = if status != PendStatus::Pending {
                status
            } else if abort {
                give_up(cs);
                PendStatus::Abort
            } else if deadline.is_some_and(|d| port::uptime_ticks() >= d) {
                give_up(cs);
                PendStatus::Timeout
            } else {
                return None;
            };

            let t = cur.inner(cs);
            t.pend_status = status;
            t.pend_on = PendOn::Nothing;
            t.state = ThreadState::Ready;
            Some(status)
        });

        if let Some(status) = resolved {
            checkpoint(cur);
            return status;
        }

        port::block(deadline);
    }
}

/// Map a resolved pend onto the error surface
pub(crate) fn pend_result(status: PendStatus) -> OsResult<()> {
    match status {
        PendStatus::Ok => Ok(()),
        PendStatus::Timeout => Err(OsError::TimedOut),
        PendStatus::Canceled => Err(OsError::Canceled),
        PendStatus::Reset => Err(OsError::Again),
        PendStatus::Abort | PendStatus::Pending => Err(OsError::Intr),
    }
}

/// Honour pending abort and suspend requests of the calling thread
pub(crate) fn checkpoint(cur: &'static OsTcb) {
    loop {
        let abort = critical_section(|cs| {
            let t = cur.inner(cs);
            if t.abort_req {
                Some(true)
            } else if t.suspend_req {
                t.state = ThreadState::Suspended;
                Some(false)
            } else {
                if t.state == ThreadState::Suspended {
                    t.state = ThreadState::Ready;
                }
                None
            }
        });

        match abort {
            Some(true) => port::exit_aborted(),
            Some(false) => port::block(None),
            None => return,
        }
    }
}

/// Hold a freshly created thread until it is started and its start delay
/// has passed
pub(crate) fn start_gate(cur: &'static OsTcb) {
    enum Gate {
        Go,
        Wait(Option<Tick>),
        Abort,
    }

    loop {
        let gate = critical_section(|cs| {
            let t = cur.inner(cs);
            if t.abort_req {
                return Gate::Abort;
            }
            if !t.started {
                return Gate::Wait(None);
            }
            match t.start_at {
                Some(at) if port::uptime_ticks() < at => Gate::Wait(Some(at)),
                _ => {
                    t.start_at = None;
                    t.state = ThreadState::Ready;
                    Gate::Go
                }
            }
        });

        match gate {
            Gate::Go => break,
            Gate::Wait(deadline) => port::block(deadline),
            Gate::Abort => port::exit_aborted(),
        }
    }

    checkpoint(cur);
}

/// Release a thread held by [`start_gate`]
pub(crate) fn start(id: ThreadId) -> OsResult<()> {
    critical_section(|cs| {
        if !id.is_current_instance(cs) {
            return Err(OsError::Srch);
        }
        let tcb = id.tcb();
        let t = tcb.inner(cs);
        match t.state {
            ThreadState::Terminated | ThreadState::Dormant => return Err(OsError::Srch),
            ThreadState::Prestart => {
                t.started = true;
                t.start_at = None;
            }
            _ => return Ok(()),
        }
        port::wake(cs, tcb);
        Ok(())
    })
}

/// Mark the calling thread terminated and wake its joiners
pub(crate) fn terminate(cs: CriticalSection<'_>, cur: &'static OsTcb) {
    let claim = {
        let t = cur.inner(cs);
        t.state = ThreadState::Terminated;
        t.abort_req = false;
        t.suspend_req = false;
        t.pend_on = PendOn::Nothing;
        t.stack_claim.take()
    };

    while let Some(waiter) = cur.inner(cs).join_list.pop(cs) {
        ready(cs, waiter, PendStatus::Ok);
    }

    if let Some(claim) = claim {
        claim.store(false, portable_atomic::Ordering::Release);
    }
}

/// Wait for the thread `id` to terminate
pub(crate) fn join(id: ThreadId, timeout: Timeout) -> OsResult<()> {
    let cur = current();
    let target = id.tcb();

    let pending = critical_section(|cs| {
        if !id.is_current_instance(cs) || target.inner(cs).state == ThreadState::Terminated {
            return Ok(false);
        }
        if ptr::eq(target, cur) {
            return Err(OsError::Deadlk);
        }
        if timeout.is_no_wait() {
            return Err(OsError::WouldBlock);
        }
        pend_prepare(cs, cur, PendOn::Join);
        target.inner(cs).join_list.insert_by_prio(cs, cur);
        Ok(true)
    })?;

    if !pending {
        return Ok(());
    }

    let deadline = timeout.deadline(port::uptime_ticks());
    let status = pend_wait(cur, deadline, |cs| target.inner(cs).join_list.remove(cs, cur));
    pend_result(status)
}

/// Terminate the thread `id` and wait until it is gone
pub(crate) fn abort(id: ThreadId) -> OsResult<()> {
    let cur = current();
    let target = id.tcb();

    let running = critical_section(|cs| {
        if !id.is_current_instance(cs) {
            return false;
        }
        let t = target.inner(cs);
        if matches!(t.state, ThreadState::Terminated | ThreadState::Dormant) {
            return false;
        }
        t.abort_req = true;
        port::wake(cs, target);
        true
    });

    if !running {
        return Ok(());
    }

    if ptr::eq(target, cur) {
        port::exit_aborted();
    }

    crate::debug!("aborting thread");
    join(id, Timeout::Forever)
}

/// Suspend the thread `id` at its next checkpoint
pub(crate) fn suspend(id: ThreadId) -> OsResult<()> {
    let cur = current();
    let target = id.tcb();

    critical_section(|cs| {
        if !id.is_current_instance(cs) {
            return Err(OsError::Srch);
        }
        let t = target.inner(cs);
        if t.state == ThreadState::Terminated {
            return Err(OsError::Srch);
        }
        t.suspend_req = true;
        Ok(())
    })?;

    if ptr::eq(target, cur) {
        checkpoint(cur);
    }
    Ok(())
}

/// Clear a suspend request of `id` and wake it if it is suspended
pub(crate) fn resume(id: ThreadId) -> OsResult<()> {
    critical_section(|cs| {
        if !id.is_current_instance(cs) {
            return Err(OsError::Srch);
        }
        let target = id.tcb();
        let t = target.inner(cs);
        if t.state == ThreadState::Terminated {
            return Err(OsError::Srch);
        }
        t.suspend_req = false;
        if t.state == ThreadState::Suspended {
            port::wake(cs, target);
        }
        Ok(())
    })
}

/// Sleep the calling thread. Returns the ticks left when it was woken
/// early by [`wakeup`], zero otherwise.
pub(crate) fn sleep(timeout: Timeout) -> Tick {
    let cur = current();

    if timeout.is_no_wait() {
        yield_now();
        return 0;
    }

    let deadline = timeout.deadline(port::uptime_ticks());
    critical_section(|cs| pend_prepare(cs, cur, PendOn::Sleep));

    match pend_wait(cur, deadline, |_| {}) {
        PendStatus::Ok => match deadline {
            Some(d) => d.saturating_sub(port::uptime_ticks()),
            None => Tick::MAX,
        },
        _ => 0,
    }
}

/// Cut the sleep of `id` short
pub(crate) fn wakeup(id: ThreadId) -> OsResult<()> {
    critical_section(|cs| {
        if !id.is_current_instance(cs) {
            return Err(OsError::Srch);
        }
        ready_if_pending(cs, id.tcb(), PendOn::Sleep);
        Ok(())
    })
}

/// Resolve the pend of `tcb` with `Ok` if it is still pending on `on`
pub(crate) fn ready_if_pending(cs: CriticalSection<'_>, tcb: &'static OsTcb, on: PendOn) -> bool {
    let t = tcb.inner(cs);
    if t.pend_on == on && t.pend_status == PendStatus::Pending {
        ready(cs, tcb, PendStatus::Ok);
        true
    } else {
        false
    }
}

/// Give other threads a chance to run
pub(crate) fn yield_now() {
    port::yield_now();
    checkpoint(current());
}

/// Priority of `id`
pub(crate) fn priority(id: ThreadId) -> OsResult<ThreadPrio> {
    critical_section(|cs| {
        if !id.is_current_instance(cs) {
            return Err(OsError::Srch);
        }
        Ok(id.tcb().inner(cs).prio)
    })
}

/// Change the base priority of `id`. An inherited boost that is more
/// urgent than the new priority stays in effect until it is released.
pub(crate) fn set_priority(id: ThreadId, prio: ThreadPrio) -> OsResult<()> {
    critical_section(|cs| {
        if !id.is_current_instance(cs) {
            return Err(OsError::Srch);
        }
        let t = id.tcb().inner(cs);
        let boosted = t.prio != t.base_prio && t.prio.is_higher_than(prio);
        t.base_prio = prio;
        if !boosted {
            t.prio = prio;
        }
        Ok(())
    })
}
