//! Thread launching and thread handles
//!
//! A thread runs on caller-provided storage: a [`ThreadData`] for its
//! control block and a [`ThreadStack`] for its stack. The closure and its
//! arguments travel to the new thread in a package placed at the tail of
//! the stack region, or in memory from a [`ThreadAlloc`]; no launch path
//! touches the heap on its own.
//!
//! A [`Thread`] handle owns the thread it is bound to. Dropping a bound
//! handle aborts the thread; [`Thread::detach`] lets it run on unowned.

mod attr;
mod package;
mod stack;
pub mod this_thread;

pub use attr::ThreadAttr;
pub use package::Invoke;
pub use stack::{ThreadData, ThreadStack};

use core::alloc::Layout;
use core::fmt;
use core::time::Duration;

use portable_atomic::{AtomicBool, Ordering};

use crate::critical::critical_section;
use crate::error::{OsError, OsResult};
use crate::mem::ThreadAlloc;
use crate::port::{self, Entry};
use crate::prio::ThreadPrio;
use crate::result::Outcome;
use crate::sched;
use crate::task::{OsTcb, ThreadId, ThreadName};
use crate::types::{PendOn, PendStatus, ThreadState, Timeout};
use crate::{debug, warn};

use package::{Package, StackFit, WordFit};

/// Prepare `tcb` for a new thread described by `attr`. The stack claim is
/// given back if the control block still hosts a live thread.
fn reserve(tcb: &'static OsTcb, claim: &'static AtomicBool, attr: &ThreadAttr) -> OsResult<ThreadId> {
    critical_section(|cs| {
        let t = tcb.inner(cs);
        if !matches!(t.state, ThreadState::Dormant | ThreadState::Terminated) {
            claim.store(false, Ordering::Release);
            return Err(OsError::Busy);
        }

        t.generation = t.generation.wrapping_add(1);
        t.name = ThreadName::new();
        t.prio = attr.prio();
        t.base_prio = attr.prio();
        t.options = attr.options();
        t.state = ThreadState::Prestart;
        t.pend_on = PendOn::Nothing;
        t.pend_status = PendStatus::Ok;
        t.abort_req = false;
        t.suspend_req = false;
        t.started = !attr.is_suspended();
        t.start_at = match attr.delay() {
            Timeout::Ticks(n) => Some(port::uptime_ticks().saturating_add(n)),
            Timeout::NoWait | Timeout::Forever => None,
        };
        t.stack_claim = Some(claim);
        Ok(ThreadId::of(cs, tcb))
    })
}

/// Undo [`reserve`] for a thread that was never launched
fn abandon(id: ThreadId) {
    critical_section(|cs| {
        let t = id.tcb().inner(cs);
        t.state = ThreadState::Dormant;
        if let Some(claim) = t.stack_claim.take() {
            claim.store(false, Ordering::Release);
        }
    })
}

fn launch(id: ThreadId, entry: Entry, p1: usize, p2: usize, stack_size: usize) -> OsResult<()> {
    port::thread_create(id.tcb(), entry, p1, p2, stack_size)?;
    debug!("thread created");
    Ok(())
}

fn spawn_on_stack<F, A, const N: usize>(
    td: &'static ThreadData,
    stack: &'static ThreadStack<N>,
    attr: &ThreadAttr,
    pkg: Package<F, A>,
) -> OsResult<ThreadId>
where
    F: Invoke<A>,
{
    let claim = stack.try_claim()?;
    let id = reserve(td.tcb(), claim, attr)?;

    let base = stack.base();
    let offset = package::tail_offset::<Package<F, A>>(base, N);
    // SAFETY: the claim gives this launch the region to itself, and the
    // offset leaves room for an aligned package inside it.
    let slot = unsafe { base.add(offset) }.cast::<Package<F, A>>();
    unsafe { slot.write(pkg) };

    if let Err(e) = launch(id, package::stack_trampoline::<F, A>, slot as usize, 0, offset) {
        // SAFETY: the thread never ran, the package is still owned here.
        drop(unsafe { slot.read() });
        abandon(id);
        return Err(e);
    }
    Ok(id)
}

fn spawn_in<F, A, H, const N: usize>(
    td: &'static ThreadData,
    stack: &'static ThreadStack<N>,
    attr: &ThreadAttr,
    alloc: &'static H,
    pkg: Package<F, A>,
) -> OsResult<ThreadId>
where
    F: Invoke<A>,
    H: ThreadAlloc + 'static,
{
    let layout = Layout::new::<Package<F, A>>();
    let mem = alloc.allocate(layout)?;
    let slot = mem.as_ptr().cast::<Package<F, A>>();

    let id = stack
        .try_claim()
        .and_then(|claim| reserve(td.tcb(), claim, attr))
        .inspect_err(|_| {
            // SAFETY: nothing was written to the block yet.
            unsafe { alloc.deallocate(mem, layout) }
        })?;

    // SAFETY: the block is valid for `layout` and owned by this launch.
    unsafe { slot.write(pkg) };

    let entry = package::alloc_trampoline::<F, A, H>;
    if let Err(e) = launch(id, entry, slot as usize, alloc as *const H as usize, N) {
        // SAFETY: the thread never ran, package and block are still owned here.
        unsafe {
            drop(slot.read());
            alloc.deallocate(mem, layout);
        }
        abandon(id);
        return Err(e);
    }
    Ok(id)
}

fn spawn_raw<const N: usize>(
    td: &'static ThreadData,
    stack: &'static ThreadStack<N>,
    attr: &ThreadAttr,
    entry: Entry,
    p1: usize,
    p2: usize,
) -> OsResult<ThreadId> {
    let claim = stack.try_claim()?;
    let id = reserve(td.tcb(), claim, attr)?;
    launch(id, entry, p1, p2, N).inspect_err(|_| abandon(id))?;
    Ok(id)
}

/// Run `f` on a new unowned thread, reporting failure instead of panicking
pub(crate) fn spawn_detached<const N: usize>(
    td: &'static ThreadData,
    stack: &'static ThreadStack<N>,
    attr: &ThreadAttr,
    f: fn(),
) -> OsResult<ThreadId> {
    spawn_raw(td, stack, attr, package::fn_trampoline, package::fn_to_word(f), 0)
}

#[track_caller]
fn created(res: OsResult<ThreadId>) -> Thread {
    match res {
        Ok(id) => Thread::from_id(id),
        Err(e) => panic!("thread creation failed: {}", e),
    }
}

/// Handle of a thread
///
/// A handle is either bound to a thread or unbound. Every operation on an
/// unbound handle fails with `Inval`.
pub struct Thread {
    id: Option<ThreadId>,
}

impl Thread {
    /// A handle bound to no thread
    pub const fn unbound() -> Self {
        Thread { id: None }
    }

    /// A handle owning the thread `id`
    pub const fn from_id(id: ThreadId) -> Self {
        Thread { id: Some(id) }
    }

    /// Run `f` on a new thread. `f` is packaged at the tail of `stack`.
    ///
    /// # Panics
    /// Panics if `td` or `stack` still host a live thread, or if the port
    /// cannot create the thread. A closure too large for the stack is
    /// rejected at compile time.
    #[track_caller]
    pub fn new<F, const N: usize>(
        td: &'static ThreadData,
        stack: &'static ThreadStack<N>,
        attr: &ThreadAttr,
        f: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_args(td, stack, attr, f, ())
    }

    /// Run `f` with the arguments `args` (a tuple of up to five values) on
    /// a new thread. See [`Thread::new`].
    #[track_caller]
    pub fn with_args<F, A, const N: usize>(
        td: &'static ThreadData,
        stack: &'static ThreadStack<N>,
        attr: &ThreadAttr,
        f: F,
        args: A,
    ) -> Self
    where
        F: Invoke<A>,
    {
        #[allow(clippy::let_unit_value)]
        let () = StackFit::<Package<F, A>, N>::OK;
        created(spawn_on_stack(td, stack, attr, Package::new(f, args)))
    }

    /// Run `f` on a new thread, packaging it in memory from `alloc`.
    ///
    /// Fails with the allocator's error if it has no room for the package,
    /// or with `Busy` if `td` or `stack` still host a live thread.
    pub fn new_in<F, H, const N: usize>(
        td: &'static ThreadData,
        stack: &'static ThreadStack<N>,
        attr: &ThreadAttr,
        alloc: &'static H,
        f: F,
    ) -> Outcome<Self>
    where
        F: FnOnce() + Send + 'static,
        H: ThreadAlloc + 'static,
    {
        Self::with_args_in(td, stack, attr, alloc, f, ())
    }

    /// [`Thread::new_in`] with arguments
    pub fn with_args_in<F, A, H, const N: usize>(
        td: &'static ThreadData,
        stack: &'static ThreadStack<N>,
        attr: &ThreadAttr,
        alloc: &'static H,
        f: F,
        args: A,
    ) -> Outcome<Self>
    where
        F: Invoke<A>,
        H: ThreadAlloc + 'static,
    {
        spawn_in(td, stack, attr, alloc, Package::new(f, args))
            .map(Thread::from_id)
            .into()
    }

    /// Run `f(arg)` on a new thread with `arg` carried in a machine word,
    /// without any package. `arg` larger than a word is rejected at
    /// compile time.
    ///
    /// # Panics
    /// As [`Thread::new`].
    #[track_caller]
    pub fn with_word<T, const N: usize>(
        td: &'static ThreadData,
        stack: &'static ThreadStack<N>,
        attr: &ThreadAttr,
        f: fn(T),
        arg: T,
    ) -> Self
    where
        T: Copy + Send + 'static,
    {
        #[allow(clippy::let_unit_value)]
        let () = WordFit::<T>::OK;
        let (p1, p2) = (package::fn_to_word(f), package::arg_to_word(arg));
        created(spawn_raw(td, stack, attr, package::word_trampoline::<T>, p1, p2))
    }

    /// Run the plain function `f` on a new thread
    ///
    /// # Panics
    /// As [`Thread::new`].
    #[track_caller]
    pub fn from_fn<const N: usize>(
        td: &'static ThreadData,
        stack: &'static ThreadStack<N>,
        attr: &ThreadAttr,
        f: fn(),
    ) -> Self {
        created(spawn_raw(td, stack, attr, package::fn_trampoline, package::fn_to_word(f), 0))
    }

    fn bound(&self) -> OsResult<ThreadId> {
        self.id.ok_or(OsError::Inval)
    }

    /// True while the handle is bound to a thread
    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    pub fn id(&self) -> Option<ThreadId> {
        self.id
    }

    /// Unbind the handle, leaving the thread running
    pub fn detach(&mut self) {
        self.id = None;
    }

    /// Start a thread created suspended or with a start delay
    pub fn start(&self) -> Outcome<()> {
        self.bound().and_then(sched::start).into()
    }

    /// Terminate the thread and unbind the handle
    pub fn abort(&mut self) -> Outcome<()> {
        let res = self.bound().and_then(sched::abort);
        if res.is_ok() {
            self.id = None;
        }
        res.into()
    }

    pub fn suspend(&self) -> Outcome<()> {
        self.bound().and_then(sched::suspend).into()
    }

    pub fn resume(&self) -> Outcome<()> {
        self.bound().and_then(sched::resume).into()
    }

    /// Wait for the thread to terminate. `Deadlk` if called by the thread
    /// itself.
    pub fn join(&self) -> Outcome<()> {
        self.bound()
            .and_then(|id| sched::join(id, Timeout::Forever))
            .into()
    }

    /// Wait at most `timeout` for the thread to terminate
    pub fn try_join_for(&self, timeout: Duration) -> Outcome<()> {
        self.bound()
            .and_then(|id| sched::join(id, Timeout::from(timeout)))
            .into()
    }

    /// End a sleep of the thread early
    pub fn wakeup(&self) -> Outcome<()> {
        self.bound().and_then(sched::wakeup).into()
    }

    pub fn priority(&self) -> Outcome<ThreadPrio> {
        self.bound().and_then(sched::priority).into()
    }

    pub fn set_priority(&self, prio: ThreadPrio) -> Outcome<()> {
        self.bound()
            .and_then(|id| sched::set_priority(id, prio))
            .into()
    }

    pub fn name(&self) -> Outcome<ThreadName> {
        self.bound()
            .and_then(|id| {
                critical_section(|cs| {
                    if !id.is_current_instance(cs) {
                        return Err(OsError::Srch);
                    }
                    Ok(id.tcb().inner(cs).name)
                })
            })
            .into()
    }

    /// Rename the thread; names longer than the name capacity are
    /// truncated
    pub fn set_name(&self, name: &str) -> Outcome<()> {
        self.bound()
            .and_then(|id| {
                critical_section(|cs| {
                    if !id.is_current_instance(cs) {
                        return Err(OsError::Srch);
                    }
                    id.tcb().inner(cs).name = ThreadName::from_str_truncate(name);
                    Ok(())
                })
            })
            .into()
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::unbound()
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            if sched::abort(id).is_err() {
                warn!("dropped thread handle could not abort its thread");
            }
        }
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => f.debug_tuple("Thread").field(&id).finish(),
            None => f.write_str("Thread(unbound)"),
        }
    }
}
