//! Poll event slots

use core::any::TypeId;
use core::fmt;

use crate::critical::{critical_section, CriticalSection};
use crate::sched::{PollNode, POLL_CANCELLED, POLL_READY};
use crate::sync::fifo::{Fifo, FifoItem, FifoRef, OsFifo};
use crate::sync::poll_signal::{OsPollSignal, PollSignal, PollSignalBase, PollSignalRef};
use crate::sync::sem::{OsSem, Sem, SemBase, SemRef};
use crate::task::OsTcb;

/// The object an event slot watches
#[derive(Clone, Copy)]
pub enum PollSource<'a> {
    /// Inert slot, never inspected
    Ignore,
    /// Ready while the semaphore count is non-zero
    Sem(&'a OsSem),
    /// Ready while the queue holds an item
    Fifo(FifoSource<'a>),
    /// Ready when the signal is raised during the wait
    Signal(&'a OsPollSignal),
}

/// A watched queue together with its item type. Only typed queue handles
/// create one.
#[derive(Clone, Copy)]
pub struct FifoSource<'a> {
    queue: &'a OsFifo,
    item: TypeId,
}

impl<'a> FifoSource<'a> {
    fn of<T: FifoItem + 'static>(queue: &'a OsFifo) -> Self {
        FifoSource {
            queue,
            item: TypeId::of::<T>(),
        }
    }
}

/// Kind of an event slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollKind {
    Ignore,
    Sem,
    Fifo,
    Signal,
}

impl PollSource<'_> {
    pub fn kind(&self) -> PollKind {
        match self {
            PollSource::Ignore => PollKind::Ignore,
            PollSource::Sem(_) => PollKind::Sem,
            PollSource::Fifo(..) => PollKind::Fifo,
            PollSource::Signal(_) => PollKind::Signal,
        }
    }
}

impl fmt::Debug for PollSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollSource::Ignore => f.write_str("Ignore"),
            PollSource::Sem(s) => write!(f, "Sem({:p})", *s),
            PollSource::Fifo(q) => write!(f, "Fifo({:p})", q.queue),
            PollSource::Signal(s) => write!(f, "Signal({:p})", *s),
        }
    }
}

/// A handle that can be watched by an event set
pub trait Pollable {
    fn poll_source(&self) -> PollSource<'_>;
}

impl<'a, P: Pollable + ?Sized> From<&'a P> for PollSource<'a> {
    fn from(p: &'a P) -> Self {
        p.poll_source()
    }
}

impl Pollable for OsSem {
    fn poll_source(&self) -> PollSource<'_> {
        PollSource::Sem(self)
    }
}

impl Pollable for Sem {
    fn poll_source(&self) -> PollSource<'_> {
        PollSource::Sem(self.native_handle())
    }
}

impl Pollable for SemRef<'_> {
    fn poll_source(&self) -> PollSource<'_> {
        PollSource::Sem(self.native_handle())
    }
}

impl<T: FifoItem + 'static> Pollable for Fifo<T> {
    fn poll_source(&self) -> PollSource<'_> {
        PollSource::Fifo(FifoSource::of::<T>(self.os_fifo()))
    }
}

impl<T: FifoItem + 'static> Pollable for FifoRef<'_, T> {
    fn poll_source(&self) -> PollSource<'_> {
        PollSource::Fifo(FifoSource::of::<T>(self.os_fifo()))
    }
}

impl Pollable for OsPollSignal {
    fn poll_source(&self) -> PollSource<'_> {
        PollSource::Signal(self)
    }
}

impl Pollable for PollSignal {
    fn poll_source(&self) -> PollSource<'_> {
        PollSource::Signal(self.native_handle())
    }
}

impl Pollable for PollSignalRef<'_> {
    fn poll_source(&self) -> PollSource<'_> {
        PollSource::Signal(self.native_handle())
    }
}

/// One slot of an [`EventSet`](super::EventSet)
pub struct PollEvent<'a> {
    source: PollSource<'a>,
    node: PollNode,
}

impl<'a> PollEvent<'a> {
    /// Slot watching `source`
    pub fn new(source: impl Into<PollSource<'a>>) -> Self {
        PollEvent {
            source: source.into(),
            node: PollNode::new(),
        }
    }

    /// Inert slot
    pub const fn ignore() -> Self {
        PollEvent {
            source: PollSource::Ignore,
            node: PollNode::new(),
        }
    }

    pub fn kind(&self) -> PollKind {
        self.source.kind()
    }

    pub fn source(&self) -> PollSource<'a> {
        self.source
    }

    /// True if the last wait found this slot's condition true
    pub fn is_ready(&self) -> bool {
        critical_section(|cs| self.node.state(cs) & POLL_READY != 0)
    }

    /// True if the last wait on this slot was cancelled
    pub fn is_cancelled(&self) -> bool {
        critical_section(|cs| self.node.state(cs) & POLL_CANCELLED != 0)
    }

    /// Clear the readiness and cancelled flags
    pub fn reset(&mut self) {
        critical_section(|cs| self.node.set_state(cs, 0))
    }

    /// The watched semaphore
    ///
    /// # Panics
    /// Panics if the slot does not watch a semaphore.
    #[track_caller]
    pub fn sem(&self) -> SemRef<'a> {
        match self.source {
            PollSource::Sem(s) => SemRef::from(s),
            _ => panic!("poll event does not watch a semaphore"),
        }
    }

    /// The watched queue
    ///
    /// # Panics
    /// Panics if the slot does not watch a queue of `T` items.
    #[track_caller]
    pub fn fifo<T: FifoItem + 'static>(&self) -> FifoRef<'a, T> {
        match self.source {
            PollSource::Fifo(q) if q.item == TypeId::of::<T>() => FifoRef::from_os(q.queue),
            PollSource::Fifo(..) => panic!("poll event watches a queue of another item type"),
            _ => panic!("poll event does not watch a queue"),
        }
    }

    /// The watched poll signal
    ///
    /// # Panics
    /// Panics if the slot does not watch a poll signal.
    #[track_caller]
    pub fn signal(&self) -> PollSignalRef<'a> {
        match self.source {
            PollSource::Signal(s) => PollSignalRef::from(s),
            _ => panic!("poll event does not watch a poll signal"),
        }
    }

    /// Start a wait: clear state, and lower a watched signal so that only
    /// raises during the wait count
    pub(crate) fn arm(&self, cs: CriticalSection<'_>) {
        self.node.set_state(cs, 0);
        if let PollSource::Signal(s) = self.source {
            s.state().get(cs).signaled = false;
        }
    }

    /// Mark the slot ready if its condition holds now
    pub(crate) fn check(&self, cs: CriticalSection<'_>) -> bool {
        let ready = match self.source {
            PollSource::Ignore => false,
            PollSource::Sem(s) => s.state().get(cs).is_available(),
            PollSource::Fifo(q) => q.queue.state().get(cs).is_available(),
            PollSource::Signal(s) => s.state().get(cs).signaled,
        };
        if ready {
            self.node.set_state(cs, POLL_READY);
        }
        ready
    }

    pub(crate) fn register(&self, cs: CriticalSection<'_>, poller: &'static OsTcb) {
        match self.source {
            PollSource::Ignore => {}
            PollSource::Sem(s) => s.state().get(cs).poll_list.register(cs, &self.node, poller),
            PollSource::Fifo(q) => q.queue.state().get(cs).poll_list.register(cs, &self.node, poller),
            PollSource::Signal(s) => s.state().get(cs).poll_list.register(cs, &self.node, poller),
        }
    }

    pub(crate) fn unregister(&self, cs: CriticalSection<'_>) {
        match self.source {
            PollSource::Ignore => {}
            PollSource::Sem(s) => s.state().get(cs).poll_list.unregister(cs, &self.node),
            PollSource::Fifo(q) => q.queue.state().get(cs).poll_list.unregister(cs, &self.node),
            PollSource::Signal(s) => s.state().get(cs).poll_list.unregister(cs, &self.node),
        }
    }

    pub(crate) fn state(&self, cs: CriticalSection<'_>) -> u8 {
        self.node.state(cs)
    }
}

impl fmt::Debug for PollEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollEvent")
            .field("source", &self.source)
            .field("ready", &self.is_ready())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
