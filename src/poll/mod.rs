//! Waiting on several kernel objects at once
//!
//! An [`EventSet`] holds one [`PollEvent`] per watched object. Waiting on
//! the set blocks until any of the objects has something for the caller,
//! then reports per slot what happened. The set only observes: after a
//! semaphore slot reports ready the caller still takes the semaphore, and
//! may find it already taken by another thread.

mod event;
mod event_set;

pub use event::{FifoSource, PollEvent, PollKind, PollSource, Pollable};
pub use event_set::EventSet;
