//! Kernel core
//!
//! Configuration, errors and the result type, time, thread control blocks
//! and the blocking machinery shared by every primitive.

pub mod clock;
pub mod config;
pub mod critical;
pub mod cs_cell;
pub mod error;
pub mod prio;
pub mod result;
pub mod sched;
pub mod task;
pub mod types;
