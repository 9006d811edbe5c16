//! Compile-time configuration
//!
//! These constants control priority ranges, time base and resource limits.

/// Number of cooperative priority levels (`-CFG_NUM_COOP_PRIORITIES..=-1`)
pub const CFG_NUM_COOP_PRIORITIES: i32 = 16;

/// Number of preemptive priority levels (`0..CFG_NUM_PREEMPT_PRIORITIES`)
pub const CFG_NUM_PREEMPT_PRIORITIES: i32 = 15;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 10_000;

/// Cycle counter rate in Hz of the hosted cycle clock
pub const CFG_CYCLE_RATE_HZ: u64 = 1_000_000_000;

/// Alignment of thread stack regions
pub const CFG_STACK_ALIGN: usize = 16;

/// Minimum thread stack size in bytes
pub const CFG_STACK_SIZE_MIN: usize = 256;

/// Minimum native stack handed to a hosted thread
pub const CFG_HOST_STACK_MIN: usize = 64 * 1024;

/// Stack size of the timer service thread
pub const CFG_TIMER_STACK_SIZE: usize = 4096;

/// Capacity of a thread name in bytes
pub const CFG_THREAD_NAME_LEN: usize = 32;

/// Maximum recursive lock depth of a mutex
pub const CFG_MUTEX_NESTING_MAX: u32 = u32::MAX;
