//! Priority Inversion Demo - mutex priority inheritance
//!
//! Three threads: High, Med, Low. Low holds the mutex, High waits on it
//! and Low runs at High's priority until it unlocks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use zpp::mutex::Mutex;
use zpp::prelude::*;
use zpp::{info, this_thread, Thread, ThreadAttr, ThreadData, ThreadPrio, ThreadStack};

const ROUNDS: u32 = 3;

static HIGH_RUNS: AtomicU32 = AtomicU32::new(0);
static LOW_RUNS: AtomicU32 = AtomicU32::new(0);

static MTX: Mutex = Mutex::new();

static HIGH_TD: ThreadData = ThreadData::new();
static HIGH_STK: ThreadStack<8192> = ThreadStack::new();
static MED_TD: ThreadData = ThreadData::new();
static MED_STK: ThreadStack<8192> = ThreadStack::new();
static LOW_TD: ThreadData = ThreadData::new();
static LOW_STK: ThreadStack<8192> = ThreadStack::new();

fn high_task() {
    this_thread::sleep_for(Duration::from_millis(5));
    for _ in 0..ROUNDS {
        let n = HIGH_RUNS.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(_guard) = MTX.lock_guard().ok_value() {
            info!("[HIGH] acquired #{}", n);
        }
        this_thread::sleep_for(Duration::from_millis(10));
    }
}

fn med_task() {
    for _ in 0..ROUNDS * 4 {
        this_thread::busy_wait_for(Duration::from_millis(2));
        this_thread::sleep_for(Duration::from_millis(1));
    }
}

fn low_task() {
    for _ in 0..ROUNDS {
        let n = LOW_RUNS.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(_guard) = MTX.lock_guard().ok_value() {
            info!("[LOW] holding #{} at {:?}", n, this_thread::priority());
            this_thread::busy_wait_for(Duration::from_millis(20));
            info!("[LOW] releasing at {:?}", this_thread::priority());
        }
        this_thread::sleep_for(Duration::from_millis(15));
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    info!("Priority Inversion Demo: H M L");

    let low = Thread::from_fn(
        &LOW_TD,
        &LOW_STK,
        &ThreadAttr::new().with_prio(ThreadPrio::new(9)),
        low_task,
    );
    let med = Thread::from_fn(
        &MED_TD,
        &MED_STK,
        &ThreadAttr::new().with_prio(ThreadPrio::new(6)),
        med_task,
    );
    let high = Thread::from_fn(
        &HIGH_TD,
        &HIGH_STK,
        &ThreadAttr::new().with_prio(ThreadPrio::new(3)),
        high_task,
    );

    for t in [&high, &med, &low] {
        let _ = t.join();
    }
    info!(
        "high ran {} times, low ran {} times",
        HIGH_RUNS.load(Ordering::Relaxed),
        LOW_RUNS.load(Ordering::Relaxed)
    );
}
