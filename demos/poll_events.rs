//! Poll demo: one thread waits on a semaphore, a fifo and a signal at once

use std::time::Duration;

use zpp::fifo::{Fifo, FifoItem, FifoLink};
use zpp::poll_signal::PollSignal;
use zpp::prelude::*;
use zpp::sem::Sem;
use zpp::{event_set, info, this_thread, warn, Thread, ThreadAttr, ThreadData, ThreadStack};

struct Job {
    link: FifoLink,
    id: u32,
}

unsafe impl FifoItem for Job {
    fn fifo_link(&self) -> &FifoLink {
        &self.link
    }
}

static TICKS: Sem = Sem::new(0, 10);
static JOBS: Fifo<Job> = Fifo::new();
static STOP: PollSignal = PollSignal::new();

static SOURCE_TD: ThreadData = ThreadData::new();
static SOURCE_STK: ThreadStack<8192> = ThreadStack::new();

fn source() {
    for id in 0..6u32 {
        this_thread::sleep_for(Duration::from_millis(10));
        if id % 2 == 0 {
            TICKS.give();
        } else {
            JOBS.push_back(Box::leak(Box::new(Job {
                link: FifoLink::new(),
                id,
            })));
        }
    }
    // signals are edge triggered; give the poller time to be waiting
    this_thread::sleep_for(Duration::from_millis(50));
    let _ = STOP.raise(0);
}

fn main() {
    tracing_subscriber::fmt::init();
    info!("Poll Demo");

    let src = Thread::from_fn(&SOURCE_TD, &SOURCE_STK, &ThreadAttr::new(), source);

    let mut set = event_set![&TICKS, &JOBS, &STOP];
    loop {
        if let Some(err) = set.try_wait_for(Duration::from_secs(1)).err_value() {
            warn!("wait failed: {}", err);
            break;
        }
        if set[0].is_ready() {
            let _ = TICKS.try_take();
            info!("tick");
        }
        if set[1].is_ready() {
            if let Some(job) = JOBS.try_pop_front().ok_value() {
                info!("job {}", job.id);
                // SAFETY: every job was leaked from a box by `source`.
                drop(unsafe { Box::from_raw(job as *mut Job) });
            }
        }
        if set[2].is_ready() {
            info!("stop raised with {:?}", set[2].signal().check());
            break;
        }
    }

    let _ = src.join();
}
