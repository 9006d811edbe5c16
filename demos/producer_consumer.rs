//! Producer-Consumer demo with fifos and a semaphore
//!
//! Message buffers circulate between a free fifo and a full fifo; the
//! consumer gives a semaphore once it has seen every message.

use std::time::Duration;

use zpp::fifo::{Fifo, FifoItem, FifoLink};
use zpp::prelude::*;
use zpp::sem::Sem;
use zpp::{info, this_thread, Thread, ThreadAttr, ThreadData, ThreadPrio, ThreadStack};

const BUFFERS: usize = 4;
const MESSAGES: u32 = 20;

struct Msg {
    link: FifoLink,
    seq: u32,
}

unsafe impl FifoItem for Msg {
    fn fifo_link(&self) -> &FifoLink {
        &self.link
    }
}

static FREE: Fifo<Msg> = Fifo::new();
static FULL: Fifo<Msg> = Fifo::new();
static DONE: Sem = Sem::new(0, 1);

static PRODUCER_TD: ThreadData = ThreadData::new();
static PRODUCER_STK: ThreadStack<8192> = ThreadStack::new();
static CONSUMER_TD: ThreadData = ThreadData::new();
static CONSUMER_STK: ThreadStack<8192> = ThreadStack::new();

fn producer(count: u32) {
    for seq in 1..=count {
        let Some(msg) = FREE.pop_front().ok_value() else {
            return;
        };
        msg.seq = seq;
        info!("[P] produced #{}", seq);
        FULL.push_back(msg);
        this_thread::sleep_for(Duration::from_millis(5));
    }
}

fn consumer(count: u32) {
    let mut seen = 0;
    while seen < count {
        match FULL.try_pop_front_for(Duration::from_secs(1)).ok_value() {
            Some(msg) => {
                seen += 1;
                info!("[C] consumed #{}", msg.seq);
                FREE.push_back(msg);
            }
            None => break,
        }
    }
    DONE.give();
}

fn main() {
    tracing_subscriber::fmt::init();
    info!("Producer-Consumer Demo");

    for _ in 0..BUFFERS {
        FREE.push_back(Box::leak(Box::new(Msg {
            link: FifoLink::new(),
            seq: 0,
        })));
    }

    let consumer = Thread::with_word(
        &CONSUMER_TD,
        &CONSUMER_STK,
        &ThreadAttr::new().with_prio(ThreadPrio::preempt(2)),
        consumer,
        MESSAGES,
    );
    let producer = Thread::with_word(
        &PRODUCER_TD,
        &PRODUCER_STK,
        &ThreadAttr::new().with_prio(ThreadPrio::preempt(1)),
        producer,
        MESSAGES,
    );

    let res = DONE.try_take_for(Duration::from_secs(10));
    info!("consumer finished: {}", res == true);

    let _ = producer.join();
    let _ = consumer.join();
}
