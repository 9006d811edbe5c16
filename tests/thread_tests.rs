//! Thread launcher and timer tests

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use zpp::mem::{Heap, MemSlab, SysHeap};
use zpp::{this_thread, OsError, Thread, ThreadAttr, ThreadData, ThreadPrio, ThreadStack};

const STACK: usize = 4096;

#[cfg(test)]
mod launch_tests {
    use super::*;

    #[test]
    fn test_closure_runs_with_captures() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static OUT: AtomicU32 = AtomicU32::new(0);

        let base = 40u32;
        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), move || {
            OUT.store(base + 2, Ordering::SeqCst);
        });
        assert!(t.is_bound());
        assert!(t.join() == true);
        assert_eq!(OUT.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_arguments_are_applied_in_order() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static OUT: AtomicI32 = AtomicI32::new(0);

        let t = Thread::with_args(
            &TD,
            &STK,
            &ThreadAttr::new(),
            |a: i32, b: i32, c: String| {
                OUT.store(a * 100 + b * 10 + c.len() as i32, Ordering::SeqCst);
            },
            (1, 2, String::from("abc")),
        );
        assert!(t.join() == true);
        assert_eq!(OUT.load(Ordering::SeqCst), 123);
    }

    #[test]
    fn test_word_and_fn_paths() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static OUT: AtomicU32 = AtomicU32::new(0);

        fn store(v: u32) {
            OUT.store(v, Ordering::SeqCst);
        }
        fn bump() {
            OUT.fetch_add(1, Ordering::SeqCst);
        }

        let t = Thread::with_word(&TD, &STK, &ThreadAttr::new(), store, 41);
        assert!(t.join() == true);
        drop(t);

        let t = Thread::from_fn(&TD, &STK, &ThreadAttr::new(), bump);
        assert!(t.join() == true);
        assert_eq!(OUT.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_storage_is_reusable_after_join() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static RUNS: AtomicU32 = AtomicU32::new(0);

        for _ in 0..3 {
            let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
                RUNS.fetch_add(1, Ordering::SeqCst);
            });
            assert!(t.join() == true);
            assert!(!STK.is_in_use());
        }
        assert_eq!(RUNS.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_allocator_package_released_before_run() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static SLAB: MemSlab<256, 1> = MemSlab::new();
        static FREE_IN_THREAD: AtomicU32 = AtomicU32::new(u32::MAX);

        let payload = [7u8; 32];
        let t = Thread::new_in(&TD, &STK, &ThreadAttr::new(), &SLAB, move || {
            assert_eq!(payload[31], 7);
            FREE_IN_THREAD.store(SLAB.num_free() as u32, Ordering::SeqCst);
        })
        .into_value();

        assert!(t.join() == true);
        assert_eq!(FREE_IN_THREAD.load(Ordering::SeqCst), 1);
        assert_eq!(SLAB.num_used(), 0);
    }

    #[test]
    fn test_allocator_failure_is_reported() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static SLAB: MemSlab<16, 1> = MemSlab::new();

        let big = [0u8; 64];
        let res = Thread::new_in(&TD, &STK, &ThreadAttr::new(), &SLAB, move || {
            let _ = big;
        });
        assert_eq!(res.err_value(), Some(OsError::Inval));
        assert!(!STK.is_in_use());

        // storage is untouched and can still host a thread
        let t = Thread::new_in(&TD, &STK, &ThreadAttr::new(), &SysHeap, || {}).into_value();
        assert!(t.join() == true);
    }

    #[test]
    fn test_heap_package_with_args() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static OUT: AtomicU64 = AtomicU64::new(0);

        let t = Thread::with_args_in(
            &TD,
            &STK,
            &ThreadAttr::new(),
            &SysHeap,
            |v: Vec<u64>| OUT.store(v.iter().sum(), Ordering::SeqCst),
            (vec![1, 2, 3, 4],),
        )
        .into_value();
        assert!(t.join() == true);
        assert_eq!(OUT.load(Ordering::SeqCst), 10);
    }
}

#[cfg(test)]
mod isolation_tests {
    use super::*;

    #[test]
    fn test_stack_package_survives_caller_copy() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static SEEN: AtomicU32 = AtomicU32::new(0);

        let mut value = Box::new(42u32);
        let captured = value.clone();
        let t = Thread::new(&TD, &STK, &ThreadAttr::new().suspended(true), move || {
            SEEN.store(*captured, Ordering::SeqCst);
        });

        *value = 7;
        drop(value);
        // likely lands in the freed allocation
        let _noise = Box::new(0u32);

        assert!(t.start() == true);
        assert!(t.join() == true);
        assert_eq!(SEEN.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_allocated_package_survives_caller_copy() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static SLAB: MemSlab<128, 1> = MemSlab::new();
        static SEEN: AtomicU32 = AtomicU32::new(0);

        let mut value = Box::new(42u32);
        let captured = value.clone();
        let t = Thread::new_in(&TD, &STK, &ThreadAttr::new().suspended(true), &SLAB, move || {
            SEEN.store(*captured, Ordering::SeqCst);
        })
        .into_value();

        *value = 7;
        drop(value);

        assert!(t.start() == true);
        assert!(t.join() == true);
        assert_eq!(SEEN.load(Ordering::SeqCst), 42);
        assert_eq!(SLAB.num_used(), 0);
    }

    #[test]
    fn test_heap_package_survives_caller_copy() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static HEAP: Heap<256> = Heap::new();
        static SEEN: AtomicU32 = AtomicU32::new(0);

        let mut value = Box::new(42u32);
        let captured = value.clone();
        let t = Thread::new_in(&TD, &STK, &ThreadAttr::new().suspended(true), &HEAP, move || {
            SEEN.store(*captured, Ordering::SeqCst);
        })
        .into_value();

        *value = 7;
        drop(value);

        assert!(t.start() == true);
        assert!(t.join() == true);
        assert_eq!(SEEN.load(Ordering::SeqCst), 42);
        assert_eq!(HEAP.bytes_used(), 0);
    }
}

#[cfg(test)]
mod control_tests {
    use super::*;

    #[test]
    fn test_unbound_handle() {
        let mut t = Thread::default();
        assert!(!t.is_bound());
        assert_eq!(t.join().into_error(), OsError::Inval);
        assert_eq!(t.start().into_error(), OsError::Inval);
        assert_eq!(t.abort().into_error(), OsError::Inval);
        assert_eq!(t.priority().into_error(), OsError::Inval);
    }

    #[test]
    fn test_join_self_deadlocks() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static RESULT: AtomicI32 = AtomicI32::new(0);

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            let mut me = Thread::from_id(this_thread::get_id());
            RESULT.store(me.join().into_error().errno(), Ordering::SeqCst);
            me.detach();
        });
        assert!(t.join() == true);
        assert_eq!(RESULT.load(Ordering::SeqCst), OsError::Deadlk.errno());
    }

    #[test]
    fn test_suspended_start() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static RAN: AtomicBool = AtomicBool::new(false);

        let t = Thread::new(&TD, &STK, &ThreadAttr::new().suspended(true), || {
            RAN.store(true, Ordering::SeqCst);
        });

        this_thread::sleep_for(Duration::from_millis(20));
        assert!(!RAN.load(Ordering::SeqCst));
        assert_eq!(
            t.try_join_for(Duration::from_millis(5)).into_error(),
            OsError::TimedOut
        );

        assert!(t.start() == true);
        assert!(t.join() == true);
        assert!(RAN.load(Ordering::SeqCst));
    }

    #[test]
    fn test_start_delay() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static STARTED_AFTER_MS: AtomicU64 = AtomicU64::new(0);

        let created = Instant::now();
        let attr = ThreadAttr::new().with_start_delay(Duration::from_millis(30));
        let t = Thread::new(&TD, &STK, &attr, move || {
            STARTED_AFTER_MS.store(created.elapsed().as_millis() as u64, Ordering::SeqCst);
        });
        assert!(t.join() == true);
        assert!(STARTED_AFTER_MS.load(Ordering::SeqCst) >= 30);
    }

    #[test]
    fn test_wakeup_cuts_sleep_short() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static LEFT_MS: AtomicU64 = AtomicU64::new(0);

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            let left = this_thread::sleep_for(Duration::from_secs(10));
            LEFT_MS.store(left.as_millis() as u64, Ordering::SeqCst);
        });

        this_thread::sleep_for(Duration::from_millis(20));
        assert!(t.wakeup() == true);
        assert!(t.try_join_for(Duration::from_secs(2)) == true);
        assert!(LEFT_MS.load(Ordering::SeqCst) > 5_000);
    }

    #[test]
    fn test_abort_sleeping_thread() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static WOKE: AtomicBool = AtomicBool::new(false);

        let mut t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            this_thread::sleep_for(Duration::from_secs(10));
            WOKE.store(true, Ordering::SeqCst);
        });
        let id = t.id().unwrap();

        this_thread::sleep_for(Duration::from_millis(20));
        let start = Instant::now();
        assert!(t.abort() == true);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!t.is_bound());
        assert!(id.is_terminated());
        assert!(!WOKE.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drop_aborts_thread() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || loop {
            this_thread::sleep_for(Duration::from_millis(1));
        });
        let id = t.id().unwrap();
        drop(t);
        assert!(id.is_terminated());
        assert!(!STK.is_in_use());
    }

    #[test]
    fn test_suspend_resume() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static TICKS: AtomicU32 = AtomicU32::new(0);
        static STOP: AtomicBool = AtomicBool::new(false);

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            while !STOP.load(Ordering::SeqCst) {
                TICKS.fetch_add(1, Ordering::SeqCst);
                this_thread::sleep_for(Duration::from_millis(1));
            }
        });

        this_thread::sleep_for(Duration::from_millis(20));
        assert!(t.suspend() == true);
        this_thread::sleep_for(Duration::from_millis(20));
        let frozen = TICKS.load(Ordering::SeqCst);
        this_thread::sleep_for(Duration::from_millis(30));
        assert_eq!(TICKS.load(Ordering::SeqCst), frozen);

        assert!(t.resume() == true);
        this_thread::sleep_for(Duration::from_millis(30));
        assert!(TICKS.load(Ordering::SeqCst) > frozen);

        STOP.store(true, Ordering::SeqCst);
        assert!(t.join() == true);
    }

    #[test]
    fn test_priority_and_name() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static GO: AtomicBool = AtomicBool::new(false);

        let attr = ThreadAttr::new().with_prio(ThreadPrio::preempt(2));
        let t = Thread::new(&TD, &STK, &attr, || {
            while !GO.load(Ordering::SeqCst) {
                this_thread::sleep_for(Duration::from_millis(1));
            }
        });

        assert_eq!(t.priority().into_value(), ThreadPrio::preempt(2));
        assert!(t.set_priority(ThreadPrio::coop(1)) == true);
        assert_eq!(t.priority().into_value(), ThreadPrio::coop(1));

        assert!(t.set_name("worker") == true);
        assert_eq!(t.name().into_value(), "worker");

        GO.store(true, Ordering::SeqCst);
        assert!(t.join() == true);
    }

    #[test]
    fn test_thread_id() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static SAME: AtomicBool = AtomicBool::new(false);
        static ID: std::sync::OnceLock<zpp::ThreadId> = std::sync::OnceLock::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new().suspended(true), || {
            SAME.store(ID.get() == Some(&this_thread::get_id()), Ordering::SeqCst);
        });
        let id = t.id().unwrap();
        let _ = ID.set(id);
        assert_ne!(id, this_thread::get_id());

        assert!(t.start() == true);
        assert!(t.join() == true);
        assert!(SAME.load(Ordering::SeqCst));
        assert!(id.is_terminated());
    }

    #[test]
    fn test_sleep_duration() {
        let start = Instant::now();
        assert_eq!(this_thread::sleep_for(Duration::from_millis(25)), Duration::ZERO);
        assert!(start.elapsed() >= Duration::from_millis(25));

        let until = zpp::clock::UptimeClock::now() + Duration::from_millis(10);
        this_thread::sleep_until(until);
        assert!(zpp::clock::UptimeClock::now() >= until);

        let start = Instant::now();
        this_thread::busy_wait_for(Duration::from_millis(2));
        assert!(start.elapsed() >= Duration::from_millis(2));
    }
}

#[cfg(test)]
mod timer_tests {
    use std::sync::Arc;

    use super::*;
    use zpp::timer::Timer;

    #[test]
    fn test_one_shot_sync() {
        let timer = Timer::new();
        timer.start_once(Duration::from_millis(20));
        assert!(timer.is_running());
        assert!(timer.remaining_time() <= Duration::from_millis(20));

        assert_eq!(timer.sync(), 1);
        assert_eq!(timer.status(), 0);
        assert!(!timer.is_running());
        assert_eq!(timer.remaining_time(), Duration::ZERO);
    }

    #[test]
    fn test_periodic_expiry_callback() {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let timer = Timer::with_expiry(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        timer.start(Duration::from_millis(10), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(65));
        timer.stop();

        let n = count.load(Ordering::SeqCst);
        assert!(n >= 3, "only {} expiries", n);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), n);
    }

    #[test]
    fn test_stop_callback_and_sync() {
        let stops = Arc::new(AtomicU32::new(0));
        let s = Arc::clone(&stops);
        let timer = Timer::with_callbacks(|| {}, move || {
            s.fetch_add(1, Ordering::SeqCst);
        });

        timer.start_once(Duration::from_secs(10));
        timer.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(timer.sync(), 0);

        // stopping an idle timer does not call back
        timer.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_abort_reaches_thread_in_sync() {
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static WAITING: AtomicBool = AtomicBool::new(false);
        static RETURNED: AtomicBool = AtomicBool::new(false);

        let mut t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            let timer = Timer::new();
            timer.start_once(Duration::from_secs(3));
            WAITING.store(true, Ordering::SeqCst);
            timer.sync();
            RETURNED.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(100));
        assert!(WAITING.load(Ordering::SeqCst));

        let start = Instant::now();
        assert!(t.abort() == true);
        assert!(start.elapsed() < Duration::from_secs(1), "abort took {:?}", start.elapsed());
        assert!(!RETURNED.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_waits_for_running_callback() {
        let inside = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let (i, d) = (Arc::clone(&inside), Arc::clone(&done));
        let timer = Timer::with_expiry(move || {
            i.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            d.store(true, Ordering::SeqCst);
        });

        timer.start_once(Duration::from_millis(5));
        while !inside.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        timer.stop();
        assert!(done.load(Ordering::SeqCst));
    }
}
