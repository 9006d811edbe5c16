//! Synchronization primitive tests
//!
//! Every test owns its kernel objects and thread storage as statics and
//! joins every thread it creates.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use zpp::condvar::CondVar;
use zpp::fifo::{Fifo, FifoItem, FifoLink};
use zpp::mem::MemSlab;
use zpp::mutex::{LockGuard, Mutex, UniqueLock};
use zpp::prelude::*;
use zpp::sem::Sem;
use zpp::{this_thread, OsError, Thread, ThreadAttr, ThreadData, ThreadPrio, ThreadStack};

const STACK: usize = 4096;

#[cfg(test)]
mod sem_tests {
    use super::*;

    #[test]
    fn test_give_take_count() {
        static SEM: Sem = Sem::new(0, 10);

        for _ in 0..5 {
            SEM.give();
        }
        assert_eq!(SEM.count(), 5);

        for _ in 0..5 {
            assert!(SEM.try_take() == true);
        }
        assert_eq!(SEM.try_take().into_error(), OsError::WouldBlock);
        assert_eq!(SEM.count(), 0);
    }

    #[test]
    fn test_count_saturates_at_limit() {
        static SEM: Sem = Sem::new(1, 2);

        SEM.give();
        SEM.give();
        SEM.give();
        assert_eq!(SEM.count(), 2);
        assert_eq!(SEM.limit(), 2);
    }

    #[test]
    fn test_take_timeout() {
        static SEM: Sem = Sem::new(0, 1);

        let start = Instant::now();
        assert_eq!(SEM.try_take_for(Duration::from_millis(100)).into_error(), OsError::TimedOut);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(600), "overslept: {:?}", waited);
    }

    #[test]
    fn test_give_wakes_waiter() {
        static SEM: Sem = Sem::new(0, 1);
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            this_thread::sleep_for(Duration::from_millis(20));
            SEM.give();
        });

        assert!(SEM.take() == true);
        // handed over directly, not counted
        assert_eq!(SEM.count(), 0);
        assert!(t.join() == true);
    }

    #[test]
    fn test_reset_releases_waiters() {
        static SEM: Sem = Sem::new(0, 1);
        static RESULT: AtomicI32 = AtomicI32::new(0);
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            let res = SEM.take();
            RESULT.store(res.err_value().map_or(0, |e| e.errno()), Ordering::SeqCst);
        });

        this_thread::sleep_for(Duration::from_millis(30));
        SEM.reset();
        assert!(t.join() == true);
        assert_eq!(RESULT.load(Ordering::SeqCst), OsError::Again.errno());
    }
}

#[cfg(test)]
mod mutex_tests {
    use super::*;

    #[test]
    fn test_recursive_lock() {
        static MUTEX: Mutex = Mutex::new();

        assert!(MUTEX.lock() == true);
        assert!(MUTEX.try_lock() == true);
        assert!(MUTEX.is_locked());

        assert!(MUTEX.unlock() == true);
        assert!(MUTEX.is_locked());
        assert!(MUTEX.unlock() == true);
        assert!(!MUTEX.is_locked());

        assert_eq!(MUTEX.unlock().into_error(), OsError::Inval);
    }

    #[test]
    fn test_guard_unlocks() {
        static MUTEX: Mutex = Mutex::new();

        {
            let _guard = LockGuard::new(&MUTEX);
            assert!(MUTEX.is_locked());
        }
        assert!(!MUTEX.is_locked());

        {
            let _guard = MUTEX.lock_guard().into_value();
            assert!(MUTEX.is_locked());
        }
        assert!(!MUTEX.is_locked());
    }

    #[test]
    fn test_unique_lock_deferred() {
        static MUTEX: Mutex = Mutex::new();

        let mut lock = UniqueLock::deferred(&MUTEX);
        assert!(!lock.owns_lock());
        assert!(!MUTEX.is_locked());
        assert_eq!(lock.unlock().into_error(), OsError::Perm);

        assert!(lock.lock() == true);
        assert!(lock.owns_lock());
        assert!(MUTEX.is_locked());
        assert_eq!(lock.try_lock().into_error(), OsError::Deadlk);

        assert!(lock.unlock() == true);
        assert!(!MUTEX.is_locked());

        assert!(lock.try_lock_for(Duration::from_millis(10)) == true);
        drop(lock);
        assert!(!MUTEX.is_locked());
    }

    #[test]
    fn test_unique_lock_release() {
        static MUTEX: Mutex = Mutex::new();

        let mut lock = UniqueLock::new(&MUTEX).into_value();
        assert!(lock.owns_lock());
        let m = lock.release().unwrap();
        assert!(!lock.owns_lock());
        assert!(lock.mutex().is_none());
        drop(lock);

        // the released mutex stays locked until unlocked by hand
        assert!(MUTEX.is_locked());
        assert!(m.unlock().is_ok());
        assert!(!MUTEX.is_locked());

        let mut unbound = UniqueLock::default();
        assert_eq!(unbound.lock().into_error(), OsError::Inval);
        assert_eq!(unbound.unlock().into_error(), OsError::Inval);
    }

    #[test]
    fn test_unique_lock_contention() {
        static MUTEX: Mutex = Mutex::new();
        static LOCKED: Sem = Sem::new(0, 1);
        static RELEASE: Sem = Sem::new(0, 1);
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            let _lock = UniqueLock::new(&MUTEX).into_value();
            LOCKED.give();
            assert!(RELEASE.take() == true);
        });

        assert!(LOCKED.take() == true);
        let mut lock = UniqueLock::deferred(&MUTEX);
        assert_eq!(lock.try_lock().into_error(), OsError::WouldBlock);
        assert!(!lock.owns_lock());

        RELEASE.give();
        assert!(lock.lock() == true);
        assert!(t.join() == true);
    }

    #[test]
    fn test_ownership() {
        static MUTEX: Mutex = Mutex::new();
        static LOCKED: Sem = Sem::new(0, 1);
        static RELEASE: Sem = Sem::new(0, 1);
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            assert!(MUTEX.lock() == true);
            LOCKED.give();
            assert!(RELEASE.take() == true);
            assert!(MUTEX.unlock() == true);
        });

        assert!(LOCKED.take() == true);
        assert_eq!(MUTEX.unlock().into_error(), OsError::Perm);
        assert_eq!(MUTEX.try_lock().into_error(), OsError::WouldBlock);
        assert_eq!(
            MUTEX.try_lock_for(Duration::from_millis(10)).into_error(),
            OsError::TimedOut
        );

        RELEASE.give();
        assert!(MUTEX.lock() == true);
        assert!(MUTEX.unlock() == true);
        assert!(t.join() == true);
    }

    #[test]
    fn test_priority_inheritance() {
        static MUTEX: Mutex = Mutex::new();
        static LOCKED: Sem = Sem::new(0, 1);
        static RELEASE: Sem = Sem::new(0, 1);
        static AFTER_UNLOCK: AtomicI32 = AtomicI32::new(i32::MIN);
        static HOLDER_TD: ThreadData = ThreadData::new();
        static HOLDER_STK: ThreadStack<STACK> = ThreadStack::new();
        static WAITER_TD: ThreadData = ThreadData::new();
        static WAITER_STK: ThreadStack<STACK> = ThreadStack::new();

        let low = ThreadPrio::preempt(0);
        let high = ThreadPrio::preempt(10);

        let holder = Thread::new(&HOLDER_TD, &HOLDER_STK, &ThreadAttr::new().with_prio(low), || {
            assert!(MUTEX.lock() == true);
            LOCKED.give();
            assert!(RELEASE.take() == true);
            assert!(MUTEX.unlock() == true);
            AFTER_UNLOCK.store(this_thread::priority().value(), Ordering::SeqCst);
        });
        assert!(LOCKED.take() == true);

        let waiter = Thread::new(&WAITER_TD, &WAITER_STK, &ThreadAttr::new().with_prio(high), || {
            assert!(MUTEX.lock() == true);
            assert!(MUTEX.unlock() == true);
        });

        this_thread::sleep_for(Duration::from_millis(30));
        assert_eq!(holder.priority().into_value(), high);

        RELEASE.give();
        assert!(holder.join() == true);
        assert!(waiter.join() == true);
        assert_eq!(AFTER_UNLOCK.load(Ordering::SeqCst), low.value());
    }
}

#[cfg(test)]
mod condvar_tests {
    use super::*;

    #[test]
    fn test_notify_with_predicate() {
        static MUTEX: Mutex = Mutex::new();
        static CV: CondVar = CondVar::new();
        static READY: AtomicBool = AtomicBool::new(false);
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            this_thread::sleep_for(Duration::from_millis(20));
            let _guard = LockGuard::new(&MUTEX);
            READY.store(true, Ordering::SeqCst);
            assert!(CV.notify_one() == true);
        });

        assert!(MUTEX.lock() == true);
        assert!(CV.wait_until(&MUTEX, || READY.load(Ordering::SeqCst)) == true);
        assert!(MUTEX.native_handle().is_owned_by_current());
        assert!(MUTEX.unlock() == true);
        assert!(t.join() == true);
    }

    #[test]
    fn test_wait_timeout_relocks() {
        static MUTEX: Mutex = Mutex::new();
        static CV: CondVar = CondVar::new();

        assert!(MUTEX.lock() == true);
        let res = CV.try_wait_for(&MUTEX, Duration::from_millis(15));
        assert_eq!(res.into_error(), OsError::TimedOut);
        assert!(MUTEX.native_handle().is_owned_by_current());

        let res = CV.try_wait_until_for(&MUTEX, Duration::from_millis(5), || false);
        assert_eq!(res.into_error(), OsError::TimedOut);
        assert!(MUTEX.unlock() == true);
    }

    #[test]
    fn test_wait_requires_single_lock() {
        static MUTEX: Mutex = Mutex::new();
        static CV: CondVar = CondVar::new();

        assert_eq!(CV.wait(&MUTEX).into_error(), OsError::Inval);

        assert!(MUTEX.lock() == true);
        assert!(MUTEX.lock() == true);
        assert_eq!(CV.wait(&MUTEX).into_error(), OsError::Inval);
        assert!(MUTEX.unlock() == true);
        assert!(MUTEX.unlock() == true);
    }

    #[test]
    fn test_notify_all() {
        static MUTEX: Mutex = Mutex::new();
        static CV: CondVar = CondVar::new();
        static WOKEN: AtomicU32 = AtomicU32::new(0);
        static GO: AtomicBool = AtomicBool::new(false);
        static TDS: [ThreadData; 3] = [ThreadData::new(), ThreadData::new(), ThreadData::new()];
        static STKS: [ThreadStack<STACK>; 3] = [ThreadStack::new(), ThreadStack::new(), ThreadStack::new()];

        let threads: Vec<Thread> = (0..3)
            .map(|i| {
                Thread::new(&TDS[i], &STKS[i], &ThreadAttr::new(), || {
                    assert!(MUTEX.lock() == true);
                    assert!(CV.wait_until(&MUTEX, || GO.load(Ordering::SeqCst)) == true);
                    WOKEN.fetch_add(1, Ordering::SeqCst);
                    assert!(MUTEX.unlock() == true);
                })
            })
            .collect();

        this_thread::sleep_for(Duration::from_millis(30));
        {
            let _guard = LockGuard::new(&MUTEX);
            GO.store(true, Ordering::SeqCst);
            assert!(CV.notify_all() == true);
        }

        for t in &threads {
            assert!(t.join() == true);
        }
        assert_eq!(WOKEN.load(Ordering::SeqCst), 3);
    }
}

#[cfg(test)]
mod fifo_tests {
    use super::*;

    struct Item {
        link: FifoLink,
        value: u32,
    }

    impl Item {
        fn leak(value: u32) -> &'static mut Item {
            Box::leak(Box::new(Item {
                link: FifoLink::new(),
                value,
            }))
        }
    }

    unsafe impl FifoItem for Item {
        fn fifo_link(&self) -> &FifoLink {
            &self.link
        }
    }

    #[test]
    fn test_fifo_order() {
        static FIFO: Fifo<Item> = Fifo::new();

        assert!(FIFO.is_empty());
        for v in 1..=3 {
            FIFO.push_back(Item::leak(v));
        }
        assert_eq!(FIFO.with_front(|i| i.value), Some(1));
        assert_eq!(FIFO.with_back(|i| i.value), Some(3));

        for v in 1..=3 {
            assert_eq!(FIFO.try_pop_front().into_value().value, v);
        }
        assert!(FIFO.is_empty());
        assert_eq!(FIFO.try_pop_front().err_value(), Some(OsError::WouldBlock));
    }

    #[test]
    fn test_item_can_be_requeued() {
        static FIFO: Fifo<Item> = Fifo::new();

        FIFO.push_back(Item::leak(5));
        let item = FIFO.try_pop_front().into_value();
        item.value += 1;
        FIFO.push_back(item);
        assert_eq!(FIFO.try_pop_front().into_value().value, 6);
    }

    #[test]
    fn test_pop_waits_for_push() {
        static FIFO: Fifo<Item> = Fifo::new();
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            this_thread::sleep_for(Duration::from_millis(20));
            FIFO.push_back(Item::leak(42));
        });

        assert_eq!(FIFO.pop_front().into_value().value, 42);
        assert!(FIFO.is_empty());
        assert!(t.join() == true);
    }

    #[test]
    fn test_pop_timeout() {
        static FIFO: Fifo<Item> = Fifo::new();

        assert_eq!(
            FIFO.try_pop_front_for(Duration::from_millis(10)).err_value(),
            Some(OsError::TimedOut)
        );
    }

    #[test]
    fn test_cancel_wait() {
        static FIFO: Fifo<Item> = Fifo::new();
        static RESULT: AtomicI32 = AtomicI32::new(0);
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            let res = FIFO.pop_front();
            RESULT.store(res.err_value().map_or(0, |e| e.errno()), Ordering::SeqCst);
        });

        this_thread::sleep_for(Duration::from_millis(30));
        FIFO.cancel_wait();
        assert!(t.join() == true);
        assert_eq!(RESULT.load(Ordering::SeqCst), OsError::Canceled.errno());
    }
}

#[cfg(test)]
mod slab_tests {
    use super::*;

    #[test]
    fn test_exhaustion_and_timeout() {
        static SLAB: MemSlab<64, 2> = MemSlab::new();

        let a = SLAB.try_allocate().into_value();
        let b = SLAB.try_allocate().into_value();
        assert_eq!(SLAB.num_free(), 0);
        assert_eq!(SLAB.try_allocate().into_error(), OsError::NoMem);
        assert_eq!(
            SLAB.try_allocate_for(Duration::from_millis(10)).into_error(),
            OsError::TimedOut
        );

        unsafe {
            SLAB.deallocate(a);
            SLAB.deallocate(b);
        }
        assert_eq!(SLAB.num_used(), 0);
    }

    #[test]
    fn test_release_hands_block_to_waiter() {
        static SLAB: MemSlab<64, 1> = MemSlab::new();
        static TD: ThreadData = ThreadData::new();
        static STK: ThreadStack<STACK> = ThreadStack::new();
        static BLOCK: AtomicU32 = AtomicU32::new(0);

        let held = SLAB.try_allocate().into_value();

        let t = Thread::new(&TD, &STK, &ThreadAttr::new(), || {
            let block = SLAB.allocate().into_value();
            BLOCK.store(1, Ordering::SeqCst);
            unsafe { SLAB.deallocate(block) };
        });

        this_thread::sleep_for(Duration::from_millis(20));
        assert_eq!(BLOCK.load(Ordering::SeqCst), 0);
        unsafe { SLAB.deallocate(held) };

        assert!(t.join() == true);
        assert_eq!(BLOCK.load(Ordering::SeqCst), 1);
        assert_eq!(SLAB.num_used(), 0);
    }
}
