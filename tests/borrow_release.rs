use crossbeam::channel::{self, RecvTimeoutError};
use lockable_pool::{Element, LockablePool, PillReason, PoisonPill, PoolError, PoolItem};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn shared_pool(values: &[&'static str]) -> (Arc<LockablePool<&'static str>>, Vec<Element<&'static str>>) {
    let pool = Arc::new(LockablePool::with_capacity(values.len()));
    let elements: Vec<_> = values.iter().map(|v| Element::new(*v)).collect();
    for element in &elements {
        pool.register(element.clone()).unwrap();
    }
    (pool, elements)
}

#[test]
fn third_borrow_blocks_until_release() {
    let (pool, elements) = shared_pool(&["a", "b"]);
    let first = pool.borrow_item().unwrap().into_element().unwrap();
    let second = pool.borrow_item().unwrap().into_element().unwrap();
    assert_eq!(pool.size(), 0);

    let (tx, rx) = channel::bounded(1);
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || tx.send(pool.borrow_item().unwrap().into_element()).unwrap())
    };

    assert_eq!(rx.recv_timeout(Duration::from_millis(100)), Err(RecvTimeoutError::Timeout));
    let a = if first == elements[0] { first } else { second };
    pool.release(a.clone()).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Some(a));
    waiter.join().unwrap();
}

#[test]
fn pill_jumps_queue_for_blocked_worker() {
    let (pool, elements) = shared_pool(&["a"]);
    let a = pool.borrow_item().unwrap().into_element().unwrap();

    let (tx, rx) = channel::bounded(1);
    let worker = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let item = pool.borrow_item().unwrap();
            tx.send(item).unwrap();
        })
    };
    thread::sleep(Duration::from_millis(30));

    pool.insert_pill(PoisonPill::custom("flush"));
    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        PoolItem::Pill(pill) => assert_eq!(pill.reason(), &PillReason::Custom("flush".into())),
        PoolItem::Element(element) => panic!("expected pill, got {:?}", element),
    }
    worker.join().unwrap();

    pool.release(a).unwrap();
    assert_eq!(pool.size(), 1);
    assert_eq!(pool.registered_elements(), elements);
}

#[test]
fn timed_borrow_returns_none_after_budget() {
    let pool = LockablePool::<&'static str>::with_capacity(1);
    let started = Instant::now();
    let result = pool.borrow_item_with_timeout(Duration::from_millis(100)).unwrap();
    let elapsed = started.elapsed();

    assert!(result.is_none());
    assert!(elapsed >= Duration::from_millis(100), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "returned after {:?}", elapsed);
}

#[test]
fn timed_borrow_succeeds_when_element_arrives() {
    let (pool, _) = shared_pool(&["a"]);
    let a = pool.borrow_item().unwrap().into_element().unwrap();

    let releaser = {
        let pool = Arc::clone(&pool);
        let a = a.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            pool.release(a).unwrap();
        })
    };
    let item = pool.borrow_item_with_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(item.and_then(PoolItem::into_element), Some(a));
    releaser.join().unwrap();
}

#[test]
fn interrupt_cancels_blocked_borrow() {
    let pool = Arc::new(LockablePool::<&'static str>::with_capacity(1));
    let borrower = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.borrow_item())
    };
    thread::sleep(Duration::from_millis(30));

    pool.interrupt(borrower.thread().id());
    assert_eq!(borrower.join().unwrap().unwrap_err(), PoolError::Cancelled);
    assert_eq!(pool.size(), 0);
    assert_eq!(pool.registered_count(), 0);
}

#[test]
fn cancelled_waiter_passes_signal_on() {
    let (pool, _) = shared_pool(&["a"]);
    let a = pool.borrow_item().unwrap().into_element().unwrap();

    let spawn_borrower = |pool: &Arc<LockablePool<&'static str>>| {
        let pool = Arc::clone(pool);
        thread::spawn(move || pool.borrow_item().map(PoolItem::into_element))
    };
    let cancelled = spawn_borrower(&pool);
    let patient = spawn_borrower(&pool);
    thread::sleep(Duration::from_millis(30));

    pool.interrupt(cancelled.thread().id());
    pool.release(a.clone()).unwrap();

    assert_eq!(cancelled.join().unwrap(), Err(PoolError::Cancelled));
    assert_eq!(patient.join().unwrap(), Ok(Some(a)));
}

#[test]
fn many_workers_preserve_invariants() {
    let (pool, elements) = shared_pool(&["a", "b", "c"]);
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut served = 0;
                loop {
                    match pool.borrow_item().unwrap() {
                        PoolItem::Element(element) => {
                            served += 1;
                            assert!(pool.size() <= pool.max_size());
                            pool.release(element).unwrap();
                        }
                        PoolItem::Pill(_) => return served,
                    }
                }
            })
        })
        .collect();

    for _ in 0..5 {
        pool.lock().unwrap();
        assert_eq!(pool.size(), pool.registered_count());
        pool.unlock().unwrap();
        thread::sleep(Duration::from_millis(5));
    }
    for _ in 0..8 {
        pool.insert_pill(PoisonPill::shutdown());
    }

    let served: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert!(served > 0);
    assert_eq!(pool.size(), 3);
    assert_eq!(pool.registered_elements(), elements);
    assert_eq!(pool.get_metrics().pills_inserted, 8);
}
