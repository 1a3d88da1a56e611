use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lockable_pool::{Element, LockablePool, PoolItem};
use std::sync::Arc;
use std::thread;

fn filled_pool(size: usize) -> Arc<LockablePool<Vec<u8>>> {
    let pool = Arc::new(LockablePool::with_capacity(size));
    for _ in 0..size {
        pool.register(Element::new(vec![0u8; 64])).unwrap();
    }
    pool
}

fn borrow_release(c: &mut Criterion) {
    let pool = filled_pool(4);
    c.bench_function("borrow_release_uncontended", |b| {
        b.iter(|| {
            if let PoolItem::Element(element) = pool.borrow_item().unwrap() {
                black_box(element.len());
                pool.release(element).unwrap();
            }
        })
    });

    c.bench_function("borrow_release_4_threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    thread::spawn(move || {
                        for _ in 0..100 {
                            if let PoolItem::Element(element) = pool.borrow_item().unwrap() {
                                pool.release(element).unwrap();
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        })
    });

    c.bench_function("lock_unlock_quiescent", |b| {
        b.iter(|| {
            pool.lock().unwrap();
            pool.unlock().unwrap();
        })
    });
}

criterion_group!(benches, borrow_release);
criterion_main!(benches);
