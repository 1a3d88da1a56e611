// lockable-pool demo
// Runs a handful of workers against a shared pool, reloads every element
// under the exclusive lock, then shuts the workers down with poison pills.
//
// Set RUST_LOG=lockable_pool=debug to watch the lock protocol.

use lockable_pool::{Element, LockablePool, PoisonPill, PoolConfiguration, PoolItem};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const WORKERS: usize = 4;

struct Instance {
    generation: AtomicUsize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== lockable-pool ===");

    let pool = Arc::new(LockablePool::new(
        PoolConfiguration::new().with_max_size(2).with_name("demo"),
    ));
    for _ in 0..2 {
        let instance = Instance {
            generation: AtomicUsize::new(0),
        };
        if let Err(err) = pool.register(Element::new(instance)) {
            eprintln!("register failed: {}", err);
            return;
        }
    }

    let (done_tx, done_rx) = crossbeam::channel::unbounded();
    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                let mut handled = 0usize;
                loop {
                    match pool.borrow_item() {
                        Ok(PoolItem::Element(instance)) => {
                            handled += instance.generation.load(Ordering::Relaxed) + 1;
                            thread::sleep(Duration::from_millis(5));
                            if let Err(err) = pool.release(instance) {
                                eprintln!("worker {} release failed: {}", worker, err);
                                break;
                            }
                        }
                        Ok(PoolItem::Pill(_)) | Err(_) => break,
                    }
                }
                let _ = done_tx.send((worker, handled));
            })
        })
        .collect();
    drop(done_tx);

    thread::sleep(Duration::from_millis(50));

    match pool.lock() {
        Ok(()) => {
            for instance in pool.registered_elements() {
                instance.generation.fetch_add(1, Ordering::Relaxed);
            }
            println!("Reloaded {} instances", pool.registered_count());
            if let Err(err) = pool.unlock() {
                eprintln!("unlock failed: {}", err);
            }
        }
        Err(err) => eprintln!("lock failed: {}", err),
    }

    thread::sleep(Duration::from_millis(50));
    for _ in 0..WORKERS {
        pool.insert_pill(PoisonPill::shutdown());
    }

    for (worker, handled) in done_rx.iter() {
        println!("  worker {} handled {} units", worker, handled);
    }
    for handle in workers {
        let _ = handle.join();
    }

    let cleared = pool.clear();
    println!("Cleared {} instances", cleared.len());
    for (key, value) in pool.export_metrics() {
        println!("  {}: {}", key, value);
    }
}
