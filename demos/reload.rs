//! Lifecycle manager, dispatch workers and a reload under the pool lock

use lockable_pool::{Checkout, Element, LockablePool, PillReason, PoisonPill, PoolConfiguration};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Interpreter {
    generation: usize,
    slot: usize,
}

fn main() {
    println!("=== lockable-pool - Reload Example ===\n");

    let pool = Arc::new(LockablePool::new(
        PoolConfiguration::new().with_max_size(3).with_name("interpreters"),
    ));
    for slot in 0..3 {
        pool.register(Element::new(Interpreter { generation: 0, slot }))
            .expect("pool sized for three interpreters");
    }

    // 1. Workers dispatch requests until told to stop
    let workers: Vec<_> = (0..3)
        .map(|id| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || worker(id, &pool))
        })
        .collect();

    thread::sleep(Duration::from_millis(30));

    // 2. Swap every interpreter for a fresh generation
    reload(&pool);
    thread::sleep(Duration::from_millis(30));

    // 3. One pill per worker
    for _ in 0..3 {
        pool.insert_pill(PoisonPill::shutdown());
    }
    for handle in workers {
        handle.join().expect("worker panicked");
    }

    let health = pool.get_health_status();
    println!("\nAfter shutdown: {} available, healthy = {}", health.available_elements, health.is_healthy());
    println!("Cleared {} interpreters", pool.clear().len());
}

fn worker(id: usize, pool: &LockablePool<Interpreter>) {
    loop {
        match pool.checkout() {
            Ok(Checkout::Element(interpreter)) => {
                println!("   worker {} -> slot {} gen {}", id, interpreter.slot, interpreter.generation);
                thread::sleep(Duration::from_millis(10));
            }
            Ok(Checkout::Pill(pill)) => {
                if *pill.reason() == PillReason::Shutdown {
                    println!("   worker {} stopping", id);
                    return;
                }
            }
            Err(err) => {
                println!("   worker {} cancelled: {}", id, err);
                return;
            }
        }
    }
}

fn reload(pool: &LockablePool<Interpreter>) {
    pool.lock().expect("reload lock");
    let old = pool.clear();
    println!("   reload: retiring {} interpreters", old.len());
    for interpreter in old {
        pool.register(Element::new(Interpreter {
            generation: interpreter.generation + 1,
            slot: interpreter.slot,
        }))
        .expect("capacity freed by clear");
    }
    pool.unlock().expect("reload unlock");
}
