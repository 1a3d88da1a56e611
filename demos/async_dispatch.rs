//! Async dispatch layer surfacing "pool exhausted" on timeout

use lockable_pool::{Element, LockablePool, PoolConfiguration, PoolItem};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("=== lockable-pool - Async Dispatch ===\n");

    let pool = Arc::new(LockablePool::new(
        PoolConfiguration::new()
            .with_max_size(2)
            .with_borrow_timeout(Duration::from_millis(50)),
    ));
    pool.register(Element::new("conn-1")).unwrap();
    pool.register(Element::new("conn-2")).unwrap();

    let mut tasks = Vec::new();
    for request in 0..5 {
        let pool = Arc::clone(&pool);
        tasks.push(tokio::spawn(async move { handle(request, &pool).await }));
    }

    for task in tasks {
        match task.await {
            Ok(line) => println!("   {}", line),
            Err(err) => println!("   task failed: {}", err),
        }
    }

    println!("\n{}", pool.export_metrics_prometheus("async_dispatch", None));
}

async fn handle(request: usize, pool: &LockablePool<&'static str>) -> String {
    match pool.borrow_item_async(None).await {
        Ok(Some(PoolItem::Element(conn))) => {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let line = format!("request {} served by {}", request, *conn);
            let _ = pool.release(conn);
            line
        }
        Ok(Some(PoolItem::Pill(pill))) => format!("request {} diverted: {:?}", request, pill.reason()),
        Ok(None) => format!("request {}: pool exhausted", request),
        Err(err) => format!("request {}: {}", request, err),
    }
}
