//! # lockable-pool
//!
//! Thread-safe pool of expensive, interchangeable resources with an exclusive
//! maintenance lock.
//!
//! ## Features
//!
//! - Blocking, bounded and async borrows
//! - Recency-biased reuse: the last element returned is the next one borrowed
//! - Poison pills for diverting the next borrower
//! - Exclusive pool lock that waits for every element to come home
//! - Cancellation of blocked waits by thread
//! - RAII checkouts
//! - Health monitoring and metrics
//! - Prometheus metrics export
//!
//! ## Quick Start
//!
//! ```rust
//! use lockable_pool::{Element, LockablePool, PoolItem};
//!
//! let pool = LockablePool::with_capacity(2);
//! pool.register(Element::new(vec![0u8; 16])).unwrap();
//!
//! match pool.borrow_item().unwrap() {
//!     PoolItem::Element(buffer) => {
//!         println!("Got buffer of {} bytes", buffer.len());
//!         pool.release(buffer).unwrap();
//!     }
//!     PoolItem::Pill(pill) => println!("Told to stop: {:?}", pill.reason()),
//! }
//! ```

mod pool;
mod config;
mod element;
mod guard;
mod metrics;
mod health;
mod errors;

pub use pool::LockablePool;
pub use config::PoolConfiguration;
pub use element::{Element, ElementId, PillReason, PoisonPill, PoolItem};
pub use guard::{Checkout, PooledElement};
pub use metrics::{PoolMetrics, MetricsExporter};
pub use health::HealthStatus;
pub use errors::{PoolError, PoolResult};
