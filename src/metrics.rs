//! Metrics collection and export for lockable pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics snapshot for a pool
///
/// # Examples
///
/// ```
/// use lockable_pool::{Element, LockablePool};
///
/// let pool = LockablePool::with_capacity(2);
/// pool.register(Element::new(1)).unwrap();
/// pool.register(Element::new(2)).unwrap();
///
/// let _item = pool.borrow_item().unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_borrowed, 1);
/// assert_eq!(metrics.borrowed_elements, 1);
/// assert_eq!(metrics.available_elements, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Total items handed out by borrows, pills included
    pub total_borrowed: usize,

    /// Total elements returned to the queue
    pub total_released: usize,

    /// Total elements released without being returned
    pub total_discarded: usize,

    pub pills_inserted: usize,

    /// Bounded borrows that gave up without an item
    pub borrow_timeouts: usize,

    /// Waits ended by an interrupt
    pub cancellations: usize,

    pub lock_acquisitions: usize,

    /// Registrations rejected because the pool was full
    pub capacity_rejections: usize,

    /// Elements currently queued
    pub available_elements: usize,

    /// Registered elements currently out on loan
    pub borrowed_elements: usize,

    pub registered_elements: usize,

    pub max_capacity: usize,

    /// Borrowed share of capacity (0.0 to 1.0)
    pub utilization: f64,

    pub locked: bool,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_discarded".to_string(), self.total_discarded.to_string());
        metrics.insert("pills_inserted".to_string(), self.pills_inserted.to_string());
        metrics.insert("borrow_timeouts".to_string(), self.borrow_timeouts.to_string());
        metrics.insert("cancellations".to_string(), self.cancellations.to_string());
        metrics.insert("lock_acquisitions".to_string(), self.lock_acquisitions.to_string());
        metrics.insert("capacity_rejections".to_string(), self.capacity_rejections.to_string());
        metrics.insert("available_elements".to_string(), self.available_elements.to_string());
        metrics.insert("borrowed_elements".to_string(), self.borrowed_elements.to_string());
        metrics.insert("registered_elements".to_string(), self.registered_elements.to_string());
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("locked".to_string(), self.locked.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use lockable_pool::LockablePool;
    /// use std::collections::HashMap;
    ///
    /// let pool = LockablePool::<u32>::with_capacity(2);
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "compile".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("interpreters", Some(&tags));
    /// assert!(output.contains("lockablepool_elements_borrowed"));
    /// assert!(output.contains("service=\"compile\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        let gauges: [(&str, &str, String); 6] = [
            ("lockablepool_elements_available", "Elements currently queued", metrics.available_elements.to_string()),
            ("lockablepool_elements_borrowed", "Elements currently borrowed", metrics.borrowed_elements.to_string()),
            ("lockablepool_elements_registered", "Elements currently registered", metrics.registered_elements.to_string()),
            ("lockablepool_capacity", "Maximum number of registered elements", metrics.max_capacity.to_string()),
            ("lockablepool_utilization", "Pool utilization ratio", format!("{:.2}", metrics.utilization)),
            ("lockablepool_locked", "Whether the exclusive pool lock is held", u8::from(metrics.locked).to_string()),
        ];
        for (name, help, value) in &gauges {
            Self::push_metric(&mut output, name, help, "gauge", &labels, value);
        }

        let counters: [(&str, &str, usize); 8] = [
            ("lockablepool_borrowed_total", "Total items borrowed", metrics.total_borrowed),
            ("lockablepool_released_total", "Total elements released to the pool", metrics.total_released),
            ("lockablepool_discarded_total", "Total elements released without return", metrics.total_discarded),
            ("lockablepool_pills_inserted_total", "Total poison pills inserted", metrics.pills_inserted),
            ("lockablepool_borrow_timeouts_total", "Bounded borrows that timed out", metrics.borrow_timeouts),
            ("lockablepool_cancellations_total", "Waits cancelled by interrupt", metrics.cancellations),
            ("lockablepool_lock_acquisitions_total", "Exclusive lock acquisitions", metrics.lock_acquisitions),
            ("lockablepool_capacity_rejections_total", "Registrations rejected at capacity", metrics.capacity_rejections),
        ];
        for (name, help, value) in &counters {
            Self::push_metric(&mut output, name, help, "counter", &labels, &value.to_string());
        }

        output
    }

    /// Build a `prometheus` registry holding the snapshot's values
    ///
    /// # Examples
    ///
    /// ```
    /// use lockable_pool::{LockablePool, MetricsExporter};
    ///
    /// let pool = LockablePool::<u32>::with_capacity(2);
    /// let registry = MetricsExporter::to_registry(&pool.get_metrics(), "interpreters").unwrap();
    /// assert!(!registry.gather().is_empty());
    /// ```
    #[cfg(feature = "prometheus")]
    pub fn to_registry(
        metrics: &PoolMetrics,
        pool_name: &str,
    ) -> prometheus::Result<prometheus::Registry> {
        use prometheus::{IntCounter, IntGauge, Opts, Registry};

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_label("pool", pool_name);

        let gauges = [
            ("lockablepool_elements_available", "Elements currently queued", metrics.available_elements),
            ("lockablepool_elements_borrowed", "Elements currently borrowed", metrics.borrowed_elements),
            ("lockablepool_elements_registered", "Elements currently registered", metrics.registered_elements),
            ("lockablepool_capacity", "Maximum number of registered elements", metrics.max_capacity),
            ("lockablepool_locked", "Whether the exclusive pool lock is held", usize::from(metrics.locked)),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let counters = [
            ("lockablepool_borrowed_total", "Total items borrowed", metrics.total_borrowed),
            ("lockablepool_released_total", "Total elements released to the pool", metrics.total_released),
            ("lockablepool_discarded_total", "Total elements released without return", metrics.total_discarded),
            ("lockablepool_pills_inserted_total", "Total poison pills inserted", metrics.pills_inserted),
            ("lockablepool_borrow_timeouts_total", "Bounded borrows that timed out", metrics.borrow_timeouts),
            ("lockablepool_cancellations_total", "Waits cancelled by interrupt", metrics.cancellations),
            ("lockablepool_lock_acquisitions_total", "Exclusive lock acquisitions", metrics.lock_acquisitions),
            ("lockablepool_capacity_rejections_total", "Registrations rejected at capacity", metrics.capacity_rejections),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help))?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter))?;
        }

        Ok(registry)
    }

    fn push_metric(output: &mut String, name: &str, help: &str, kind: &str, labels: &str, value: &str) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_borrowed: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_discarded: AtomicUsize,
    pub pills_inserted: AtomicUsize,
    pub borrow_timeouts: AtomicUsize,
    pub cancellations: AtomicUsize,
    pub lock_acquisitions: AtomicUsize,
    pub capacity_rejections: AtomicUsize,
}

/// Point-in-time pool occupancy, read under the pool mutex
pub(crate) struct Occupancy {
    pub available: usize,
    pub registered: usize,
    pub capacity: usize,
    pub locked: bool,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, occupancy: Occupancy) -> PoolMetrics {
        let borrowed = occupancy.registered.saturating_sub(occupancy.available);
        let utilization = if occupancy.capacity > 0 {
            borrowed as f64 / occupancy.capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_discarded: self.total_discarded.load(Ordering::Relaxed),
            pills_inserted: self.pills_inserted.load(Ordering::Relaxed),
            borrow_timeouts: self.borrow_timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            lock_acquisitions: self.lock_acquisitions.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            available_elements: occupancy.available,
            borrowed_elements: borrowed,
            registered_elements: occupancy.registered,
            max_capacity: occupancy.capacity,
            utilization,
            locked: occupancy.locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PoolMetrics {
        let tracker = MetricsTracker::new();
        MetricsTracker::increment(&tracker.total_borrowed);
        MetricsTracker::increment(&tracker.total_borrowed);
        MetricsTracker::increment(&tracker.total_released);
        tracker.get_metrics(Occupancy {
            available: 1,
            registered: 3,
            capacity: 4,
            locked: true,
        })
    }

    #[test]
    fn test_snapshot_derives_borrowed_and_utilization() {
        let metrics = snapshot();
        assert_eq!(metrics.total_borrowed, 2);
        assert_eq!(metrics.total_released, 1);
        assert_eq!(metrics.borrowed_elements, 2);
        assert!((metrics.utilization - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_export_formats() {
        let metrics = snapshot();
        let map = metrics.export();
        assert_eq!(map["utilization"], "0.50");
        assert_eq!(map["locked"], "true");

        let text = MetricsExporter::export_prometheus(&metrics, "p", None);
        assert!(text.contains("lockablepool_locked{pool=\"p\"} 1\n"));
        assert!(text.contains("# TYPE lockablepool_borrowed_total counter\n"));
        assert!(text.contains("lockablepool_borrowed_total{pool=\"p\"} 2\n"));
    }
}
