//! Health reporting for lockable pools

/// Health status of a pool
///
/// # Examples
///
/// ```
/// use lockable_pool::{Element, LockablePool};
///
/// let pool = LockablePool::with_capacity(3);
/// pool.register(Element::new("a")).unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.available_elements, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Borrowed share of capacity (0.0 to 1.0)
    pub utilization: f64,

    pub available_elements: usize,

    pub borrowed_elements: usize,

    pub total_capacity: usize,

    /// Whether the exclusive lock is currently held
    pub locked: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub fn new(available: usize, borrowed: usize, capacity: usize, locked: bool) -> Self {
        let utilization = if capacity > 0 {
            borrowed as f64 / capacity as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if available == 0 && capacity > 0 {
            warnings.push("Pool is empty".to_string());
        }

        if locked {
            warnings.push("Pool is locked for maintenance".to_string());
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            available_elements: available,
            borrowed_elements: borrowed,
            total_capacity: capacity,
            locked,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
