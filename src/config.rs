//! Pool configuration options

use std::time::Duration;

/// Configuration for a lockable pool
///
/// # Examples
///
/// ```
/// use lockable_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_size(8)
///     .with_name("interpreters")
///     .with_borrow_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.max_size, 8);
/// assert_eq!(config.name, "interpreters");
/// assert_eq!(config.borrow_timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Maximum number of elements that can be registered at once
    pub max_size: usize,

    /// Label used in log events and exported metrics
    pub name: String,

    /// Default wait budget for async borrows
    pub borrow_timeout: Option<Duration>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_size: 4,
            name: "pool".to_string(),
            borrow_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum pool size
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the default async borrow timeout
    pub fn with_borrow_timeout(mut self, timeout: Duration) -> Self {
        self.borrow_timeout = Some(timeout);
        self
    }

    /// Let async borrows wait indefinitely unless given an explicit timeout
    pub fn without_borrow_timeout(mut self) -> Self {
        self.borrow_timeout = None;
        self
    }
}
