//! Scheduler Configuration
//!
//! Raw, per-queue-path capacity settings plus the global knobs shared by
//! every queue. Derived figures (absolute capacities, application caps) are
//! computed by [`crate::limits::QueueLimits`] at queue construction.

use crate::resources::Resource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw capacity settings for one queue path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Fraction of the parent's absolute share, in `[0.0, 1.0]`.
    pub capacity: f64,
    /// Hard ceiling as a fraction of the parent's absolute share.
    /// `None` means undefined: the queue may expand without bound.
    pub maximum_capacity: Option<f64>,
    /// Percentage floor on a single user's share under congestion, `1..=100`.
    pub user_limit: u32,
    /// Multiplier on queue capacity above which no single user may rise.
    pub user_limit_factor: f64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 1.0,
            maximum_capacity: None,
            user_limit: 100,
            user_limit_factor: 1.0,
        }
    }
}

/// Scheduler-wide configuration consulted when queues are built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacitySchedulerConfig {
    queues: HashMap<String, QueueSettings>,
    maximum_system_applications: usize,
    minimum_allocation: Resource,
}

impl Default for CapacitySchedulerConfig {
    fn default() -> Self {
        Self {
            queues: HashMap::new(),
            maximum_system_applications: 10_000,
            minimum_allocation: Resource::new(1024),
        }
    }
}

impl CapacitySchedulerConfig {
    pub fn new(maximum_system_applications: usize, minimum_allocation: Resource) -> Self {
        Self {
            queues: HashMap::new(),
            maximum_system_applications,
            minimum_allocation,
        }
    }

    /// Register settings for a queue path. Unregistered paths fall back to
    /// [`QueueSettings::default`].
    pub fn with_queue(mut self, queue_path: impl Into<String>, settings: QueueSettings) -> Self {
        self.queues.insert(queue_path.into(), settings);
        self
    }

    pub fn capacity(&self, queue_path: &str) -> f64 {
        self.settings(queue_path).capacity
    }

    pub fn maximum_capacity(&self, queue_path: &str) -> Option<f64> {
        self.settings(queue_path).maximum_capacity
    }

    pub fn user_limit(&self, queue_path: &str) -> u32 {
        self.settings(queue_path).user_limit
    }

    pub fn user_limit_factor(&self, queue_path: &str) -> f64 {
        self.settings(queue_path).user_limit_factor
    }

    pub fn maximum_system_applications(&self) -> usize {
        self.maximum_system_applications
    }

    pub fn minimum_allocation(&self) -> Resource {
        self.minimum_allocation
    }

    fn settings(&self, queue_path: &str) -> QueueSettings {
        self.queues.get(queue_path).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_path_uses_defaults() {
        let config = CapacitySchedulerConfig::default();

        assert_eq!(config.capacity("root.unknown"), 1.0);
        assert_eq!(config.maximum_capacity("root.unknown"), None);
        assert_eq!(config.user_limit("root.unknown"), 100);
        assert_eq!(config.user_limit_factor("root.unknown"), 1.0);
    }

    #[test]
    fn test_registered_path_settings() {
        let config = CapacitySchedulerConfig::new(100, Resource::new(1)).with_queue(
            "root.a",
            QueueSettings {
                capacity: 0.5,
                maximum_capacity: Some(0.6),
                user_limit: 25,
                user_limit_factor: 2.0,
            },
        );

        assert_eq!(config.capacity("root.a"), 0.5);
        assert_eq!(config.maximum_capacity("root.a"), Some(0.6));
        assert_eq!(config.user_limit("root.a"), 25);
        assert_eq!(config.user_limit_factor("root.a"), 2.0);
        assert_eq!(config.maximum_system_applications(), 100);
        assert_eq!(config.minimum_allocation(), Resource::new(1));
    }
}
