//! Capacity and Limit Evaluation
//!
//! Derived capacity figures for one leaf queue plus the two admission
//! predicates the allocation loop consults on every heartbeat: the queue's
//! absolute-maximum-capacity gate and the per-user share limit.

use crate::config::CapacitySchedulerConfig;
use crate::resources::{divide_and_ceil, Resource};
use crate::SchedulerError;
use tracing::info;

/// Immutable capacity figures derived from configuration when a leaf queue
/// is constructed.
#[derive(Debug, Clone)]
pub struct QueueLimits {
    /// Fraction of the parent's absolute share.
    pub capacity: f64,
    /// Fraction of the whole cluster: `parent_absolute * capacity`.
    pub absolute_capacity: f64,
    /// Configured ceiling fraction, `None` when undefined.
    pub max_capacity: Option<f64>,
    /// Ceiling as a fraction of the whole cluster; `f64::INFINITY` when the
    /// configured ceiling is undefined.
    pub absolute_max_capacity: f64,
    pub user_limit: u32,
    pub user_limit_factor: f64,
    /// The quantum used to normalize capacity arithmetic.
    pub minimum_allocation: Resource,
    pub max_applications: usize,
    pub max_applications_per_user: usize,
}

impl QueueLimits {
    /// Derive the figures for `queue_path` from raw configuration, rejecting
    /// out-of-range settings.
    pub fn derive(
        config: &CapacitySchedulerConfig,
        queue_path: &str,
        parent_absolute_capacity: f64,
    ) -> Result<Self, SchedulerError> {
        let capacity = config.capacity(queue_path);
        if !(0.0..=1.0).contains(&capacity) {
            return Err(SchedulerError::ConfigurationError(format!(
                "queue {queue_path}: capacity {capacity} outside [0.0, 1.0]"
            )));
        }

        let max_capacity = config.maximum_capacity(queue_path);
        if let Some(max) = max_capacity {
            if !(0.0..=1.0).contains(&max) {
                return Err(SchedulerError::ConfigurationError(format!(
                    "queue {queue_path}: maximum capacity {max} outside [0.0, 1.0]"
                )));
            }
        }

        let user_limit = config.user_limit(queue_path);
        if !(1..=100).contains(&user_limit) {
            return Err(SchedulerError::ConfigurationError(format!(
                "queue {queue_path}: user limit {user_limit} outside [1, 100]"
            )));
        }

        let user_limit_factor = config.user_limit_factor(queue_path);
        if user_limit_factor < 0.0 {
            return Err(SchedulerError::ConfigurationError(format!(
                "queue {queue_path}: user limit factor {user_limit_factor} is negative"
            )));
        }

        let absolute_capacity = parent_absolute_capacity * capacity;
        let absolute_max_capacity = max_capacity
            .map(|max| parent_absolute_capacity * max)
            .unwrap_or(f64::INFINITY);

        let max_applications =
            (config.maximum_system_applications() as f64 * absolute_capacity) as usize;
        let max_applications_per_user = (max_applications as f64
            * (user_limit as f64 / 100.0)
            * user_limit_factor) as usize;

        Ok(Self {
            capacity,
            absolute_capacity,
            max_capacity,
            absolute_max_capacity,
            user_limit,
            user_limit_factor,
            minimum_allocation: config.minimum_allocation(),
            max_applications,
            max_applications_per_user,
        })
    }

    /// Would granting `required` keep the queue's projected utilization at or
    /// below its absolute maximum capacity?
    ///
    /// A queue with no effective share of the cluster (empty cluster or zero
    /// absolute capacity) denies outright: the projection would be infinite,
    /// over any ceiling. Past that guard an undefined ceiling never denies,
    /// and the projection is never allowed to become NaN.
    pub fn fits_in_queue(&self, cluster: Resource, used: Resource, required: Resource) -> bool {
        let share = cluster.memory as f64 * self.absolute_capacity;
        if share <= 0.0 {
            return false;
        }

        if self.absolute_max_capacity.is_infinite() {
            return true;
        }

        let projected = (used.memory + required.memory) as f64 / share;
        if projected > self.absolute_max_capacity {
            info!(
                projected,
                required = required.memory,
                max_capacity = self.absolute_max_capacity,
                "projected utilization over maximum capacity"
            );
            return false;
        }
        true
    }

    /// The instantaneous cap on one user's consumption.
    ///
    /// Dynamic queue capacity equals the nominal share while the queue runs
    /// under it, else expands to include the new request. The cap is the
    /// larger of the fair-share floor and the configured percentage floor,
    /// bounded above by `queue capacity * user-limit-factor`.
    pub fn user_share_limit(
        &self,
        cluster: Resource,
        used: Resource,
        required: Resource,
        active_users: usize,
    ) -> u64 {
        // The max with `required` lets queues with a sub-quantum share still
        // make progress.
        let queue_capacity = divide_and_ceil(
            (self.absolute_capacity * cluster.memory as f64) as u64,
            self.minimum_allocation.memory,
        )
        .max(required.memory);

        let consumed = used.memory;
        let current_capacity = if consumed < queue_capacity {
            queue_capacity
        } else {
            consumed + required.memory
        };

        let fair_share = divide_and_ceil(current_capacity, active_users as u64);
        let configured_floor = divide_and_ceil(self.user_limit as u64 * current_capacity, 100);
        let ceiling = (queue_capacity as f64 * self.user_limit_factor) as u64;

        fair_share.max(configured_floor).min(ceiling)
    }

    /// Per-user share gate. The incoming `required` is left out of the
    /// user's side of the inequality to leave headroom for a fixed
    /// per-application overhead.
    pub fn fits_user_share(
        &self,
        user: &str,
        cluster: Resource,
        used: Resource,
        required: Resource,
        active_users: usize,
        user_consumed: Resource,
    ) -> bool {
        let limit = self.user_share_limit(cluster, used, required, active_users);
        if user_consumed.memory > limit {
            info!(
                user,
                consumed = user_consumed.memory,
                limit,
                required = required.memory,
                queue_consumed = used.memory,
                active_users,
                "user would exceed share limit"
            );
            return false;
        }
        true
    }
}
