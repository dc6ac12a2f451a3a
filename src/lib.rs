//! Capacity-Based Leaf Queue Allocation Core
//!
//! This crate implements the leaf-queue allocation core of a hierarchical,
//! capacity-based cluster scheduler. Applications belong to users, users
//! submit applications to named leaf queues, and the scheduler awards
//! containers (fixed-sized slices of a node's free memory) to applications
//! as nodes report availability.
//!
//! Architecture:
//! - Admission control against queue and per-user application caps
//! - Capacity/limit evaluation against a cluster-wide resource pool
//! - Locality-preferred placement (node-local, rack-local, off-switch)
//! - FIFO-with-priority allocation, at most one container per heartbeat
//! - Bookkeeping of queue-used, user-used, utilization and container counts
//!   under a single queue-wide lock
//!
//! The hierarchical queue tree above the leaf, the node registry, container
//! token security internals and RPC plumbing are external collaborators
//! reached through the traits in [`cluster`].

pub mod cluster;
pub mod config;
pub mod limits;
pub mod placement;
pub mod queue;
pub mod resources;
pub mod types;

pub use cluster::*;
pub use config::*;
pub use limits::*;
pub use placement::*;
pub use queue::*;
pub use resources::*;
pub use types::*;

/// Application id type
pub type ApplicationId = uuid::Uuid;

/// Custom error types
#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    #[error(
        "queue {queue} already has {applications} applications, \
         cannot accept submission of application {app_id}"
    )]
    QueueFull {
        queue: String,
        applications: usize,
        app_id: ApplicationId,
    },

    #[error(
        "queue {queue} already has {applications} applications from user {user}, \
         cannot accept submission of application {app_id}"
    )]
    UserQueueFull {
        queue: String,
        user: String,
        applications: usize,
        app_id: ApplicationId,
    },

    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
