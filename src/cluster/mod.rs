//! Cluster Collaborator Abstractions
//!
//! The leaf queue is a pure in-memory subsystem; everything around it (the
//! application lifecycle, the node registry, the queue tree above, token
//! security) is reached through the traits in this module. Application and
//! node traits are synchronous because they are only ever called under the
//! queue lock; the parent seam is asynchronous and is notified after the
//! lock is released.

use crate::resources::Resource;
use crate::types::{Container, ContainerTokenIdentifier, NodeType, Priority, ResourceRequest};
use crate::{ApplicationId, SchedulerError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Shared handle to an application. The leaf locks a handle only while
/// already holding its own lock (queue lock before application lock).
pub type ApplicationHandle = Arc<Mutex<dyn SchedulerApp>>;

/// An application submitted to a leaf queue.
pub trait SchedulerApp: Send {
    fn application_id(&self) -> ApplicationId;

    fn user(&self) -> &str;

    /// Active priorities, highest first. The allocation loop serves them in
    /// this order and never skips ahead.
    fn priorities(&self) -> Vec<Priority>;

    /// The outstanding request at a priority for a location key (host name,
    /// rack name, or [`crate::types::ANY`]).
    fn resource_request(&self, priority: Priority, location: &str) -> Option<ResourceRequest>;

    /// Allocate the next container sequence number.
    fn new_container_id(&mut self) -> u64;

    /// A container was granted against `request`.
    fn allocate(
        &mut self,
        node_type: NodeType,
        node: &dyn SchedulerNode,
        priority: Priority,
        request: &ResourceRequest,
        container: Container,
    );

    /// A previously granted container finished.
    fn completed_container(&mut self, container: &Container);

    /// Diagnostic hook: log the current request table.
    fn show_requests(&self) {}
}

/// A worker node as seen from the allocation path.
pub trait SchedulerNode: Send {
    fn host_name(&self) -> &str;

    fn rack_name(&self) -> &str;

    fn available_resource(&self) -> Resource;

    fn allocate_container(&mut self, app_id: ApplicationId, container: &Container);
}

/// The parent queue in the hierarchy. The leaf holds a non-owning reference
/// and forwards submission, completion and release events for tree-level
/// bookkeeping; all notifications happen outside the leaf's critical
/// section.
#[async_trait]
pub trait ParentQueue: Send + Sync {
    fn queue_path(&self) -> String;

    fn absolute_capacity(&self) -> f64;

    async fn submit_application(
        &self,
        app_id: ApplicationId,
        user: &str,
        queue: &str,
    ) -> Result<(), SchedulerError>;

    async fn finish_application(&self, app_id: ApplicationId, queue: &str);

    async fn completed_container(&self, cluster: Resource, container: &Container);
}

/// Mints container token passwords. Injecting one enables token minting on
/// every granted container.
pub trait ContainerTokenSecretManager: Send + Sync {
    fn create_password(&self, identifier: &ContainerTokenIdentifier) -> Vec<u8>;
}
