//! Leaf Queue
//!
//! The terminal node of the queue tree: it holds applications directly and
//! awards at most one container per node heartbeat. Submissions are checked
//! against queue and per-user application caps; queue-used, user-used,
//! utilization and container-count totals stay accurate under concurrent
//! mutation.
//!
//! All state lives behind a single queue-wide mutex. Per-application locks
//! are only ever taken while the queue lock is held, and the parent queue
//! is notified after the leaf releases its lock.

use crate::cluster::{
    ApplicationHandle, ContainerTokenSecretManager, ParentQueue, SchedulerNode,
};
use crate::config::CapacitySchedulerConfig;
use crate::limits::QueueLimits;
use crate::placement;
use crate::resources::Resource;
use crate::types::{Container, ContainerId, ANY};
use crate::{ApplicationId, SchedulerError};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Per-user accounting. Records are created lazily on first submission and
/// removed when the user's last application finishes.
#[derive(Debug, Clone, Default)]
pub struct User {
    consumed: Resource,
    applications: usize,
}

impl User {
    pub fn consumed(&self) -> Resource {
        self.consumed
    }

    pub fn applications(&self) -> usize {
        self.applications
    }

    fn submit_application(&mut self) {
        self.applications += 1;
    }

    fn finish_application(&mut self) {
        self.applications = self.applications.saturating_sub(1);
    }

    fn assign_container(&mut self, resource: Resource) {
        self.consumed += resource;
    }

    fn release_container(&mut self, resource: Resource) {
        self.consumed -= resource;
    }
}

/// An application as held by the leaf queue.
#[derive(Clone)]
pub struct QueuedApplication {
    pub app_id: ApplicationId,
    pub user: String,
    pub submitted_at: DateTime<Utc>,
    pub handle: ApplicationHandle,
}

/// Ordering policy over queued applications. Iteration during allocation
/// follows this order deterministically.
pub type ApplicationComparator =
    Arc<dyn Fn(&QueuedApplication, &QueuedApplication) -> Ordering + Send + Sync>;

/// The canonical policy: ascending submission time, ties broken by id.
pub fn fifo_comparator() -> ApplicationComparator {
    Arc::new(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.app_id.cmp(&b.app_id))
    })
}

#[derive(Default)]
struct LeafQueueInner {
    used_resources: Resource,
    utilization: f64,
    used_capacity: f64,
    num_containers: usize,
    applications: Vec<QueuedApplication>,
    users: HashMap<String, User>,
    live_containers: HashSet<ContainerId>,
}

/// A leaf queue of the capacity scheduler.
pub struct LeafQueue {
    queue_name: String,
    parent: Arc<dyn ParentQueue>,
    limits: QueueLimits,
    comparator: ApplicationComparator,
    secret_manager: Option<Arc<dyn ContainerTokenSecretManager>>,
    inner: Mutex<LeafQueueInner>,
}

impl LeafQueue {
    pub fn new(
        queue_name: impl Into<String>,
        parent: Arc<dyn ParentQueue>,
        config: &CapacitySchedulerConfig,
        comparator: ApplicationComparator,
        secret_manager: Option<Arc<dyn ContainerTokenSecretManager>>,
    ) -> Result<Self, SchedulerError> {
        let queue_name = queue_name.into();
        let queue_path = format!("{}.{}", parent.queue_path(), queue_name);
        let limits = QueueLimits::derive(config, &queue_path, parent.absolute_capacity())?;

        info!(
            queue = %queue_path,
            capacity = limits.capacity,
            absolute_capacity = limits.absolute_capacity,
            max_capacity = ?limits.max_capacity,
            absolute_max_capacity = limits.absolute_max_capacity,
            user_limit = limits.user_limit,
            user_limit_factor = limits.user_limit_factor,
            max_applications = limits.max_applications,
            max_applications_per_user = limits.max_applications_per_user,
            "leaf queue configured"
        );

        Ok(Self {
            queue_name,
            parent,
            limits,
            comparator,
            secret_manager,
            inner: Mutex::new(LeafQueueInner::default()),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn queue_path(&self) -> String {
        format!("{}.{}", self.parent.queue_path(), self.queue_name)
    }

    pub fn capacity(&self) -> f64 {
        self.limits.capacity
    }

    pub fn absolute_capacity(&self) -> f64 {
        self.limits.absolute_capacity
    }

    pub fn maximum_capacity(&self) -> Option<f64> {
        self.limits.max_capacity
    }

    pub fn absolute_maximum_capacity(&self) -> f64 {
        self.limits.absolute_max_capacity
    }

    pub fn used_resources(&self) -> Resource {
        self.inner.lock().unwrap().used_resources
    }

    pub fn utilization(&self) -> f64 {
        self.inner.lock().unwrap().utilization
    }

    pub fn used_capacity(&self) -> f64 {
        self.inner.lock().unwrap().used_capacity
    }

    pub fn num_applications(&self) -> usize {
        self.inner.lock().unwrap().applications.len()
    }

    pub fn num_containers(&self) -> usize {
        self.inner.lock().unwrap().num_containers
    }

    /// Snapshot of queued application ids in allocation order.
    pub fn applications(&self) -> Vec<ApplicationId> {
        self.inner
            .lock()
            .unwrap()
            .applications
            .iter()
            .map(|queued| queued.app_id)
            .collect()
    }

    /// A user's consumed resource, if the user currently has applications.
    pub fn user_consumed(&self, user: &str) -> Option<Resource> {
        self.inner
            .lock()
            .unwrap()
            .users
            .get(user)
            .map(User::consumed)
    }

    /// A user's active application count, if the user is known.
    pub fn user_applications(&self, user: &str) -> Option<usize> {
        self.inner
            .lock()
            .unwrap()
            .users
            .get(user)
            .map(User::applications)
    }

    pub fn active_users(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    /// Admit an application to this queue.
    ///
    /// Rejects when the queue's application cap or the submitting user's
    /// per-user cap is reached; a rejection leaves queue state untouched.
    /// The parent queue is informed after the leaf's lock is released.
    pub async fn submit_application(
        &self,
        app: ApplicationHandle,
        user: &str,
    ) -> Result<(), SchedulerError> {
        let app_id = app.lock().unwrap().application_id();

        {
            let mut inner = self.inner.lock().unwrap();

            if inner.applications.len() >= self.limits.max_applications {
                return Err(SchedulerError::QueueFull {
                    queue: self.queue_path(),
                    applications: inner.applications.len(),
                    app_id,
                });
            }

            let user_applications = inner
                .users
                .get(user)
                .map(User::applications)
                .unwrap_or(0);
            if user_applications >= self.limits.max_applications_per_user {
                return Err(SchedulerError::UserQueueFull {
                    queue: self.queue_path(),
                    user: user.to_string(),
                    applications: user_applications,
                    app_id,
                });
            }

            inner
                .users
                .entry(user.to_string())
                .or_default()
                .submit_application();

            let entry = QueuedApplication {
                app_id,
                user: user.to_string(),
                submitted_at: Utc::now(),
                handle: app,
            };
            let index = match inner
                .applications
                .binary_search_by(|probe| (self.comparator)(probe, &entry))
            {
                Ok(index) | Err(index) => index,
            };
            inner.applications.insert(index, entry);

            info!(
                queue = %self.queue_name,
                app = %app_id,
                user,
                user_applications = user_applications + 1,
                queue_applications = inner.applications.len(),
                "application submitted"
            );
        }

        self.parent
            .submit_application(app_id, user, &self.queue_name)
            .await
    }

    /// Remove a finished application. The user record goes away with the
    /// user's last application.
    pub async fn finish_application(&self, app_id: ApplicationId) {
        {
            let mut inner = self.inner.lock().unwrap();

            let Some(index) = inner
                .applications
                .iter()
                .position(|queued| queued.app_id == app_id)
            else {
                warn!(
                    queue = %self.queue_name,
                    app = %app_id,
                    "finish for unknown application ignored"
                );
                return;
            };
            let entry = inner.applications.remove(index);

            let mut user_applications = 0;
            let drop_user = if let Some(user) = inner.users.get_mut(&entry.user) {
                user.finish_application();
                user_applications = user.applications;
                user.applications == 0
            } else {
                false
            };
            if drop_user {
                inner.users.remove(&entry.user);
            }

            info!(
                queue = %self.queue_name,
                app = %app_id,
                user = %entry.user,
                user_applications,
                queue_applications = inner.applications.len(),
                "application finished"
            );
        }

        self.parent.finish_application(app_id, &self.queue_name).await;
    }

    /// One node heartbeat: walk applications in comparator order and
    /// priorities in each application's order, and award at most one
    /// container.
    ///
    /// Hitting the queue cap or a user's share cap ends the search for this
    /// heartbeat entirely. An application whose top placeable priority
    /// cannot land on this node is skipped without considering its lower
    /// priorities, preserving priority order.
    pub fn assign_containers(&self, cluster: Resource, node: &mut dyn SchedulerNode) -> Resource {
        let mut inner = self.inner.lock().unwrap();

        debug!(
            queue = %self.queue_name,
            node = node.host_name(),
            applications = inner.applications.len(),
            "assign containers"
        );

        let candidates = inner.applications.clone();
        for candidate in &candidates {
            let mut app = candidate.handle.lock().unwrap();
            app.show_requests();

            for priority in app.priorities() {
                // Does the application need containers at this priority?
                let Some(off_switch) = app.resource_request(priority, ANY) else {
                    continue;
                };
                if off_switch.num_containers == 0 {
                    continue;
                }

                if !self.limits.fits_in_queue(
                    cluster,
                    inner.used_resources,
                    off_switch.capability,
                ) {
                    info!(
                        queue = %self.queue_name,
                        utilization = inner.utilization,
                        required = off_switch.capability.memory,
                        "maximum capacity reached, heartbeat yields nothing"
                    );
                    return Resource::none();
                }

                let active_users = inner.users.len();
                let user_consumed = inner
                    .users
                    .get(&candidate.user)
                    .map(User::consumed)
                    .unwrap_or_default();
                if !self.limits.fits_user_share(
                    &candidate.user,
                    cluster,
                    inner.used_resources,
                    off_switch.capability,
                    active_users,
                    user_consumed,
                ) {
                    return Resource::none();
                }

                match placement::assign_on_node(
                    cluster,
                    node,
                    &mut *app,
                    priority,
                    self.secret_manager.as_deref(),
                ) {
                    Some(allocation) => {
                        let granted = allocation.container.capability;
                        inner.live_containers.insert(allocation.container.id);
                        Self::allocate_resource(
                            &mut inner,
                            &self.limits,
                            cluster,
                            &candidate.user,
                            granted,
                        );

                        info!(
                            queue = %self.queue_name,
                            container = %allocation.container.id,
                            node_type = %allocation.node_type,
                            user = %candidate.user,
                            used = inner.used_resources.memory,
                            utilization = inner.utilization,
                            num_containers = inner.num_containers,
                            "container assigned"
                        );
                        return granted;
                    }
                    // Do not assign out of order w.r.t. priorities
                    None => break,
                }
            }
        }

        Resource::none()
    }

    /// A container finished: release its resource and tell the application
    /// and the parent. Completions for containers this queue never granted
    /// (or already released) are ignored.
    pub async fn completed_container(
        &self,
        cluster: Resource,
        container: &Container,
        app: ApplicationHandle,
    ) {
        {
            let mut inner = self.inner.lock().unwrap();

            if !inner.live_containers.remove(&container.id) {
                warn!(
                    queue = %self.queue_name,
                    container = %container.id,
                    "completion for unknown container ignored"
                );
                return;
            }

            let user = {
                let mut application = app.lock().unwrap();
                application.completed_container(container);
                application.user().to_string()
            };

            Self::release_resource(&mut inner, &self.limits, cluster, &user, container.capability);

            info!(
                queue = %self.queue_name,
                container = %container.id,
                user = %user,
                used = inner.used_resources.memory,
                utilization = inner.utilization,
                num_containers = inner.num_containers,
                "container completed"
            );
        }

        self.parent.completed_container(cluster, container).await;
    }

    fn allocate_resource(
        inner: &mut LeafQueueInner,
        limits: &QueueLimits,
        cluster: Resource,
        user: &str,
        resource: Resource,
    ) {
        inner.used_resources += resource;
        inner.num_containers += 1;
        inner
            .users
            .entry(user.to_string())
            .or_default()
            .assign_container(resource);
        Self::update(inner, limits, cluster);
    }

    fn release_resource(
        inner: &mut LeafQueueInner,
        limits: &QueueLimits,
        cluster: Resource,
        user: &str,
        resource: Resource,
    ) {
        inner.used_resources -= resource;
        inner.num_containers = inner.num_containers.saturating_sub(1);
        if let Some(record) = inner.users.get_mut(user) {
            record.release_container(resource);
        }
        Self::update(inner, limits, cluster);
    }

    /// Recompute the derived figures. A queue with no effective share (or an
    /// empty cluster) reads as zero rather than NaN.
    fn update(inner: &mut LeafQueueInner, limits: &QueueLimits, cluster: Resource) {
        let used = inner.used_resources.memory as f64;

        let absolute_share = cluster.memory as f64 * limits.absolute_capacity;
        inner.utilization = if absolute_share > 0.0 {
            used / absolute_share
        } else {
            0.0
        };

        let configured_share = cluster.memory as f64 * limits.capacity;
        inner.used_capacity = if configured_share > 0.0 {
            used / configured_share
        } else {
            0.0
        };
    }
}

impl fmt::Display for LeafQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(
            f,
            "{}: capacity={:.2}, absoluteCapacity={:.2}, usedCapacity={:.2}, \
             utilization={:.2}, numApplications={}, numContainers={}",
            self.queue_name,
            self.limits.capacity,
            self.limits.absolute_capacity,
            inner.used_capacity,
            inner.utilization,
            inner.applications.len(),
            inner.num_containers
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SchedulerApp;
    use crate::config::QueueSettings;
    use crate::types::{NodeType, Priority, ResourceRequest};
    use async_trait::async_trait;

    struct TestApp {
        id: ApplicationId,
        user: String,
        priorities: Vec<Priority>,
        requests: HashMap<(Priority, String), ResourceRequest>,
        next_container: u64,
        allocated: Vec<(NodeType, Container)>,
        completed: Vec<ContainerId>,
    }

    impl TestApp {
        fn new(id: u128, user: &str) -> Self {
            Self {
                id: uuid::Uuid::from_u128(id),
                user: user.to_string(),
                priorities: Vec::new(),
                requests: HashMap::new(),
                next_container: 0,
                allocated: Vec::new(),
                completed: Vec::new(),
            }
        }

        fn with_request(mut self, priority: Priority, request: ResourceRequest) -> Self {
            if !self.priorities.contains(&priority) {
                self.priorities.push(priority);
                self.priorities.sort();
                self.priorities.reverse();
            }
            self.requests
                .insert((priority, request.location.clone()), request);
            self
        }

        fn into_handle(self) -> Arc<Mutex<TestApp>> {
            Arc::new(Mutex::new(self))
        }
    }

    impl SchedulerApp for TestApp {
        fn application_id(&self) -> ApplicationId {
            self.id
        }

        fn user(&self) -> &str {
            &self.user
        }

        fn priorities(&self) -> Vec<Priority> {
            self.priorities.clone()
        }

        fn resource_request(&self, priority: Priority, location: &str) -> Option<ResourceRequest> {
            self.requests.get(&(priority, location.to_string())).cloned()
        }

        fn new_container_id(&mut self) -> u64 {
            self.next_container += 1;
            self.next_container
        }

        fn allocate(
            &mut self,
            node_type: NodeType,
            _node: &dyn SchedulerNode,
            priority: Priority,
            request: &ResourceRequest,
            container: Container,
        ) {
            if let Some(outstanding) =
                self.requests.get_mut(&(priority, request.location.clone()))
            {
                outstanding.num_containers = outstanding.num_containers.saturating_sub(1);
            }
            self.allocated.push((node_type, container));
        }

        fn completed_container(&mut self, container: &Container) {
            self.completed.push(container.id);
        }
    }

    struct TestNode {
        host: String,
        rack: String,
        available: Resource,
    }

    impl TestNode {
        fn new(host: &str, rack: &str, available: u64) -> Self {
            Self {
                host: host.to_string(),
                rack: rack.to_string(),
                available: Resource::new(available),
            }
        }
    }

    impl SchedulerNode for TestNode {
        fn host_name(&self) -> &str {
            &self.host
        }

        fn rack_name(&self) -> &str {
            &self.rack
        }

        fn available_resource(&self) -> Resource {
            self.available
        }

        fn allocate_container(&mut self, _app_id: ApplicationId, container: &Container) {
            self.available -= container.capability;
        }
    }

    #[derive(Default)]
    struct TestParent {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ParentQueue for TestParent {
        fn queue_path(&self) -> String {
            "root".to_string()
        }

        fn absolute_capacity(&self) -> f64 {
            1.0
        }

        async fn submit_application(
            &self,
            app_id: ApplicationId,
            user: &str,
            queue: &str,
        ) -> Result<(), SchedulerError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("submit:{app_id}:{user}:{queue}"));
            Ok(())
        }

        async fn finish_application(&self, app_id: ApplicationId, queue: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finish:{app_id}:{queue}"));
        }

        async fn completed_container(&self, _cluster: Resource, container: &Container) {
            self.events
                .lock()
                .unwrap()
                .push(format!("completed:{}", container.id));
        }
    }

    fn queue_with(settings: QueueSettings, system_max: usize, min_alloc: u64) -> LeafQueue {
        let config = CapacitySchedulerConfig::new(system_max, Resource::new(min_alloc))
            .with_queue("root.default", settings);
        LeafQueue::new(
            "default",
            Arc::new(TestParent::default()),
            &config,
            fifo_comparator(),
            None,
        )
        .unwrap()
    }

    fn off_switch_app(id: u128, user: &str, capability: u64, count: u32) -> Arc<Mutex<TestApp>> {
        TestApp::new(id, user)
            .with_request(
                Priority(1),
                ResourceRequest::new(ANY, Resource::new(capability), count),
            )
            .into_handle()
    }

    #[tokio::test]
    async fn test_fifo_order_across_heartbeats() {
        let queue = queue_with(QueueSettings::default(), 10_000, 1);
        let cluster = Resource::new(10);

        let app_a = off_switch_app(1, "u1", 1, 1);
        let app_b = off_switch_app(2, "u2", 1, 1);
        queue.submit_application(app_a, "u1").await.unwrap();
        queue.submit_application(app_b, "u2").await.unwrap();

        let mut node = TestNode::new("host-a", "rack-1", 10);
        assert_eq!(queue.assign_containers(cluster, &mut node), Resource::new(1));
        assert_eq!(queue.assign_containers(cluster, &mut node), Resource::new(1));
        assert_eq!(queue.assign_containers(cluster, &mut node), Resource::none());

        assert_eq!(queue.used_resources(), Resource::new(2));
        assert_eq!(queue.num_containers(), 2);
        assert_eq!(queue.user_consumed("u1"), Some(Resource::new(1)));
        assert_eq!(queue.user_consumed("u2"), Some(Resource::new(1)));
    }

    #[tokio::test]
    async fn test_queue_application_cap() {
        // system max 4 at full capacity: at most 4 applications in queue
        let queue = queue_with(QueueSettings::default(), 4, 1);

        for id in 1..=4 {
            queue
                .submit_application(off_switch_app(id, "u1", 1, 1), "u1")
                .await
                .unwrap();
        }

        let rejected = queue
            .submit_application(off_switch_app(5, "u2", 1, 1), "u2")
            .await;
        assert!(matches!(rejected, Err(SchedulerError::QueueFull { .. })));
        assert_eq!(queue.num_applications(), 4);
        // the rejected user never left a record behind
        assert_eq!(queue.user_applications("u2"), None);
    }

    #[tokio::test]
    async fn test_per_user_application_cap() {
        // max applications 4, user limit 50%, factor 1 -> 2 per user
        let queue = queue_with(
            QueueSettings {
                user_limit: 50,
                ..QueueSettings::default()
            },
            4,
            1,
        );

        queue
            .submit_application(off_switch_app(1, "u1", 1, 1), "u1")
            .await
            .unwrap();
        queue
            .submit_application(off_switch_app(2, "u1", 1, 1), "u1")
            .await
            .unwrap();

        let rejected = queue
            .submit_application(off_switch_app(3, "u1", 1, 1), "u1")
            .await;
        assert!(matches!(
            rejected,
            Err(SchedulerError::UserQueueFull { .. })
        ));
        assert_eq!(queue.num_applications(), 2);
        assert_eq!(queue.user_applications("u1"), Some(2));
    }

    #[tokio::test]
    async fn test_finish_application_drops_empty_user() {
        let queue = queue_with(QueueSettings::default(), 10_000, 1);

        let app = off_switch_app(1, "u1", 1, 1);
        let app_id = app.lock().unwrap().application_id();
        queue.submit_application(app, "u1").await.unwrap();
        assert_eq!(queue.user_applications("u1"), Some(1));

        queue.finish_application(app_id).await;
        assert_eq!(queue.num_applications(), 0);
        assert_eq!(queue.user_applications("u1"), None);
        assert_eq!(queue.active_users(), 0);
    }

    #[tokio::test]
    async fn test_finish_unknown_application_is_ignored() {
        let queue = queue_with(QueueSettings::default(), 10_000, 1);
        queue.finish_application(uuid::Uuid::from_u128(42)).await;
        assert_eq!(queue.num_applications(), 0);
    }

    #[tokio::test]
    async fn test_maximum_capacity_ends_heartbeat() {
        // Queue holds half the cluster with a 0.6 ceiling; once used memory
        // projects past it the heartbeat yields nothing even though another
        // application is waiting.
        let queue = queue_with(
            QueueSettings {
                capacity: 0.5,
                maximum_capacity: Some(0.6),
                user_limit_factor: 100.0,
                ..QueueSettings::default()
            },
            10_000,
            1,
        );
        let cluster = Resource::new(100);

        queue
            .submit_application(off_switch_app(1, "u1", 29, 1), "u1")
            .await
            .unwrap();
        queue
            .submit_application(off_switch_app(2, "u2", 2, 1), "u2")
            .await
            .unwrap();

        let mut node = TestNode::new("host-a", "rack-1", 100);
        assert_eq!(
            queue.assign_containers(cluster, &mut node),
            Resource::new(29)
        );

        // 29 used; +2 projects to 31/50 = 0.62 > 0.6
        assert_eq!(queue.assign_containers(cluster, &mut node), Resource::none());
        assert_eq!(queue.num_containers(), 1);
    }

    #[tokio::test]
    async fn test_priority_order_within_application() {
        let app = TestApp::new(1, "u1")
            .with_request(
                Priority(2),
                ResourceRequest::new(ANY, Resource::new(4), 1),
            )
            .with_request(
                Priority(1),
                ResourceRequest::new(ANY, Resource::new(2), 1),
            )
            .into_handle();

        let queue = queue_with(QueueSettings::default(), 10_000, 1);
        queue.submit_application(app.clone(), "u1").await.unwrap();

        // Priorities are reported highest first; the higher priority's
        // larger ask is served before the lower one.
        let cluster = Resource::new(100);
        let mut node = TestNode::new("host-a", "rack-1", 10);
        assert_eq!(queue.assign_containers(cluster, &mut node), Resource::new(4));
        assert_eq!(queue.assign_containers(cluster, &mut node), Resource::new(2));

        let allocated: Vec<u64> = app
            .lock()
            .unwrap()
            .allocated
            .iter()
            .map(|(_, container)| container.capability.memory)
            .collect();
        assert_eq!(allocated, vec![4, 2]);
    }

    #[tokio::test]
    async fn test_unplaceable_top_priority_blocks_lower_ones() {
        // The top priority asks for more than the node can hold; the lower
        // priority would fit but must not be served out of order.
        let app = TestApp::new(1, "u1")
            .with_request(
                Priority(2),
                ResourceRequest::new(ANY, Resource::new(8), 1),
            )
            .with_request(
                Priority(1),
                ResourceRequest::new(ANY, Resource::new(1), 1),
            )
            .into_handle();

        let queue = queue_with(QueueSettings::default(), 10_000, 1);
        queue.submit_application(app, "u1").await.unwrap();

        let mut node = TestNode::new("host-a", "rack-1", 4);
        assert_eq!(
            queue.assign_containers(Resource::new(100), &mut node),
            Resource::none()
        );
        assert_eq!(queue.num_containers(), 0);
    }

    #[tokio::test]
    async fn test_completion_releases_resources() {
        let queue = queue_with(QueueSettings::default(), 10_000, 1);
        let cluster = Resource::new(10);

        let app_a = off_switch_app(1, "u1", 1, 1);
        let app_b = off_switch_app(2, "u2", 1, 1);
        queue.submit_application(app_a.clone(), "u1").await.unwrap();
        queue.submit_application(app_b, "u2").await.unwrap();

        let mut node = TestNode::new("host-a", "rack-1", 10);
        queue.assign_containers(cluster, &mut node);
        queue.assign_containers(cluster, &mut node);

        let container = app_a.lock().unwrap().allocated[0].1.clone();
        queue
            .completed_container(cluster, &container, app_a.clone())
            .await;

        assert_eq!(queue.used_resources(), Resource::new(1));
        assert_eq!(queue.num_containers(), 1);
        assert_eq!(queue.user_consumed("u1"), Some(Resource::none()));
        // u1 still has an application, so the record survives
        assert_eq!(queue.user_applications("u1"), Some(1));
        assert_eq!(app_a.lock().unwrap().completed, vec![container.id]);
    }

    #[tokio::test]
    async fn test_unknown_completion_leaves_state_unchanged() {
        let queue = queue_with(QueueSettings::default(), 10_000, 1);
        let cluster = Resource::new(10);

        let app = off_switch_app(1, "u1", 1, 1);
        queue.submit_application(app.clone(), "u1").await.unwrap();

        let mut node = TestNode::new("host-a", "rack-1", 10);
        queue.assign_containers(cluster, &mut node);

        let phantom = Container::new(uuid::Uuid::from_u128(1), 99, "host-a", Resource::new(1));
        queue.completed_container(cluster, &phantom, app.clone()).await;

        assert_eq!(queue.used_resources(), Resource::new(1));
        assert_eq!(queue.num_containers(), 1);
        assert!(app.lock().unwrap().completed.is_empty());

        // Completing the real container twice releases exactly once.
        let container = app.lock().unwrap().allocated[0].1.clone();
        queue.completed_container(cluster, &container, app.clone()).await;
        queue.completed_container(cluster, &container, app.clone()).await;
        assert_eq!(queue.used_resources(), Resource::none());
        assert_eq!(queue.num_containers(), 0);
    }

    #[tokio::test]
    async fn test_parent_notified_of_lifecycle_events() {
        let parent = Arc::new(TestParent::default());
        let config = CapacitySchedulerConfig::new(10_000, Resource::new(1));
        let queue = LeafQueue::new(
            "default",
            parent.clone(),
            &config,
            fifo_comparator(),
            None,
        )
        .unwrap();
        let cluster = Resource::new(10);

        let app = off_switch_app(1, "u1", 1, 1);
        let app_id = app.lock().unwrap().application_id();
        queue.submit_application(app.clone(), "u1").await.unwrap();

        let mut node = TestNode::new("host-a", "rack-1", 10);
        queue.assign_containers(cluster, &mut node);

        let container = app.lock().unwrap().allocated[0].1.clone();
        queue.completed_container(cluster, &container, app.clone()).await;
        queue.finish_application(app_id).await;

        let events = parent.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                format!("submit:{app_id}:u1:default"),
                format!("completed:{}", container.id),
                format!("finish:{app_id}:default"),
            ]
        );
    }

    #[tokio::test]
    async fn test_display_summary() {
        let queue = queue_with(QueueSettings::default(), 10_000, 1);
        let rendered = queue.to_string();
        assert!(rendered.starts_with("default: capacity=1.00"));
        assert!(rendered.contains("numApplications=0"));
    }

    #[test]
    fn test_fifo_comparator_orders_by_time_then_id() {
        let earlier = QueuedApplication {
            app_id: uuid::Uuid::from_u128(2),
            user: "u1".to_string(),
            submitted_at: Utc::now(),
            handle: TestApp::new(2, "u1").into_handle(),
        };
        let later = QueuedApplication {
            app_id: uuid::Uuid::from_u128(1),
            user: "u1".to_string(),
            submitted_at: earlier.submitted_at + chrono::Duration::seconds(1),
            handle: TestApp::new(1, "u1").into_handle(),
        };

        let comparator = fifo_comparator();
        assert_eq!(comparator(&earlier, &later), Ordering::Less);
        assert_eq!(comparator(&later, &earlier), Ordering::Greater);

        let tie = QueuedApplication {
            app_id: uuid::Uuid::from_u128(3),
            user: "u1".to_string(),
            submitted_at: earlier.submitted_at,
            handle: TestApp::new(3, "u1").into_handle(),
        };
        assert_eq!(comparator(&earlier, &tie), Ordering::Less);
    }
}
