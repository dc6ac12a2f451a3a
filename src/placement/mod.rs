//! Locality-Preferred Container Placement
//!
//! Given a node heartbeat and one application priority, placement walks the
//! locality ladder (node-local, rack-local, off-switch) and mints at most
//! one container from the first level that both matches an outstanding
//! request and fits the node's free memory.

use crate::cluster::{ContainerTokenSecretManager, SchedulerApp, SchedulerNode};
use crate::resources::Resource;
use crate::types::{
    Container, ContainerToken, ContainerTokenIdentifier, NodeType, Priority, ResourceRequest, ANY,
    CONTAINER_TOKEN_KIND,
};
use tracing::{debug, info};

/// One granted container and the locality level it was placed at.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub container: Container,
    pub node_type: NodeType,
}

/// Try to place one container for `priority` on `node`, preferring
/// node-local over rack-local over off-switch. The first level that yields
/// a container wins.
pub fn assign_on_node(
    cluster: Resource,
    node: &mut dyn SchedulerNode,
    app: &mut dyn SchedulerApp,
    priority: Priority,
    secret_manager: Option<&dyn ContainerTokenSecretManager>,
) -> Option<Allocation> {
    if let Some(request) = app.resource_request(priority, node.host_name()) {
        if can_assign(app, priority, node, NodeType::NodeLocal) {
            if let Some(container) = assign_container(
                cluster,
                node,
                app,
                priority,
                &request,
                NodeType::NodeLocal,
                secret_manager,
            ) {
                return Some(Allocation {
                    container,
                    node_type: NodeType::NodeLocal,
                });
            }
        }
    }

    if let Some(request) = app.resource_request(priority, node.rack_name()) {
        if can_assign(app, priority, node, NodeType::RackLocal) {
            if let Some(container) = assign_container(
                cluster,
                node,
                app,
                priority,
                &request,
                NodeType::RackLocal,
                secret_manager,
            ) {
                return Some(Allocation {
                    container,
                    node_type: NodeType::RackLocal,
                });
            }
        }
    }

    if let Some(request) = app.resource_request(priority, ANY) {
        if can_assign(app, priority, node, NodeType::OffSwitch) {
            if let Some(container) = assign_container(
                cluster,
                node,
                app,
                priority,
                &request,
                NodeType::OffSwitch,
                secret_manager,
            ) {
                return Some(Allocation {
                    container,
                    node_type: NodeType::OffSwitch,
                });
            }
        }
    }

    None
}

/// May a container be granted at `node_type` on this node?
///
/// The off-switch request is the authority on whether the application wants
/// anything at all at this priority.
pub fn can_assign(
    app: &dyn SchedulerApp,
    priority: Priority,
    node: &dyn SchedulerNode,
    node_type: NodeType,
) -> bool {
    let off_switch = match app.resource_request(priority, ANY) {
        Some(request) => request,
        None => return false,
    };
    if off_switch.num_containers == 0 {
        return false;
    }

    match node_type {
        NodeType::OffSwitch => off_switch.num_containers > 0,
        NodeType::RackLocal => match app.resource_request(priority, node.rack_name()) {
            // No point waiting for rack-locality if this rack was never asked for
            None => off_switch.num_containers > 0,
            Some(rack_request) => rack_request.num_containers > 0,
        },
        NodeType::NodeLocal => app
            .resource_request(priority, node.host_name())
            .map(|request| request.num_containers > 0)
            .unwrap_or(false),
    }
}

/// Mint exactly one container against `request` if the node has headroom
/// for it. A zero-memory capability is treated as a no-op rather than a
/// divide fault.
pub fn assign_container(
    cluster: Resource,
    node: &mut dyn SchedulerNode,
    app: &mut dyn SchedulerApp,
    priority: Priority,
    request: &ResourceRequest,
    node_type: NodeType,
    secret_manager: Option<&dyn ContainerTokenSecretManager>,
) -> Option<Container> {
    let capability = request.capability;
    if capability.memory == 0 {
        debug!(app = %app.application_id(), %priority, "zero-capability request ignored");
        return None;
    }

    let available_containers = node.available_resource().memory / capability.memory;
    if available_containers == 0 {
        return None;
    }

    let app_id = app.application_id();
    let sequence = app.new_container_id();
    let mut container = Container::new(app_id, sequence, node.host_name(), capability);

    if let Some(secret_manager) = secret_manager {
        let identifier = ContainerTokenIdentifier {
            container_id: container.id,
            host_name: container.host_name.clone(),
            capability,
        };
        container.token = Some(ContainerToken {
            identifier: identifier.to_bytes(),
            kind: CONTAINER_TOKEN_KIND.to_string(),
            password: secret_manager.create_password(&identifier),
            service: container.host_name.clone(),
        });
    }

    app.allocate(node_type, &*node, priority, request, container.clone());
    node.allocate_container(app_id, &container);

    info!(
        container = %container.id,
        node = node.host_name(),
        %node_type,
        %priority,
        capability = capability.memory,
        cluster = cluster.memory,
        "allocated container"
    );

    Some(container)
}
