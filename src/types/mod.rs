//! Core Types and Data Structures for the Allocation Core
//!
//! Priorities, locality levels, resource requests and the container wire
//! shapes exchanged with applications and nodes.

use crate::resources::Resource;
use crate::ApplicationId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The off-switch location key: a request under this key may be placed on
/// any node in the cluster.
pub const ANY: &str = "*";

/// Token kind stamped on minted container tokens.
pub const CONTAINER_TOKEN_KIND: &str = "ContainerToken";

/// Application-level request priority.
///
/// Ordering semantics belong to the application: it reports its active
/// priorities highest-first and the allocation loop serves them in that
/// order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Priority(pub u32);

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locality level of a granted container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Same host the application asked for.
    NodeLocal,
    /// Same rack as a requested host.
    RackLocal,
    /// Anywhere in the cluster.
    OffSwitch,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::NodeLocal => write!(f, "NODE_LOCAL"),
            NodeType::RackLocal => write!(f, "RACK_LOCAL"),
            NodeType::OffSwitch => write!(f, "OFF_SWITCH"),
        }
    }
}

/// An application's outstanding ask at one priority and location.
///
/// The location is a host name, a rack name, or [`ANY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub location: String,
    pub capability: Resource,
    pub num_containers: u32,
}

impl ResourceRequest {
    pub fn new(location: impl Into<String>, capability: Resource, num_containers: u32) -> Self {
        Self {
            location: location.into(),
            capability,
            num_containers,
        }
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{location: {}, capability: {}, #containers: {}}}",
            self.location, self.capability, self.num_containers
        )
    }
}

/// Cluster-unique container id: owning application plus a per-application
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId {
    pub app_id: ApplicationId,
    pub id: u64,
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container_{}_{}", self.app_id, self.id)
    }
}

/// Security token attached to a container when token minting is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerToken {
    pub identifier: Vec<u8>,
    pub kind: String,
    pub password: Vec<u8>,
    pub service: String,
}

/// The identity a container token is derived from. Doubles as the secret
/// manager's password key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerTokenIdentifier {
    pub container_id: ContainerId,
    pub host_name: String,
    pub capability: Resource,
}

impl ContainerTokenIdentifier {
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "{}/{}/{}",
            self.container_id, self.host_name, self.capability.memory
        )
        .into_bytes()
    }
}

/// A granted allocation: one slice of a node's memory assigned to an
/// application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub host_name: String,
    pub capability: Resource,
    pub token: Option<ContainerToken>,
}

impl Container {
    pub fn new(
        app_id: ApplicationId,
        id: u64,
        host_name: impl Into<String>,
        capability: Resource,
    ) -> Self {
        Self {
            id: ContainerId { app_id, id },
            host_name: host_name.into(),
            capability,
            token: None,
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({})",
            self.id, self.host_name, self.capability
        )
    }
}
