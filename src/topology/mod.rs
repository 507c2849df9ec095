//! Topology Subsystem
//!
//! Observes and mutates the database instances of the two regions:
//! - `Region` names the two sides of the topology
//! - `DatabaseControlPlane` is the per-region collaborator contract
//! - `Topology` normalizes descriptions into `EndpointSnapshot`s and folds
//!   expected collaborator errors into soft outcomes
//!
//! Snapshots are produced fresh on every call and are never cached: the
//! controller re-derives them each tick to observe convergence of
//! asynchronous operations issued on earlier ticks.

mod inspector;
mod memory;
mod snapshot;

pub use inspector::{CreateOutcome, DeleteOutcome, PromoteOutcome, Topology};
pub use memory::{ControlPlaneCall, MemoryControlPlane};
pub use snapshot::{EndpointSnapshot, InstanceRecord, STATUS_AVAILABLE, STATUS_DELETING};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RegionConfig;
use crate::service::{BoxFuture, ServiceResult};

/// One side of the two-region topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Primary,
    Secondary,
}

impl Region {
    /// Get the region name for logging and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for creating a cross-region read replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReplicaRequest {
    /// Identifier of the instance to create
    pub target_id: String,
    /// Stable reference of the writer to replicate from
    pub source_ref: String,
    /// Region name of the source writer
    pub source_region: String,
    pub instance_class: String,
    pub subnet_group: String,
    pub security_group_id: String,
    pub kms_key: String,
    pub multi_az: bool,
    pub publicly_accessible: bool,
    pub copy_tags_to_snapshot: bool,
}

impl CreateReplicaRequest {
    /// Build a private replica request using the target region's
    /// provisioning parameters.
    pub fn new(
        target_id: impl Into<String>,
        source_ref: impl Into<String>,
        source_region: impl Into<String>,
        target: &RegionConfig,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            source_ref: source_ref.into(),
            source_region: source_region.into(),
            instance_class: target.instance_class.clone(),
            subnet_group: target.subnet_group.clone(),
            security_group_id: target.security_group_id.clone(),
            kms_key: target.kms_key.clone(),
            multi_az: target.multi_az,
            publicly_accessible: false,
            copy_tags_to_snapshot: true,
        }
    }
}

/// Parameters for deleting an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteInstanceRequest {
    pub id: String,
    /// Final snapshot to take before deletion; `None` skips it
    pub final_snapshot_id: Option<String>,
    pub delete_automated_backups: bool,
}

/// Database control plane for a single region.
///
/// `describe_instance` fails with a not-found `ServiceError` when the
/// instance does not exist. Mutating calls may fail with already-exists
/// or invalid-state errors; `Topology` decides which of those are soft.
pub trait DatabaseControlPlane: Send + Sync {
    /// Describe an instance.
    fn describe_instance<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ServiceResult<InstanceRecord>>;

    /// Promote a read replica to a standalone writer.
    fn promote_read_replica<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ServiceResult<()>>;

    /// Create a read replica from a (possibly cross-region) source.
    fn create_read_replica<'a>(
        &'a self,
        request: &'a CreateReplicaRequest,
    ) -> BoxFuture<'a, ServiceResult<()>>;

    /// Delete an instance.
    fn delete_instance<'a>(
        &'a self,
        request: &'a DeleteInstanceRequest,
    ) -> BoxFuture<'a, ServiceResult<()>>;
}
