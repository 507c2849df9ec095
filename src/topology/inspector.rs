//! Topology Inspector
//!
//! Wraps the two per-region control planes. Describes are normalized into
//! snapshots; mutating calls fold the collaborator's "already happened" and
//! "not yet" responses into explicit outcomes. Every other error is
//! returned unchanged so the tick aborts.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{
    CreateReplicaRequest, DatabaseControlPlane, DeleteInstanceRequest, EndpointSnapshot, Region,
};
use crate::service::ServiceResult;

/// Result of a promote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoteOutcome {
    /// Promote was accepted
    Called,
    /// Collaborator reported an invalid state (already promoting or
    /// promoted); carries the last observed status
    Waiting(String),
}

impl fmt::Display for PromoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Called => f.write_str("promote-called"),
            Self::Waiting(status) => write!(f, "waiting:{}", status),
        }
    }
}

/// Result of a create-replica call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Called,
    AlreadyExists,
}

impl fmt::Display for CreateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Called => f.write_str("create-called"),
            Self::AlreadyExists => f.write_str("already-exists"),
        }
    }
}

/// Result of a delete call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Delete was accepted
    Called { snapshot_id: Option<String> },
    /// Instance is mid-transition; retry later
    Waiting,
    /// Instance is already gone
    NotFound,
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Called {
                snapshot_id: Some(id),
            } => write!(f, "delete-called:snapshot:{}", id),
            Self::Called { snapshot_id: None } => f.write_str("delete-called:no-snapshot"),
            Self::Waiting => f.write_str("waiting"),
            Self::NotFound => f.write_str("not-found"),
        }
    }
}

/// Region-scoped access to both database control planes.
#[derive(Clone)]
pub struct Topology {
    primary: Arc<dyn DatabaseControlPlane>,
    secondary: Arc<dyn DatabaseControlPlane>,
}

impl Topology {
    pub fn new(
        primary: Arc<dyn DatabaseControlPlane>,
        secondary: Arc<dyn DatabaseControlPlane>,
    ) -> Self {
        Self { primary, secondary }
    }

    fn plane(&self, region: Region) -> &dyn DatabaseControlPlane {
        match region {
            Region::Primary => self.primary.as_ref(),
            Region::Secondary => self.secondary.as_ref(),
        }
    }

    /// Describe an instance. "Not found" yields an absent snapshot.
    pub async fn describe(&self, region: Region, id: &str) -> ServiceResult<EndpointSnapshot> {
        match self.plane(region).describe_instance(id).await {
            Ok(record) => {
                let snapshot = EndpointSnapshot::from_record(record, region);
                debug!(
                    region = %region,
                    id,
                    status = %snapshot.status,
                    replica = snapshot.is_replica(),
                    "described instance"
                );
                Ok(snapshot)
            }
            Err(e) if e.is_not_found() => {
                debug!(region = %region, id, "instance not found");
                Ok(EndpointSnapshot::absent(id, region))
            }
            Err(e) => Err(e),
        }
    }

    /// Promote a replica. Invalid-state responses become `Waiting`.
    pub async fn promote(&self, snapshot: &EndpointSnapshot) -> ServiceResult<PromoteOutcome> {
        match self
            .plane(snapshot.region)
            .promote_read_replica(&snapshot.id)
            .await
        {
            Ok(()) => Ok(PromoteOutcome::Called),
            Err(e) if e.is_invalid_state() => Ok(PromoteOutcome::Waiting(snapshot.status.clone())),
            Err(e) => Err(e),
        }
    }

    /// Create a replica in `region`. Already-exists becomes a soft outcome.
    pub async fn create_replica(
        &self,
        region: Region,
        request: &CreateReplicaRequest,
    ) -> ServiceResult<CreateOutcome> {
        match self.plane(region).create_read_replica(request).await {
            Ok(()) => Ok(CreateOutcome::Called),
            Err(e) if e.is_already_exists() => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    /// Delete an instance in `region`. Invalid-state and not-found become
    /// soft outcomes.
    pub async fn delete(
        &self,
        region: Region,
        request: &DeleteInstanceRequest,
    ) -> ServiceResult<DeleteOutcome> {
        match self.plane(region).delete_instance(request).await {
            Ok(()) => Ok(DeleteOutcome::Called {
                snapshot_id: request.final_snapshot_id.clone(),
            }),
            Err(e) if e.is_invalid_state() => Ok(DeleteOutcome::Waiting),
            Err(e) if e.is_not_found() => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(e),
        }
    }
}
