//! Instance descriptions and their normalized per-tick snapshot.

use serde::Serialize;

use super::Region;

/// Status reported by an instance that is ready for traffic and mutation
pub const STATUS_AVAILABLE: &str = "available";

/// Status reported by an instance whose deletion is in progress
pub const STATUS_DELETING: &str = "deleting";

/// Raw instance description as returned by a control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub id: String,
    /// Lifecycle status (`available`, `creating`, `modifying`, ...)
    pub status: Option<String>,
    /// Replication source reference; present only on read replicas
    pub replication_source: Option<String>,
    /// Connection address; present only once provisioning has converged
    pub endpoint_address: Option<String>,
    /// Stable reference usable as a replication source (e.g. an ARN)
    pub stable_ref: Option<String>,
}

impl InstanceRecord {
    /// An available standalone writer.
    pub fn writer(id: impl Into<String>, address: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            stable_ref: Some(format!("arn:db:{}", id)),
            id,
            status: Some(STATUS_AVAILABLE.to_string()),
            replication_source: None,
            endpoint_address: Some(address.into()),
        }
    }

    /// An available read replica of `source`.
    pub fn replica(
        id: impl Into<String>,
        source: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            replication_source: Some(source.into()),
            ..Self::writer(id, address)
        }
    }

    /// Replace the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Drop the connection address (not yet converged).
    pub fn without_address(mut self) -> Self {
        self.endpoint_address = None;
        self
    }
}

/// Normalized view of one database endpoint, valid only within the tick
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointSnapshot {
    pub id: String,
    pub region: Region,
    pub exists: bool,
    pub status: String,
    pub replication_source: Option<String>,
    pub address: Option<String>,
    pub stable_ref: Option<String>,
}

impl EndpointSnapshot {
    /// Snapshot of an instance that does not exist.
    pub fn absent(id: impl Into<String>, region: Region) -> Self {
        Self {
            id: id.into(),
            region,
            exists: false,
            status: "missing".to_string(),
            replication_source: None,
            address: None,
            stable_ref: None,
        }
    }

    /// Normalize a control-plane record.
    pub fn from_record(record: InstanceRecord, region: Region) -> Self {
        Self {
            id: record.id,
            region,
            exists: true,
            status: record
                .status
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            replication_source: record.replication_source.filter(|s| !s.is_empty()),
            address: record.endpoint_address.filter(|s| !s.is_empty()),
            stable_ref: record.stable_ref.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.exists && self.status == STATUS_AVAILABLE
    }

    pub fn is_deleting(&self) -> bool {
        self.exists && self.status == STATUS_DELETING
    }

    /// Whether the instance is a read replica.
    pub fn is_replica(&self) -> bool {
        self.exists && self.replication_source.is_some()
    }

    /// Whether the instance is a standalone writer.
    pub fn is_writer(&self) -> bool {
        self.exists && self.replication_source.is_none()
    }

    pub fn is_available_writer(&self) -> bool {
        self.is_available() && self.is_writer()
    }

    pub fn is_available_replica(&self) -> bool {
        self.is_available() && self.is_replica()
    }
}
