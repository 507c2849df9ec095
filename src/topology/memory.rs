//! In-memory database control plane.
//!
//! Mutations take only their first visible step (`creating`, `modifying`,
//! `deleting`); tests drive convergence explicitly with `converge_*` so
//! they can observe the controller waiting across ticks.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{
    CreateReplicaRequest, DatabaseControlPlane, DeleteInstanceRequest, InstanceRecord,
    STATUS_AVAILABLE, STATUS_DELETING,
};
use crate::service::{BoxFuture, ServiceError, ServiceResult};

/// A call received by the in-memory control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPlaneCall {
    Describe(String),
    Promote(String),
    CreateReplica(CreateReplicaRequest),
    Delete(DeleteInstanceRequest),
}

impl ControlPlaneCall {
    /// Whether the call mutates the topology.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Describe(_))
    }
}

#[derive(Debug, Default)]
struct Inner {
    instances: BTreeMap<String, InstanceRecord>,
    calls: Vec<ControlPlaneCall>,
    failures: VecDeque<ServiceError>,
}

/// In-memory control plane for one region.
#[derive(Debug, Clone, Default)]
pub struct MemoryControlPlane {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an instance.
    pub fn put_instance(&self, record: InstanceRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner.instances.insert(record.id.clone(), record);
    }

    /// Remove an instance.
    pub fn remove_instance(&self, id: &str) -> Option<InstanceRecord> {
        self.inner.lock().unwrap().instances.remove(id)
    }

    /// Get an instance.
    pub fn instance(&self, id: &str) -> Option<InstanceRecord> {
        self.inner.lock().unwrap().instances.get(id).cloned()
    }

    /// Fail the next call (of any kind) with `error`.
    pub fn fail_next(&self, error: ServiceError) {
        self.inner.lock().unwrap().failures.push_back(error);
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<ControlPlaneCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Mutating calls received so far.
    pub fn mutating_calls(&self) -> Vec<ControlPlaneCall> {
        self.calls().into_iter().filter(|c| c.is_mutating()).collect()
    }

    /// Finish a pending promotion: the instance becomes an available writer.
    pub fn converge_promotion(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.instances.get_mut(id) {
            record.replication_source = None;
            record.status = Some(STATUS_AVAILABLE.to_string());
        }
    }

    /// Finish provisioning: the instance becomes available at `address`.
    pub fn converge_provisioning(&self, id: &str, address: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.instances.get_mut(id) {
            record.status = Some(STATUS_AVAILABLE.to_string());
            record.endpoint_address = Some(address.to_string());
        }
    }

    /// Finish a pending deletion.
    pub fn converge_deletion(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        let deleting = inner
            .instances
            .get(id)
            .map(|r| r.status.as_deref() == Some(STATUS_DELETING))
            .unwrap_or(false);
        if deleting {
            inner.instances.remove(id);
        }
    }

    fn record(&self, call: ControlPlaneCall) -> ServiceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        match inner.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn describe(&self, id: &str) -> ServiceResult<InstanceRecord> {
        self.record(ControlPlaneCall::Describe(id.to_string()))?;
        self.instance(id)
            .ok_or_else(|| ServiceError::not_found(format!("{} not found", id)))
    }

    fn promote(&self, id: &str) -> ServiceResult<()> {
        self.record(ControlPlaneCall::Promote(id.to_string()))?;
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .instances
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found(id.to_string()))?;

        if record.replication_source.is_none()
            || record.status.as_deref() != Some(STATUS_AVAILABLE)
        {
            return Err(ServiceError::invalid_state(format!("{} cannot be promoted", id)));
        }

        record.status = Some("modifying".to_string());
        Ok(())
    }

    fn create(&self, request: &CreateReplicaRequest) -> ServiceResult<()> {
        self.record(ControlPlaneCall::CreateReplica(request.clone()))?;
        let mut inner = self.inner.lock().unwrap();
        if inner.instances.contains_key(&request.target_id) {
            return Err(ServiceError::already_exists(format!("{} already exists", request.target_id)));
        }

        let record = InstanceRecord {
            id: request.target_id.clone(),
            status: Some("creating".to_string()),
            replication_source: Some(request.source_ref.clone()),
            endpoint_address: None,
            stable_ref: Some(format!("arn:db:{}", request.target_id)),
        };
        inner.instances.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete(&self, request: &DeleteInstanceRequest) -> ServiceResult<()> {
        self.record(ControlPlaneCall::Delete(request.clone()))?;
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .instances
            .get_mut(&request.id)
            .ok_or_else(|| ServiceError::not_found(request.id.clone()))?;

        if record.status.as_deref() != Some(STATUS_AVAILABLE) {
            return Err(ServiceError::invalid_state(format!("{} is {:?}", request.id, record.status)));
        }

        record.status = Some(STATUS_DELETING.to_string());
        Ok(())
    }
}

impl DatabaseControlPlane for MemoryControlPlane {
    fn describe_instance<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ServiceResult<InstanceRecord>> {
        Box::pin(async move { self.describe(id) })
    }

    fn promote_read_replica<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(async move { self.promote(id) })
    }

    fn create_read_replica<'a>(
        &'a self,
        request: &'a CreateReplicaRequest,
    ) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(async move { self.create(request) })
    }

    fn delete_instance<'a>(
        &'a self,
        request: &'a DeleteInstanceRequest,
    ) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(async move { self.delete(request) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_converge() {
        let plane = MemoryControlPlane::new();
        let request = CreateReplicaRequest {
            target_id: "fb".into(),
            source_ref: "arn:db:sec".into(),
            source_region: "us-west-2".into(),
            instance_class: "c".into(),
            subnet_group: "s".into(),
            security_group_id: "g".into(),
            kms_key: "k".into(),
            multi_az: true,
            publicly_accessible: false,
            copy_tags_to_snapshot: true,
        };

        plane.create(&request).unwrap();
        let record = plane.instance("fb").unwrap();
        assert_eq!(record.status.as_deref(), Some("creating"));
        assert!(record.endpoint_address.is_none());

        plane.converge_provisioning("fb", "fb.example");
        let record = plane.instance("fb").unwrap();
        assert_eq!(record.status.as_deref(), Some(STATUS_AVAILABLE));
        assert_eq!(record.replication_source.as_deref(), Some("arn:db:sec"));

        assert!(plane.create(&request).unwrap_err().is_already_exists());
    }

    #[test]
    fn test_promote_then_converge() {
        let plane = MemoryControlPlane::new();
        plane.put_instance(InstanceRecord::replica("sec", "arn:db:pri", "sec.example"));

        plane.promote("sec").unwrap();
        assert!(plane.promote("sec").unwrap_err().is_invalid_state());

        plane.converge_promotion("sec");
        let record = plane.instance("sec").unwrap();
        assert!(record.replication_source.is_none());
        assert_eq!(plane.mutating_calls().len(), 2);
    }

    #[test]
    fn test_converge_deletion_only_when_deleting() {
        let plane = MemoryControlPlane::new();
        plane.put_instance(InstanceRecord::writer("sec", "sec.example"));

        plane.converge_deletion("sec");
        assert!(plane.instance("sec").is_some());

        plane
            .delete(&DeleteInstanceRequest {
                id: "sec".into(),
                final_snapshot_id: None,
                delete_automated_backups: true,
            })
            .unwrap();
        plane.converge_deletion("sec");
        assert!(plane.instance("sec").is_none());
    }
}
