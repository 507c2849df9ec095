//! In-memory DNS control plane.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{DnsControlPlane, RecordChange};
use crate::service::{BoxFuture, ServiceError, ServiceResult};

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, String>,
    changes: Vec<RecordChange>,
    failures: VecDeque<ServiceError>,
}

/// In-memory hosted zone. Records are keyed by fully-qualified name.
#[derive(Debug, Clone, Default)]
pub struct MemoryDns {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a record.
    pub fn record(&self, name: &str) -> Option<String> {
        self.inner.lock().unwrap().records.get(name).cloned()
    }

    /// All records.
    pub fn records(&self) -> BTreeMap<String, String> {
        self.inner.lock().unwrap().records.clone()
    }

    /// Every accepted change, in submission order.
    pub fn changes(&self) -> Vec<RecordChange> {
        self.inner.lock().unwrap().changes.clone()
    }

    /// Fail the next upsert with `error`.
    pub fn fail_next(&self, error: ServiceError) {
        self.inner.lock().unwrap().failures.push_back(error);
    }
}

impl DnsControlPlane for MemoryDns {
    fn upsert_record<'a>(&'a self, change: &'a RecordChange) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            if let Some(err) = inner.failures.pop_front() {
                return Err(err);
            }
            inner.records.insert(change.name.clone(), change.value.clone());
            inner.changes.push(change.clone());
            Ok(())
        })
    }
}
