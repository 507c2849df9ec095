//! In-memory parameter store.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::ParameterStore;
use crate::service::{BoxFuture, ServiceError, ServiceResult};

#[derive(Debug, Default)]
struct Inner {
    values: BTreeMap<String, String>,
    writes: usize,
    put_failures: VecDeque<ServiceError>,
}

/// In-memory parameter store for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryParameterStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw value for `key`.
    pub fn value(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().values.get(key).cloned()
    }

    /// Seed a raw value without counting it as a write.
    pub fn seed(&self, key: &str, value: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .values
            .insert(key.to_string(), value.into());
    }

    /// Number of successful `put` calls.
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    /// Fail the next `put` with `error`.
    pub fn fail_next_put(&self, error: ServiceError) {
        self.inner.lock().unwrap().put_failures.push_back(error);
    }
}

impl ParameterStore for MemoryParameterStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ServiceResult<Option<String>>> {
        Box::pin(async move { Ok(self.value(key)) })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            if let Some(err) = inner.put_failures.pop_front() {
                return Err(err);
            }
            inner.values.insert(key.to_string(), value.to_string());
            inner.writes += 1;
            Ok(())
        })
    }
}
