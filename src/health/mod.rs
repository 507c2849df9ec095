//! Health Subsystem
//!
//! Turns the primary-region health signal into a region decision:
//! - `evaluate` reduces observer reports to a majority verdict
//! - `AntiFlappingGuard` holds failback back until the primary has been
//!   healthy for a configured number of consecutive ticks
//!
//! Failover is never delayed: one unhealthy verdict is enough.

mod evaluator;
mod guard;

pub use evaluator::{evaluate, HealthDetail, HealthVerdict, NO_DATA_DECISION};
pub use guard::{AntiFlappingGuard, GuardDecision};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::service::{BoxFuture, ServiceError, ServiceResult};

/// Status string reported by a healthy observer
pub const HEALTHY_STATUS: &str = "Healthy";

/// One observer's report. Either field may be missing in malformed
/// responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthObservation {
    /// Observer location
    #[serde(default)]
    pub region: Option<String>,
    /// Reported status
    #[serde(default)]
    pub status: Option<String>,
}

impl HealthObservation {
    pub fn healthy() -> Self {
        Self::with_status(HEALTHY_STATUS)
    }

    pub fn unhealthy() -> Self {
        Self::with_status("Unhealthy")
    }

    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            region: None,
            status: Some(status.into()),
        }
    }
}

/// Health signal source.
pub trait HealthSource: Send + Sync {
    /// Latest observer reports for a health check. An empty list means no
    /// data, not failure.
    fn observations<'a>(
        &'a self,
        check_id: &'a str,
    ) -> BoxFuture<'a, ServiceResult<Vec<HealthObservation>>>;
}

/// Scripted health source: each call pops the next queued response and
/// repeats the last one once the queue is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHealthSource {
    inner: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    queue: VecDeque<ServiceResult<Vec<HealthObservation>>>,
    last: Option<ServiceResult<Vec<HealthObservation>>>,
    calls: usize,
}

impl ScriptedHealthSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `count` ticks of unanimous healthy (or unhealthy) reports from
    /// three observers.
    pub fn push_verdict(&self, healthy: bool, count: usize) {
        let observation = if healthy {
            HealthObservation::healthy()
        } else {
            HealthObservation::unhealthy()
        };
        for _ in 0..count {
            self.push(Ok(vec![observation.clone(); 3]));
        }
    }

    /// Queue a single response.
    pub fn push(&self, response: ServiceResult<Vec<HealthObservation>>) {
        self.inner.lock().unwrap().queue.push_back(response);
    }

    /// Queue a failure.
    pub fn push_error(&self, error: ServiceError) {
        self.push(Err(error));
    }

    /// Number of calls served.
    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().calls
    }
}

impl HealthSource for ScriptedHealthSource {
    fn observations<'a>(
        &'a self,
        _check_id: &'a str,
    ) -> BoxFuture<'a, ServiceResult<Vec<HealthObservation>>> {
        Box::pin(async move {
            let mut state = self.inner.lock().unwrap();
            state.calls += 1;
            if let Some(next) = state.queue.pop_front() {
                state.last = Some(next);
            }
            state.last.clone().unwrap_or_else(|| Ok(Vec::new()))
        })
    }
}
