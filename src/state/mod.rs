//! Controller State
//!
//! The single persisted document. It is read once at the start of a tick,
//! mutated in place, and written once at the end; the write is the only
//! commit point. A tick that fails leaves the previous document in place,
//! so the next tick retries the same phase.

mod phase;

pub use phase::{Phase, UnknownPhase};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::HealthDetail;
use crate::topology::Region;

/// Current document shape version
pub const SCHEMA_VERSION: u32 = 2;

/// Diagnostic record of the last step taken. Not logic-bearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastAction {
    pub at: DateTime<Utc>,
    pub action: String,
    pub result: String,
}

/// Diagnostic copy of the last health evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// `None` when the health source could not be queried
    pub primary_hc_healthy: Option<bool>,
    pub detail: Option<HealthDetail>,
    pub checked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Persisted controller state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub schema_version: u32,

    /// Region whose database is the authoritative writer
    pub active: Region,

    /// Current step of an in-flight transition
    pub phase: Phase,

    /// Consecutive healthy primary verdicts
    pub failback_healthy_streak: u32,

    /// Identifier of the current primary-region writer
    pub primary_writer_id: String,

    #[serde(default)]
    pub last_action: Option<LastAction>,

    #[serde(default)]
    pub hc: Option<HealthSnapshot>,

    #[serde(default)]
    pub transition_started_at: Option<DateTime<Utc>>,

    /// Last completed transition
    pub ts: DateTime<Utc>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ControllerState {
    /// Fresh state: primary active, steady.
    pub fn initial(primary_writer_id: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            active: Region::Primary,
            phase: Phase::Steady,
            failback_healthy_streak: 0,
            primary_writer_id: primary_writer_id.into(),
            last_action: None,
            hc: None,
            transition_started_at: None,
            ts: Utc::now(),
            updated_at: None,
        }
    }

    /// Record a diagnostic action.
    pub fn record_action(&mut self, action: impl Into<String>, result: impl Into<String>) {
        self.last_action = Some(LastAction {
            at: Utc::now(),
            action: action.into(),
            result: result.into(),
        });
    }

    /// Last recorded action name, if any.
    pub fn last_action_name(&self) -> Option<&str> {
        self.last_action.as_ref().map(|a| a.action.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ControllerState::initial("orders-primary");
        assert_eq!(state.active, Region::Primary);
        assert!(state.phase.is_steady());
        assert_eq!(state.failback_healthy_streak, 0);
        assert_eq!(state.primary_writer_id, "orders-primary");
        assert_eq!(state.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_record_action() {
        let mut state = ControllerState::initial("p");
        state.record_action("promote_secondary", "promote-called");

        assert_eq!(state.last_action_name(), Some("promote_secondary"));
        assert_eq!(state.last_action.unwrap().result, "promote-called");
    }

    #[test]
    fn test_document_shape() {
        let mut state = ControllerState::initial("p");
        state.phase = Phase::FailoverUpdateDns;

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["active"], "primary");
        assert_eq!(value["phase"], "failover_update_dns");
        assert_eq!(value["schema_version"], 2);

        let back: ControllerState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
