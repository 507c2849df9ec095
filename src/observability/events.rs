//! Controller lifecycle events.
//!
//! Every log line the controller emits carries one of these names in its
//! `event` field, so alerting can match on stable identifiers rather than
//! message text.

use std::fmt;

/// Observable controller events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    // Tick lifecycle
    /// Tick begins
    TickStarted,
    /// Tick finished and state was persisted
    TickCompleted,
    /// Tick failed; state left unchanged
    TickAborted,

    // Health
    /// Health verdict computed
    HealthEvaluated,
    /// Health source could not be queried
    HealthUnavailable,
    /// Failback held back by the anti-flapping streak
    FailbackSuppressed,

    // Phases
    /// Steady phase left for a transition
    TransitionStarted,
    /// Phase moved forward
    PhaseAdvanced,
    /// Phase observed and stayed put
    PhaseWaiting,
    /// A mutating collaborator call was issued
    ActionIssued,
    /// Topology contradicts the phase (FATAL)
    InvariantViolated,
    /// An instance a waiting phase depends on does not exist
    InstanceMissing,

    // DNS
    /// Best-effort DNS refresh succeeded
    DnsRefreshed,
    /// Best-effort DNS refresh failed and was ignored
    DnsRefreshFailed,

    // State document
    /// No document existed; defaults used
    StateInitialized,
    /// Legacy document migrated
    StateMigrated,
    /// Document written
    StatePersisted,
}

impl ControllerEvent {
    /// Returns the stable event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TickStarted => "dr.tick.started",
            Self::TickCompleted => "dr.tick.completed",
            Self::TickAborted => "dr.tick.aborted",
            Self::HealthEvaluated => "dr.health.evaluated",
            Self::HealthUnavailable => "dr.health.unavailable",
            Self::FailbackSuppressed => "dr.failback.suppressed",
            Self::TransitionStarted => "dr.transition.started",
            Self::PhaseAdvanced => "dr.phase.advanced",
            Self::PhaseWaiting => "dr.phase.waiting",
            Self::ActionIssued => "dr.action.issued",
            Self::InvariantViolated => "dr.invariant.violated",
            Self::InstanceMissing => "dr.instance.missing",
            Self::DnsRefreshed => "dr.dns.refreshed",
            Self::DnsRefreshFailed => "dr.dns.refresh_failed",
            Self::StateInitialized => "dr.state.initialized",
            Self::StateMigrated => "dr.state.migrated",
            Self::StatePersisted => "dr.state.persisted",
        }
    }
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_namespaced() {
        let events = [
            ControllerEvent::TickStarted,
            ControllerEvent::PhaseAdvanced,
            ControllerEvent::DnsRefreshFailed,
            ControllerEvent::StateMigrated,
            ControllerEvent::InstanceMissing,
        ];
        for event in events {
            assert!(event.as_str().starts_with("dr."));
        }
    }
}
