//! Controller Phase Graph
//!
//! Phases are explicit and enumerable. `steady` is the only idle phase;
//! every other phase names one step of a failover, failback or secondary
//! rebuild. Staying in the current phase is always allowed; any other move
//! must be an edge of the fixed graph below.
//!
//! ```text
//! steady ─► failover_promote_secondary ─► failover_update_dns ─► steady
//! steady ─► failback_create_replica_primary ─► failback_promote_primary
//!        ─► failback_update_dns ─► rebuild_secondary_delete_old
//! rebuild_secondary_delete_old ─► steady                       (still a replica)
//!                              ─► rebuild_secondary_create_replica  (absent)
//!                              ─► rebuild_secondary_wait_delete     (delete issued)
//! rebuild_secondary_wait_delete ─► rebuild_secondary_create_replica
//! rebuild_secondary_create_replica ─► rebuild_secondary_wait_replica ─► steady
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Steady,
    FailoverPromoteSecondary,
    FailoverUpdateDns,
    FailbackCreateReplicaPrimary,
    FailbackPromotePrimary,
    FailbackUpdateDns,
    RebuildSecondaryDeleteOld,
    RebuildSecondaryWaitDelete,
    RebuildSecondaryCreateReplica,
    RebuildSecondaryWaitReplica,
}

impl Phase {
    /// Every phase, in graph order.
    pub const ALL: [Phase; 10] = [
        Phase::Steady,
        Phase::FailoverPromoteSecondary,
        Phase::FailoverUpdateDns,
        Phase::FailbackCreateReplicaPrimary,
        Phase::FailbackPromotePrimary,
        Phase::FailbackUpdateDns,
        Phase::RebuildSecondaryDeleteOld,
        Phase::RebuildSecondaryWaitDelete,
        Phase::RebuildSecondaryCreateReplica,
        Phase::RebuildSecondaryWaitReplica,
    ];

    /// Get the persisted phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Steady => "steady",
            Self::FailoverPromoteSecondary => "failover_promote_secondary",
            Self::FailoverUpdateDns => "failover_update_dns",
            Self::FailbackCreateReplicaPrimary => "failback_create_replica_primary",
            Self::FailbackPromotePrimary => "failback_promote_primary",
            Self::FailbackUpdateDns => "failback_update_dns",
            Self::RebuildSecondaryDeleteOld => "rebuild_secondary_delete_old",
            Self::RebuildSecondaryWaitDelete => "rebuild_secondary_wait_delete",
            Self::RebuildSecondaryCreateReplica => "rebuild_secondary_create_replica",
            Self::RebuildSecondaryWaitReplica => "rebuild_secondary_wait_replica",
        }
    }

    pub fn is_steady(&self) -> bool {
        matches!(self, Self::Steady)
    }

    /// Whether this phase belongs to the secondary rebuild that follows a
    /// failback.
    pub fn is_rebuild(&self) -> bool {
        matches!(
            self,
            Self::RebuildSecondaryDeleteOld
                | Self::RebuildSecondaryWaitDelete
                | Self::RebuildSecondaryCreateReplica
                | Self::RebuildSecondaryWaitReplica
        )
    }

    /// Phases reachable in one step (excluding staying put).
    pub fn successors(&self) -> &'static [Phase] {
        match self {
            Self::Steady => &[Self::FailoverPromoteSecondary, Self::FailbackCreateReplicaPrimary],
            Self::FailoverPromoteSecondary => &[Self::FailoverUpdateDns],
            Self::FailoverUpdateDns => &[Self::Steady],
            Self::FailbackCreateReplicaPrimary => &[Self::FailbackPromotePrimary],
            Self::FailbackPromotePrimary => &[Self::FailbackUpdateDns],
            Self::FailbackUpdateDns => &[Self::RebuildSecondaryDeleteOld],
            Self::RebuildSecondaryDeleteOld => &[
                Self::Steady,
                Self::RebuildSecondaryWaitDelete,
                Self::RebuildSecondaryCreateReplica,
            ],
            Self::RebuildSecondaryWaitDelete => &[Self::RebuildSecondaryCreateReplica],
            Self::RebuildSecondaryCreateReplica => &[Self::RebuildSecondaryWaitReplica],
            Self::RebuildSecondaryWaitReplica => &[Self::Steady],
        }
    }

    /// Whether moving from `self` to `next` is permitted.
    pub fn allows(&self, next: Phase) -> bool {
        *self == next || self.successors().contains(&next)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized phase name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPhase(pub String);

impl fmt::Display for UnknownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown phase '{}'", self.0)
    }
}

impl std::error::Error for UnknownPhase {}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_serde() {
        for phase in Phase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert!("failover".parse::<Phase>().is_err());
    }

    #[test]
    fn test_failover_cannot_skip_dns() {
        assert!(!Phase::FailoverPromoteSecondary.allows(Phase::Steady));
        assert!(Phase::FailoverPromoteSecondary.allows(Phase::FailoverUpdateDns));
        assert!(Phase::FailoverUpdateDns.allows(Phase::Steady));
    }

    #[test]
    fn test_staying_is_always_allowed() {
        for phase in Phase::ALL {
            assert!(phase.allows(phase));
        }
    }

    #[test]
    fn test_every_transition_returns_to_steady() {
        // Following successors from any phase eventually reaches steady.
        for start in Phase::ALL {
            let mut frontier = vec![start];
            let mut seen = vec![];
            let mut reaches_steady = start.is_steady();
            while let Some(p) = frontier.pop() {
                if seen.contains(&p) {
                    continue;
                }
                seen.push(p);
                for next in p.successors() {
                    if next.is_steady() {
                        reaches_steady = true;
                    }
                    frontier.push(*next);
                }
            }
            assert!(reaches_steady, "{} cannot reach steady", start);
        }
    }
}
