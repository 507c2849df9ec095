//! Health Evaluator
//!
//! Majority vote over observer reports:
//! - no reports at all counts as healthy (absence of data never moves the
//!   writer)
//! - otherwise healthy iff `healthy >= total / 2 + 1`
//! - a report with a missing or blank status is ignored

use serde::{Deserialize, Serialize};

use super::{HealthObservation, HEALTHY_STATUS};

/// Decision label recorded when no observer reported
pub const NO_DATA_DECISION: &str = "no-data=>healthy";

/// Diagnostic counts behind a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDetail {
    pub observations: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub decision: String,
}

/// Evaluated health of the primary region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthVerdict {
    pub ok: bool,
    pub detail: HealthDetail,
}

/// Reduce observer reports to a verdict.
pub fn evaluate(observations: &[HealthObservation]) -> HealthVerdict {
    let statuses: Vec<&str> = observations
        .iter()
        .filter_map(|o| o.status.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if statuses.is_empty() {
        return HealthVerdict {
            ok: true,
            detail: HealthDetail {
                observations: 0,
                healthy: 0,
                unhealthy: 0,
                decision: NO_DATA_DECISION.to_string(),
            },
        };
    }

    let total = statuses.len();
    let healthy = statuses.iter().filter(|s| **s == HEALTHY_STATUS).count();
    let ok = healthy > total / 2;

    HealthVerdict {
        ok,
        detail: HealthDetail {
            observations: total,
            healthy,
            unhealthy: total - healthy,
            decision: if ok { "healthy" } else { "unhealthy" }.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports(healthy: usize, unhealthy: usize) -> Vec<HealthObservation> {
        let mut out = vec![HealthObservation::healthy(); healthy];
        out.extend(vec![HealthObservation::unhealthy(); unhealthy]);
        out
    }

    #[test]
    fn test_no_data_is_healthy() {
        let verdict = evaluate(&[]);
        assert!(verdict.ok);
        assert_eq!(verdict.detail.decision, NO_DATA_DECISION);
    }

    #[test]
    fn test_only_malformed_reports_is_no_data() {
        let obs = vec![
            HealthObservation::default(),
            HealthObservation::with_status("   "),
        ];
        let verdict = evaluate(&obs);
        assert!(verdict.ok);
        assert_eq!(verdict.detail.observations, 0);
    }

    #[test]
    fn test_majority_rule_for_all_splits() {
        for total in 1..=12usize {
            for healthy in 0..=total {
                let verdict = evaluate(&reports(healthy, total - healthy));
                let expected = healthy >= total / 2 + 1;
                assert_eq!(verdict.ok, expected, "healthy={} total={}", healthy, total);
                assert_eq!(verdict.detail.healthy, healthy);
                assert_eq!(verdict.detail.unhealthy, total - healthy);
            }
        }
    }

    #[test]
    fn test_even_split_is_unhealthy() {
        assert!(!evaluate(&reports(3, 3)).ok);
    }

    #[test]
    fn test_non_healthy_status_counts_unhealthy() {
        let obs = vec![
            HealthObservation::healthy(),
            HealthObservation::with_status("Failure: connection timed out"),
            HealthObservation::with_status("Failure: HTTP 503"),
        ];
        let verdict = evaluate(&obs);
        assert!(!verdict.ok);
        assert_eq!(verdict.detail.unhealthy, 2);
    }
}
