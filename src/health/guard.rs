//! Anti-Flapping Guard
//!
//! Tracks consecutive healthy verdicts. While the secondary is active, a
//! healthy primary is only desired once the streak reaches the threshold.

use crate::topology::Region;

/// Outcome of folding one verdict into the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardDecision {
    /// Updated consecutive-healthy streak
    pub streak: u32,
    /// Region to steer towards after the failback hold
    pub desired: Region,
    /// Whether a failback was held back this tick
    pub suppressed: bool,
}

/// Failback hold with a fixed streak threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AntiFlappingGuard {
    threshold: u32,
}

impl AntiFlappingGuard {
    /// Create a guard. A threshold of 0 behaves like 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Fold a verdict into the streak and pick the desired region.
    pub fn observe(&self, ok: bool, prior_streak: u32, active: Region) -> GuardDecision {
        let streak = if ok { prior_streak.saturating_add(1) } else { 0 };
        let natural = if ok { Region::Primary } else { Region::Secondary };

        let suppressed =
            natural == Region::Primary && active == Region::Secondary && streak < self.threshold;
        let desired = if suppressed { Region::Secondary } else { natural };

        GuardDecision {
            streak,
            desired,
            suppressed,
        }
    }
}
