//! Failover engine
//!
//! - `PhaseEngine`: one step of the phase graph against the live topology
//! - `Controller`: the tick loop around it (health, entry rule, persistence)
//!
//! Transitions only ever move along `Phase::successors`; anything else is
//! rejected before the state is touched.

mod controller;
mod errors;
mod transition;

pub use controller::{Collaborators, Controller, TickSummary};
pub use errors::{ControllerError, ControllerResult};
pub use transition::{failback_target_id, final_snapshot_id, PhaseEngine, StepReport};
