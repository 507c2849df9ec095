//! dbdr - two-region database failover controller
//!
//! A tick-driven controller that keeps one authoritative writer across a
//! primary and a secondary region. Each tick evaluates the primary's health,
//! advances an in-flight failover, failback or secondary rebuild by one
//! step, and persists its state. Every external system sits behind a trait
//! so the controller runs unchanged against in-memory doubles.

pub mod cli;
pub mod config;
pub mod dns;
pub mod engine;
pub mod health;
pub mod observability;
pub mod service;
pub mod state;
pub mod store;
pub mod topology;

pub use config::{ControllerConfig, DnsConfig, RegionConfig};
pub use engine::{Collaborators, Controller, ControllerError, ControllerResult, TickSummary};
pub use state::{ControllerState, Phase};
pub use topology::Region;
