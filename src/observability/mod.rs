//! Observability subsystem
//!
//! - Stable event names (`ControllerEvent`)
//! - Subscriber installation for the binary (`init_logging`)
//!
//! Observability describes what the controller did; nothing in the
//! decision path reads it back.

mod events;
mod logger;

pub use events::ControllerEvent;
pub use logger::{init_logging, LogFormat};
