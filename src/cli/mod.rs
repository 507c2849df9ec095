//! CLI module for dbdr
//!
//! Operator commands:
//! - check-config: load and validate configuration
//! - show-state: print the persisted controller state

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, ConfigSource};
pub use commands::{check_config, load_state, run, run_command, show_state};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_response;
