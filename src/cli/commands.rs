//! CLI command implementations
//!
//! Commands are read-only: they never tick the controller or call a
//! control plane.

use std::path::Path;

use serde_json::{json, Value};

use crate::config::ControllerConfig;
use crate::engine::failback_target_id;
use crate::observability::init_logging;
use crate::store::{FileParameterStore, LoadedState, StateStore};

use super::args::{Cli, Command, ConfigSource};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments, install logging, and dispatch.
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(cli.log_format, &cli.log_level)
        .map_err(|e| CliError::logging_error(e.to_string()))?;
    run_command(cli.command).await
}

/// Run the appropriate command based on CLI args
pub async fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::CheckConfig { source } => check_config(&source),
        Command::ShowState { state_dir, source } => show_state(&state_dir, &source).await,
    }
}

/// Load and validate the configuration, then print a summary.
pub fn check_config(source: &ConfigSource) -> CliResult<()> {
    let config = load_config(source)?;
    write_response(config_summary(&config))
}

/// Print the persisted state document.
pub async fn show_state(state_dir: &Path, source: &ConfigSource) -> CliResult<()> {
    let config = load_config(source)?;
    let loaded = load_state(state_dir, &config).await?;
    write_response(state_report(&loaded, &config)?)
}

fn load_config(source: &ConfigSource) -> CliResult<ControllerConfig> {
    let config = match &source.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::from_env()?,
    };
    Ok(config)
}

/// Read the state document from a file-backed store.
pub async fn load_state(state_dir: &Path, config: &ControllerConfig) -> CliResult<LoadedState> {
    let params = FileParameterStore::new(state_dir);
    let loaded = StateStore::new(&params, config).load().await?;
    Ok(loaded)
}

fn config_summary(config: &ControllerConfig) -> Value {
    json!({
        "valid": true,
        "primary_region": config.primary.region,
        "secondary_region": config.secondary.region,
        "primary_db_id": config.primary_db_id,
        "secondary_db_id": config.secondary_db_id,
        "failback_db_id": config.failback_db_id,
        "record_name": config.dns.record_name,
        "ttl": config.dns.ttl,
        "state_param_name": config.state_param_name,
        "failback_healthy_streak": config.failback_healthy_streak,
        "rebuild_final_snapshot": config.rebuild_final_snapshot,
    })
}

/// The failback section names the instance the next failback provisions.
/// A standalone writer left under that identifier stops the failback until
/// an operator deletes it.
fn state_report(loaded: &LoadedState, config: &ControllerConfig) -> CliResult<Value> {
    let target = failback_target_id(config, &loaded.state);
    Ok(json!({
        "origin": loaded.origin.as_str(),
        "state": serde_json::to_value(&loaded.state)?,
        "failback": {
            "target_id": target,
            "operator_action": format!(
                "before failback, delete any standalone instance {} left in {}",
                target, config.primary.region
            ),
        },
    }))
}
