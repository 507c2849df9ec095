//! CLI argument definitions using clap
//!
//! Commands:
//! - dbdr check-config (--config <path> | --from-env)
//! - dbdr show-state --state-dir <dir> (--config <path> | --from-env)

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::observability::LogFormat;

/// dbdr - two-region database failover controller
#[derive(Parser, Debug)]
#[command(name = "dbdr")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format: json or text
    #[arg(long, global = true, default_value = "json")]
    pub log_format: LogFormat,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the controller configuration comes from.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ConfigSource {
    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Read configuration from environment variables
    #[arg(long)]
    pub from_env: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate the configuration
    CheckConfig {
        #[command(flatten)]
        source: ConfigSource,
    },

    /// Print the persisted controller state, migrating legacy documents
    ShowState {
        /// Directory backing the file parameter store
        #[arg(long)]
        state_dir: PathBuf,

        #[command(flatten)]
        source: ConfigSource,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_config_requires_a_source() {
        assert!(Cli::try_parse_from(["dbdr", "check-config"]).is_err());
        assert!(Cli::try_parse_from(["dbdr", "check-config", "--from-env"]).is_ok());
    }

    #[test]
    fn test_sources_are_exclusive() {
        let result =
            Cli::try_parse_from(["dbdr", "check-config", "--config", "a.json", "--from-env"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_show_state_args() {
        let cli = Cli::try_parse_from([
            "dbdr",
            "--log-format",
            "text",
            "show-state",
            "--state-dir",
            "/var/lib/dbdr",
            "--config",
            "dbdr.json",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Text);
        match cli.command {
            Command::ShowState { state_dir, source } => {
                assert_eq!(state_dir, PathBuf::from("/var/lib/dbdr"));
                assert_eq!(source.config, Some(PathBuf::from("dbdr.json")));
                assert!(!source.from_env);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
