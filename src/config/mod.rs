//! Controller Configuration
//!
//! Every operational parameter is supplied externally and validated once
//! at startup. The resulting `ControllerConfig` is immutable and passed by
//! reference into every component; nothing below this module reads the
//! process environment.
//!
//! Two sources are supported:
//! - A JSON file (`ControllerConfig::load`)
//! - Environment variables (`ControllerConfig::from_env`)

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::topology::Region;

/// Default DNS TTL in seconds
pub const DEFAULT_TTL: u32 = 30;

/// Default number of consecutive healthy ticks required before failback
pub const DEFAULT_FAILBACK_HEALTHY_STREAK: u32 = 2;

/// Per-region provisioning parameters used when creating a replica in
/// that region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegionConfig {
    /// Region identifier (e.g. `us-east-1`)
    #[serde(default)]
    pub region: String,

    /// KMS key used to encrypt replicas created in this region
    #[serde(default)]
    pub kms_key: String,

    /// Subnet group for replicas created in this region
    #[serde(default)]
    pub subnet_group: String,

    /// Security group attached to replicas created in this region
    #[serde(default)]
    pub security_group_id: String,

    /// Instance class for replicas created in this region
    #[serde(default)]
    pub instance_class: String,

    /// Whether replicas created in this region are Multi-AZ.
    ///
    /// The environment source sets this to true for the primary region and
    /// false for the secondary; the file source defaults it to false.
    #[serde(default)]
    pub multi_az: bool,
}

/// DNS record the controller keeps pointed at the active writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Hosted zone identifier
    #[serde(default)]
    pub zone_id: String,

    /// Record name (CNAME)
    #[serde(default)]
    pub record_name: String,

    /// Record TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            zone_id: String::new(),
            record_name: String::new(),
            ttl: DEFAULT_TTL,
        }
    }
}

/// Immutable controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Primary region parameters
    #[serde(default)]
    pub primary: RegionConfig,

    /// Secondary region parameters
    #[serde(default)]
    pub secondary: RegionConfig,

    /// Original primary-region writer
    #[serde(default)]
    pub primary_db_id: String,

    /// Secondary-region replica, promoted on failover
    #[serde(default)]
    pub secondary_db_id: String,

    /// Fresh primary-region instance provisioned on failback
    #[serde(default)]
    pub failback_db_id: String,

    #[serde(default)]
    pub dns: DnsConfig,

    /// Health check observing the primary region
    #[serde(default)]
    pub health_check_id: String,

    /// Parameter-store key holding the controller state document
    #[serde(default)]
    pub state_param_name: String,

    /// Consecutive healthy ticks required before failback may begin
    #[serde(default = "default_failback_streak")]
    pub failback_healthy_streak: u32,

    /// Take a final snapshot when deleting the promoted secondary during
    /// rebuild
    #[serde(default = "default_true")]
    pub rebuild_final_snapshot: bool,
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_failback_streak() -> u32 {
    DEFAULT_FAILBACK_HEALTHY_STREAK
}

fn default_true() -> bool {
    true
}

impl ControllerConfig {
    /// Load configuration from a JSON file and validate it.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON document and validate it.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: ControllerConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup function.
    ///
    /// All missing required variables are collected and reported together.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut req = |name: &str| -> String {
            match lookup(name).filter(|v| !v.trim().is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };

        let primary = RegionConfig {
            region: req("PRIMARY_REGION"),
            kms_key: req("PRIMARY_KMS_KEY"),
            subnet_group: req("PRIMARY_SUBNET_GROUP"),
            security_group_id: req("PRIMARY_DB_SG_ID"),
            instance_class: req("PRIMARY_CLASS"),
            multi_az: true,
        };
        let secondary = RegionConfig {
            region: req("SECONDARY_REGION"),
            kms_key: req("SECONDARY_KMS_KEY"),
            subnet_group: req("SECONDARY_SUBNET_GROUP"),
            security_group_id: req("SECONDARY_DB_SG_ID"),
            instance_class: req("SECONDARY_CLASS"),
            multi_az: false,
        };
        let primary_db_id = req("PRIMARY_DB_ID");
        let secondary_db_id = req("SECONDARY_DB_ID");
        let failback_db_id = req("FAILBACK_DB_ID");
        let zone_id = req("ROUTE53_ZONE_ID");
        let record_name = req("ROUTE53_RECORD_NAME");
        let health_check_id = req("ROUTE53_HEALTH_CHECK_ID");
        let state_param_name = req("STATE_PARAM_NAME");

        if !missing.is_empty() {
            return Err(ConfigError::MissingParameters(missing));
        }

        let config = Self {
            primary,
            secondary,
            primary_db_id,
            secondary_db_id,
            failback_db_id,
            dns: DnsConfig {
                zone_id,
                record_name,
                ttl: parse_optional(&lookup, "TTL", DEFAULT_TTL)?,
            },
            health_check_id,
            state_param_name,
            failback_healthy_streak: parse_optional(
                &lookup,
                "FAILBACK_HEALTHY_STREAK",
                DEFAULT_FAILBACK_HEALTHY_STREAK,
            )?,
            rebuild_final_snapshot: parse_optional(&lookup, "REBUILD_FINAL_SNAPSHOT", true)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// - Every required value is present and non-blank
    /// - TTL and streak threshold are positive
    /// - The three instance identifiers are pairwise distinct
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("primary.region", &self.primary.region),
            ("primary.kms_key", &self.primary.kms_key),
            ("primary.subnet_group", &self.primary.subnet_group),
            ("primary.security_group_id", &self.primary.security_group_id),
            ("primary.instance_class", &self.primary.instance_class),
            ("secondary.region", &self.secondary.region),
            ("secondary.kms_key", &self.secondary.kms_key),
            ("secondary.subnet_group", &self.secondary.subnet_group),
            ("secondary.security_group_id", &self.secondary.security_group_id),
            ("secondary.instance_class", &self.secondary.instance_class),
            ("primary_db_id", &self.primary_db_id),
            ("secondary_db_id", &self.secondary_db_id),
            ("failback_db_id", &self.failback_db_id),
            ("dns.zone_id", &self.dns.zone_id),
            ("dns.record_name", &self.dns.record_name),
            ("health_check_id", &self.health_check_id),
            ("state_param_name", &self.state_param_name),
        ];

        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingParameters(missing));
        }

        if self.dns.ttl == 0 {
            return Err(ConfigError::invalid("dns.ttl", self.dns.ttl, "must be > 0"));
        }

        if self.failback_healthy_streak == 0 {
            return Err(ConfigError::invalid(
                "failback_healthy_streak",
                self.failback_healthy_streak,
                "must be >= 1",
            ));
        }

        let ids = [
            ("primary_db_id", &self.primary_db_id),
            ("secondary_db_id", &self.secondary_db_id),
            ("failback_db_id", &self.failback_db_id),
        ];
        for (i, (name, id)) in ids.iter().enumerate() {
            if ids[i + 1..].iter().any(|(_, other)| other == id) {
                return Err(ConfigError::invalid(
                    *name,
                    id,
                    "instance identifiers must be distinct",
                ));
            }
        }

        Ok(())
    }

    /// Provisioning parameters for a region.
    pub fn region(&self, region: Region) -> &RegionConfig {
        match region {
            Region::Primary => &self.primary,
            Region::Secondary => &self.secondary,
        }
    }
}

fn parse_optional<F, T>(lookup: &F, name: &str, default: T) -> ConfigResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(name, &raw, "not a valid value")),
    }
}
