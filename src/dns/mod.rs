//! DNS Publisher
//!
//! Keeps a single CNAME pointed at the active writer's endpoint. Every
//! submission is an upsert, so repeating it with the same target only
//! re-states the record value and TTL.
//!
//! Record names and targets are always fully qualified (trailing dot)
//! before submission; an unqualified target may be interpreted as a name
//! relative to the hosted zone.

mod memory;

pub use memory::MemoryDns;

use std::fmt;

use chrono::Utc;
use tracing::info;

use crate::config::DnsConfig;
use crate::service::{BoxFuture, ServiceResult};

/// Supported record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Cname,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cname => f.write_str("CNAME"),
        }
    }
}

/// A single upsert submitted to the DNS control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub zone_id: String,
    pub name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub value: String,
    pub comment: String,
}

/// DNS control plane contract.
pub trait DnsControlPlane: Send + Sync {
    /// Create or replace a record.
    fn upsert_record<'a>(&'a self, change: &'a RecordChange) -> BoxFuture<'a, ServiceResult<()>>;
}

/// Append a trailing dot unless already present.
pub fn fully_qualify(name: &str) -> String {
    let name = name.trim();
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Publishes the configured record.
pub struct DnsPublisher<'a> {
    config: &'a DnsConfig,
    plane: &'a dyn DnsControlPlane,
}

impl<'a> DnsPublisher<'a> {
    pub fn new(config: &'a DnsConfig, plane: &'a dyn DnsControlPlane) -> Self {
        Self { config, plane }
    }

    /// Build the change that points the record at `target`.
    pub fn change_for(&self, target: &str) -> RecordChange {
        RecordChange {
            zone_id: self.config.zone_id.clone(),
            name: fully_qualify(&self.config.record_name),
            record_type: RecordType::Cname,
            ttl: self.config.ttl,
            value: fully_qualify(target),
            comment: format!("DB DR automation {}", Utc::now().to_rfc3339()),
        }
    }

    /// Upsert the record to point at `target`.
    pub async fn publish(&self, target: &str) -> ServiceResult<RecordChange> {
        let change = self.change_for(target);
        self.plane.upsert_record(&change).await?;

        info!(
            record = %change.name,
            target = %change.value,
            ttl = change.ttl,
            "dns record upserted"
        );

        Ok(change)
    }
}
