//! Document shape migration.
//!
//! Version 1 documents carry no `schema_version`, may lack any field, use
//! free-form diagnostic records and have no `primary_writer_id`. They are
//! lifted into the current shape field by field. Logic-bearing fields
//! (`active`, `phase`, streak) must parse exactly; diagnostic fields are
//! dropped when they cannot be understood.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::errors::{StoreError, StoreResult};
use crate::health::HealthDetail;
use crate::state::{ControllerState, HealthSnapshot, LastAction, Phase, SCHEMA_VERSION};
use crate::topology::Region;

/// Identifiers needed to infer fields the legacy shape did not record.
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext<'a> {
    pub primary_db_id: &'a str,
    pub failback_db_id: &'a str,
}

/// Parse a stored document, migrating it when needed.
///
/// Returns the state and whether a migration took place.
pub fn decode(raw: &str, ctx: MigrationContext<'_>) -> StoreResult<(ControllerState, bool)> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| StoreError::corrupt(format!("invalid JSON: {}", e)))?;

    let doc = value
        .as_object()
        .ok_or_else(|| StoreError::corrupt("document is not a JSON object"))?;

    match doc.get("schema_version") {
        None => Ok((migrate_v1(doc, ctx)?, true)),
        Some(v) => match v.as_u64() {
            Some(version) if version == u64::from(SCHEMA_VERSION) => {
                let state: ControllerState = serde_json::from_value(value.clone())
                    .map_err(|e| StoreError::corrupt(e.to_string()))?;
                Ok((state, false))
            }
            _ => Err(StoreError::corrupt(format!(
                "unsupported schema_version {}",
                v
            ))),
        },
    }
}

fn migrate_v1(doc: &Map<String, Value>, ctx: MigrationContext<'_>) -> StoreResult<ControllerState> {
    let active = match doc.get("active") {
        None | Some(Value::Null) => Region::Primary,
        Some(Value::String(s)) => match s.as_str() {
            "primary" => Region::Primary,
            "secondary" => Region::Secondary,
            other => return Err(StoreError::corrupt(format!("unknown active region '{}'", other))),
        },
        Some(other) => return Err(StoreError::corrupt(format!("invalid active value {}", other))),
    };

    let phase = match doc.get("phase") {
        None | Some(Value::Null) => Phase::Steady,
        Some(Value::String(s)) => s
            .parse::<Phase>()
            .map_err(|e| StoreError::corrupt(e.to_string()))?,
        Some(other) => return Err(StoreError::corrupt(format!("invalid phase value {}", other))),
    };

    let streak = match doc.get("failback_healthy_streak") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StoreError::corrupt(format!("invalid streak {}", n)))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| StoreError::corrupt(format!("invalid streak '{}'", s)))?,
        Some(other) => return Err(StoreError::corrupt(format!("invalid streak {}", other))),
    };

    let last_action = doc.get("last_action").and_then(legacy_action);
    let transition_started_at = timestamp(doc.get("transition_started_at"));

    let primary_writer_id = match doc.get("primary_writer_id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ if failed_back(active, phase, transition_started_at.is_some(), last_action.as_ref()) => {
            ctx.failback_db_id.to_string()
        }
        _ => ctx.primary_db_id.to_string(),
    };

    Ok(ControllerState {
        schema_version: SCHEMA_VERSION,
        active,
        phase,
        failback_healthy_streak: streak,
        primary_writer_id,
        last_action,
        hc: doc.get("hc").and_then(legacy_health),
        transition_started_at,
        ts: timestamp(doc.get("ts")).unwrap_or_else(Utc::now),
        updated_at: timestamp(doc.get("updated_at")),
    })
}

/// Actions the legacy controller recorded only after DNS had moved back to
/// the failback instance.
const POST_FAILBACK_ACTIONS: &[&str] = &[
    "dns_to_primary_failback",
    "secondary_already_replica",
    "delete_old_secondary_writer",
    "wait_secondary_deleted",
    "wait_primary_writer_for_replica_create",
    "create_secondary_replica",
    "wait_secondary_replica_exists",
    "wait_secondary_replica_available",
    "secondary_not_replica_yet",
    "secondary_replica_ready",
];

/// Whether a legacy document shows that a failback has completed.
///
/// The legacy controller always failed back onto the failback instance and
/// never cleared `transition_started_at`. A steady primary that has been
/// through a transition can only have got there by failing back, since a
/// failover ends with the secondary active.
fn failed_back(
    active: Region,
    phase: Phase,
    transitioned: bool,
    last_action: Option<&LastAction>,
) -> bool {
    if active != Region::Primary {
        return false;
    }
    phase.is_rebuild()
        || (phase == Phase::Steady && transitioned)
        || last_action.is_some_and(|a| POST_FAILBACK_ACTIONS.contains(&a.action.as_str()))
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn legacy_action(value: &Value) -> Option<LastAction> {
    let obj = value.as_object()?;
    let action = obj.get("action")?.as_str()?.to_string();
    let result = ["result", "target", "status"]
        .iter()
        .find_map(|k| obj.get(*k))
        .map(scalar_text)
        .unwrap_or_default();

    Some(LastAction {
        at: timestamp(obj.get("at")).unwrap_or_else(Utc::now),
        action,
        result,
    })
}

fn legacy_health(value: &Value) -> Option<HealthSnapshot> {
    let obj = value.as_object()?;
    let checked_at = timestamp(obj.get("checked_at"))?;

    let detail = obj.get("detail").and_then(Value::as_object).map(|d| {
        let count = |k: &str| d.get(k).and_then(Value::as_u64).unwrap_or(0) as usize;
        let decision = match d.get("decision") {
            Some(Value::Bool(true)) => "healthy".to_string(),
            Some(Value::Bool(false)) => "unhealthy".to_string(),
            Some(other) => scalar_text(other),
            None => String::new(),
        };
        HealthDetail {
            observations: count("observations"),
            healthy: count("healthy"),
            unhealthy: count("unhealthy"),
            decision,
        }
    });

    Some(HealthSnapshot {
        primary_hc_healthy: obj.get("primary_hc_healthy").and_then(Value::as_bool),
        detail,
        checked_at,
        error: None,
    })
}
