//! Shared harness for controller scenario tests.
//!
//! Wires a `Controller` to in-memory control planes, DNS, health source and
//! parameter store. The default topology is a healthy steady pair: an
//! available writer in the primary region and its available replica in the
//! secondary region.

#![allow(dead_code)]

use std::sync::Arc;

use dbdr::config::{ControllerConfig, DnsConfig, RegionConfig};
use dbdr::dns::MemoryDns;
use dbdr::health::ScriptedHealthSource;
use dbdr::state::ControllerState;
use dbdr::store::MemoryParameterStore;
use dbdr::topology::{InstanceRecord, MemoryControlPlane};
use dbdr::{Collaborators, Controller, ControllerResult, TickSummary};

pub const PRIMARY_ID: &str = "orders-primary";
pub const SECONDARY_ID: &str = "orders-secondary";
pub const FAILBACK_ID: &str = "orders-failback";
pub const STATE_KEY: &str = "/dr/state";
pub const RECORD: &str = "db.internal.example.";

fn region(name: &str, multi_az: bool) -> RegionConfig {
    RegionConfig {
        region: name.to_string(),
        kms_key: format!("kms-{}", name),
        subnet_group: format!("subnets-{}", name),
        security_group_id: format!("sg-{}", name),
        instance_class: "db.r6g.large".to_string(),
        multi_az,
    }
}

pub fn config() -> ControllerConfig {
    ControllerConfig {
        primary: region("us-east-1", true),
        secondary: region("us-west-2", false),
        primary_db_id: PRIMARY_ID.to_string(),
        secondary_db_id: SECONDARY_ID.to_string(),
        failback_db_id: FAILBACK_ID.to_string(),
        dns: DnsConfig {
            zone_id: "Z1".to_string(),
            record_name: "db.internal.example".to_string(),
            ttl: 30,
        },
        health_check_id: "hc-1".to_string(),
        state_param_name: STATE_KEY.to_string(),
        failback_healthy_streak: 2,
        rebuild_final_snapshot: true,
    }
}

pub struct Harness {
    pub controller: Controller,
    pub primary: MemoryControlPlane,
    pub secondary: MemoryControlPlane,
    pub dns: MemoryDns,
    pub health: ScriptedHealthSource,
    pub params: MemoryParameterStore,
}

impl Harness {
    /// Healthy steady topology with the default configuration.
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let harness = Self::empty(config);
        harness
            .primary
            .put_instance(InstanceRecord::writer(PRIMARY_ID, "pri.example"));
        harness.secondary.put_instance(InstanceRecord::replica(
            SECONDARY_ID,
            format!("arn:db:{}", PRIMARY_ID),
            "sec.example",
        ));
        harness
    }

    /// No instances at all.
    pub fn empty(config: ControllerConfig) -> Self {
        let primary = MemoryControlPlane::new();
        let secondary = MemoryControlPlane::new();
        let dns = MemoryDns::new();
        let health = ScriptedHealthSource::new();
        let params = MemoryParameterStore::new();

        let controller = Controller::new(
            config,
            Collaborators {
                primary_db: Arc::new(primary.clone()),
                secondary_db: Arc::new(secondary.clone()),
                dns: Arc::new(dns.clone()),
                health: Arc::new(health.clone()),
                store: Arc::new(params.clone()),
            },
        )
        .expect("valid test configuration");

        Self {
            controller,
            primary,
            secondary,
            dns,
            health,
            params,
        }
    }

    /// Run a tick that is expected to succeed.
    pub async fn tick(&self) -> TickSummary {
        self.controller.tick().await.expect("tick succeeds")
    }

    pub async fn try_tick(&self) -> ControllerResult<TickSummary> {
        self.controller.tick().await
    }

    /// Persisted state as the next tick would see it.
    pub async fn state(&self) -> ControllerState {
        self.controller
            .current_state()
            .await
            .expect("state loads")
    }

    pub fn seed_state(&self, state: &ControllerState) {
        self.params
            .seed(STATE_KEY, serde_json::to_string(state).expect("state serializes"));
    }

    /// Current value of the managed record.
    pub fn dns_target(&self) -> Option<String> {
        self.dns.record(RECORD)
    }
}
