//! Phase Transition Engine
//!
//! Executes exactly one step of the current phase per tick:
//! - observe the instances the phase depends on
//! - issue at most one mutating call
//! - advance along the phase graph or stay put
//!
//! A phase whose precondition is missing stays put and reports what it is
//! waiting for. A topology that contradicts the phase is an invariant
//! violation and aborts the tick.

use chrono::Utc;
use tracing::{error, info, warn};

use super::errors::{ControllerError, ControllerResult};
use crate::config::ControllerConfig;
use crate::dns::{DnsControlPlane, DnsPublisher};
use crate::observability::ControllerEvent;
use crate::state::{ControllerState, Phase};
use crate::topology::{
    CreateOutcome, CreateReplicaRequest, DeleteInstanceRequest, DeleteOutcome, EndpointSnapshot,
    PromoteOutcome, Region, Topology,
};

/// What one phase step decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub from: Phase,
    pub to: Phase,
    /// Action name; `None` when the step had nothing to do
    pub action: Option<String>,
    pub result: String,
    /// Whether a mutating collaborator call was issued
    pub mutated: bool,
}

impl StepReport {
    pub fn advanced(&self) -> bool {
        self.from != self.to
    }
}

/// Decision computed by a phase handler, applied by `PhaseEngine::step`.
#[derive(Debug)]
struct Step {
    next: Phase,
    action: Option<&'static str>,
    result: String,
    mutated: bool,
    active: Option<Region>,
    primary_writer_id: Option<String>,
}

impl Step {
    fn stay(phase: Phase, action: &'static str, result: impl Into<String>) -> Self {
        Self::advance(phase, action, result)
    }

    fn advance(next: Phase, action: &'static str, result: impl Into<String>) -> Self {
        Self {
            next,
            action: Some(action),
            result: result.into(),
            mutated: false,
            active: None,
            primary_writer_id: None,
        }
    }

    fn idle() -> Self {
        Self {
            next: Phase::Steady,
            action: None,
            result: String::new(),
            mutated: false,
            active: None,
            primary_writer_id: None,
        }
    }

    fn mutating(mut self) -> Self {
        self.mutated = true;
        self
    }

    fn with_active(mut self, region: Region) -> Self {
        self.active = Some(region);
        self
    }

    fn with_primary_writer(mut self, id: impl Into<String>) -> Self {
        self.primary_writer_id = Some(id.into());
        self
    }
}

/// Name of the final snapshot taken before an old writer is deleted.
pub fn final_snapshot_id(instance_id: &str) -> String {
    format!("{}-final-{}", instance_id, Utc::now().format("%Y%m%d%H%M%S"))
}

/// Instance that becomes the primary-region writer on the next failback.
///
/// Alternates between the failback and original primary identifiers so a
/// second failback never collides with the writer built by the first.
pub fn failback_target_id<'c>(config: &'c ControllerConfig, state: &ControllerState) -> &'c str {
    if state.primary_writer_id == config.failback_db_id {
        &config.primary_db_id
    } else {
        &config.failback_db_id
    }
}

/// Runs one phase step against the live topology.
pub struct PhaseEngine<'a> {
    config: &'a ControllerConfig,
    topology: &'a Topology,
    dns: DnsPublisher<'a>,
}

impl<'a> PhaseEngine<'a> {
    pub fn new(
        config: &'a ControllerConfig,
        topology: &'a Topology,
        dns: &'a dyn DnsControlPlane,
    ) -> Self {
        Self {
            config,
            topology,
            dns: DnsPublisher::new(&config.dns, dns),
        }
    }

    /// Execute the current phase once and apply the outcome to `state`.
    ///
    /// On error `state` is left untouched.
    pub async fn step(&self, state: &mut ControllerState) -> ControllerResult<StepReport> {
        let from = state.phase;
        let step = match self.execute(state).await {
            Ok(step) => step,
            Err(e) => {
                if matches!(e, ControllerError::InvariantViolation { .. }) {
                    error!(
                        event = ControllerEvent::InvariantViolated.as_str(),
                        phase = %from,
                        error = %e,
                        "topology contradicts phase; operator action required"
                    );
                }
                return Err(e);
            }
        };

        if !from.allows(step.next) {
            return Err(ControllerError::ForbiddenTransition {
                from,
                to: step.next,
            });
        }

        if let Some(region) = step.active {
            state.active = region;
        }
        if let Some(id) = &step.primary_writer_id {
            state.primary_writer_id = id.clone();
        }
        state.phase = step.next;
        if let Some(action) = step.action {
            state.record_action(action, step.result.clone());
        }
        if step.next.is_steady() && !from.is_steady() {
            state.ts = Utc::now();
            state.transition_started_at = None;
        }

        let report = StepReport {
            from,
            to: step.next,
            action: step.action.map(str::to_string),
            result: step.result,
            mutated: step.mutated,
        };
        self.log(&report);
        Ok(report)
    }

    fn log(&self, report: &StepReport) {
        let Some(action) = report.action.as_deref() else {
            return;
        };

        if report.mutated {
            info!(
                event = ControllerEvent::ActionIssued.as_str(),
                phase = %report.from,
                action,
                result = %report.result,
                "mutating call issued"
            );
        }

        if report.advanced() {
            info!(
                event = ControllerEvent::PhaseAdvanced.as_str(),
                from = %report.from,
                to = %report.to,
                action,
                result = %report.result,
                "phase advanced"
            );
        } else {
            info!(
                event = ControllerEvent::PhaseWaiting.as_str(),
                phase = %report.from,
                action,
                result = %report.result,
                "phase waiting"
            );
        }
    }

    async fn execute(&self, state: &ControllerState) -> ControllerResult<Step> {
        match state.phase {
            Phase::Steady => Ok(Step::idle()),
            Phase::FailoverPromoteSecondary => self.failover_promote_secondary().await,
            Phase::FailoverUpdateDns => self.failover_update_dns().await,
            Phase::FailbackCreateReplicaPrimary => self.failback_create_replica(state).await,
            Phase::FailbackPromotePrimary => self.failback_promote(state).await,
            Phase::FailbackUpdateDns => self.failback_update_dns(state).await,
            Phase::RebuildSecondaryDeleteOld => self.rebuild_delete_old().await,
            Phase::RebuildSecondaryWaitDelete => self.rebuild_wait_delete().await,
            Phase::RebuildSecondaryCreateReplica => self.rebuild_create_replica(state).await,
            Phase::RebuildSecondaryWaitReplica => self.rebuild_wait_replica().await,
        }
    }

    async fn describe(&self, region: Region, id: &str) -> ControllerResult<EndpointSnapshot> {
        self.topology
            .describe(region, id)
            .await
            .map_err(ControllerError::service(format!("describe {} {}", region, id)))
    }

    async fn describe_secondary(&self) -> ControllerResult<EndpointSnapshot> {
        self.describe(Region::Secondary, &self.config.secondary_db_id)
            .await
    }

    async fn promote(&self, snapshot: &EndpointSnapshot) -> ControllerResult<PromoteOutcome> {
        self.topology
            .promote(snapshot)
            .await
            .map_err(ControllerError::service(format!("promote {}", snapshot.id)))
    }

    async fn create_replica(
        &self,
        region: Region,
        request: &CreateReplicaRequest,
    ) -> ControllerResult<CreateOutcome> {
        self.topology
            .create_replica(region, request)
            .await
            .map_err(ControllerError::service(format!(
                "create replica {} in {}",
                request.target_id, region
            )))
    }

    async fn publish(&self, target: &str) -> ControllerResult<()> {
        self.dns
            .publish(target)
            .await
            .map_err(ControllerError::service("dns upsert"))?;
        Ok(())
    }

    // =========================================================================
    // FAILOVER
    // =========================================================================

    async fn failover_promote_secondary(&self) -> ControllerResult<Step> {
        let phase = Phase::FailoverPromoteSecondary;
        let secondary = self.describe_secondary().await?;

        if !secondary.exists {
            return Err(ControllerError::invariant(
                phase,
                format!("secondary {} does not exist; cannot fail over", secondary.id),
            ));
        }

        if secondary.is_available_writer() {
            return Ok(Step::advance(
                Phase::FailoverUpdateDns,
                "secondary_writer_ready",
                secondary.status,
            ));
        }

        if secondary.is_available_replica() {
            let outcome = self.promote(&secondary).await?;
            let step = Step::stay(phase, "promote_secondary", outcome.to_string());
            return Ok(match outcome {
                PromoteOutcome::Called => step.mutating(),
                PromoteOutcome::Waiting(_) => step,
            });
        }

        Ok(Step::stay(
            phase,
            "wait_secondary_available",
            format!("waiting:{}", secondary.status),
        ))
    }

    async fn failover_update_dns(&self) -> ControllerResult<Step> {
        let phase = Phase::FailoverUpdateDns;
        let secondary = self.describe_secondary().await?;

        if !secondary.exists {
            return Err(ControllerError::invariant(
                phase,
                format!("secondary {} disappeared mid-failover", secondary.id),
            ));
        }

        if !secondary.is_available_writer() {
            return Ok(Step::stay(
                phase,
                "wait_secondary_writer",
                format!("waiting:{}", secondary.status),
            ));
        }

        match secondary.address.as_deref() {
            Some(address) => {
                self.publish(address).await?;
                Ok(Step::advance(Phase::Steady, "dns_to_secondary", address)
                    .mutating()
                    .with_active(Region::Secondary))
            }
            None => Ok(Step::stay(phase, "wait_secondary_endpoint", "waiting:no-address")),
        }
    }

    // =========================================================================
    // FAILBACK
    // =========================================================================

    async fn failback_create_replica(&self, state: &ControllerState) -> ControllerResult<Step> {
        let phase = Phase::FailbackCreateReplicaPrimary;
        let target_id = failback_target_id(self.config, state);
        let target = self.describe(Region::Primary, target_id).await?;

        if target.is_replica() {
            return Ok(Step::advance(
                Phase::FailbackPromotePrimary,
                "failback_replica_exists",
                target.status,
            ));
        }
        if target.exists {
            return Err(ControllerError::invariant(
                phase,
                format!(
                    "failback target {} already exists as a standalone writer ({}); \
                     delete it from {} and failback resumes on the next tick",
                    target.id, target.status, self.config.primary.region
                ),
            ));
        }

        let secondary = self.describe_secondary().await?;
        if !secondary.exists {
            return Err(ControllerError::invariant(
                phase,
                format!("secondary writer {} does not exist; nothing to fail back from", secondary.id),
            ));
        }
        if !secondary.is_available_writer() {
            return Ok(Step::stay(
                phase,
                "wait_secondary_writer",
                format!("waiting:{}", secondary.status),
            ));
        }
        let Some(source_ref) = secondary.stable_ref.as_deref() else {
            return Ok(Step::stay(phase, "wait_secondary_reference", "waiting:no-reference"));
        };

        let request = CreateReplicaRequest::new(
            target_id,
            source_ref,
            &self.config.region(Region::Secondary).region,
            self.config.region(Region::Primary),
        );
        let outcome = self.create_replica(Region::Primary, &request).await?;
        let step = Step::advance(
            Phase::FailbackPromotePrimary,
            "create_failback_replica",
            outcome.to_string(),
        );
        Ok(match outcome {
            CreateOutcome::Called => step.mutating(),
            CreateOutcome::AlreadyExists => step,
        })
    }

    async fn failback_promote(&self, state: &ControllerState) -> ControllerResult<Step> {
        let phase = Phase::FailbackPromotePrimary;
        let target = self
            .describe(Region::Primary, failback_target_id(self.config, state))
            .await?;

        if !target.exists {
            warn!(
                event = ControllerEvent::InstanceMissing.as_str(),
                phase = phase.as_str(),
                id = %target.id,
                "failback instance does not exist; waiting"
            );
        }
        if !target.is_available() {
            return Ok(Step::stay(
                phase,
                "wait_failback_available",
                format!("waiting:{}", target.status),
            ));
        }

        if target.is_replica() {
            let outcome = self.promote(&target).await?;
            let step = Step::stay(phase, "promote_failback", outcome.to_string());
            return Ok(match outcome {
                PromoteOutcome::Called => step.mutating(),
                PromoteOutcome::Waiting(_) => step,
            });
        }

        Ok(Step::advance(
            Phase::FailbackUpdateDns,
            "failback_writer_ready",
            target.status,
        ))
    }

    async fn failback_update_dns(&self, state: &ControllerState) -> ControllerResult<Step> {
        let phase = Phase::FailbackUpdateDns;
        let target = self
            .describe(Region::Primary, failback_target_id(self.config, state))
            .await?;

        if !target.exists {
            return Err(ControllerError::invariant(
                phase,
                format!("failback writer {} disappeared before DNS cutover", target.id),
            ));
        }

        if !target.is_available_writer() {
            return Ok(Step::stay(
                phase,
                "wait_failback_writer",
                format!("waiting:{}", target.status),
            ));
        }

        match target.address.as_deref() {
            Some(address) => {
                self.publish(address).await?;
                Ok(
                    Step::advance(Phase::RebuildSecondaryDeleteOld, "dns_to_primary", address)
                        .mutating()
                        .with_active(Region::Primary)
                        .with_primary_writer(target.id.clone()),
                )
            }
            None => Ok(Step::stay(phase, "wait_failback_endpoint", "waiting:no-address")),
        }
    }

    // =========================================================================
    // SECONDARY REBUILD
    // =========================================================================

    async fn rebuild_delete_old(&self) -> ControllerResult<Step> {
        let phase = Phase::RebuildSecondaryDeleteOld;
        let secondary = self.describe_secondary().await?;

        if !secondary.exists {
            return Ok(Step::advance(
                Phase::RebuildSecondaryCreateReplica,
                "secondary_absent",
                "missing",
            ));
        }
        if secondary.is_replica() {
            return Ok(Step::advance(Phase::Steady, "secondary_already_replica", secondary.status));
        }
        if secondary.is_deleting() {
            return Ok(Step::advance(
                Phase::RebuildSecondaryWaitDelete,
                "secondary_deleting",
                secondary.status,
            ));
        }
        if !secondary.is_available() {
            return Ok(Step::stay(
                phase,
                "wait_old_secondary_available",
                format!("waiting:{}", secondary.status),
            ));
        }

        let request = DeleteInstanceRequest {
            final_snapshot_id: self
                .config
                .rebuild_final_snapshot
                .then(|| final_snapshot_id(&secondary.id)),
            id: secondary.id,
            delete_automated_backups: true,
        };
        let outcome = self
            .topology
            .delete(Region::Secondary, &request)
            .await
            .map_err(ControllerError::service(format!("delete {}", request.id)))?;

        let result = outcome.to_string();
        Ok(match outcome {
            DeleteOutcome::Called { .. } => {
                Step::advance(Phase::RebuildSecondaryWaitDelete, "delete_old_secondary", result)
                    .mutating()
            }
            DeleteOutcome::NotFound => Step::advance(
                Phase::RebuildSecondaryCreateReplica,
                "delete_old_secondary",
                result,
            ),
            DeleteOutcome::Waiting => Step::stay(phase, "delete_old_secondary", result),
        })
    }

    async fn rebuild_wait_delete(&self) -> ControllerResult<Step> {
        let secondary = self.describe_secondary().await?;

        if secondary.exists {
            return Ok(Step::stay(
                Phase::RebuildSecondaryWaitDelete,
                "wait_secondary_deleted",
                format!("waiting:{}", secondary.status),
            ));
        }

        Ok(Step::advance(
            Phase::RebuildSecondaryCreateReplica,
            "secondary_deleted",
            "missing",
        ))
    }

    async fn rebuild_create_replica(&self, state: &ControllerState) -> ControllerResult<Step> {
        let phase = Phase::RebuildSecondaryCreateReplica;

        let secondary = self.describe_secondary().await?;
        if secondary.is_replica() {
            return Ok(Step::advance(
                Phase::RebuildSecondaryWaitReplica,
                "secondary_replica_exists",
                secondary.status,
            ));
        }
        if secondary.exists {
            return Err(ControllerError::invariant(
                phase,
                format!(
                    "standalone secondary {} reappeared during rebuild ({})",
                    secondary.id, secondary.status
                ),
            ));
        }

        let writer = self
            .describe(Region::Primary, &state.primary_writer_id)
            .await?;
        if !writer.exists {
            return Err(ControllerError::invariant(
                phase,
                format!("primary writer {} does not exist; cannot rebuild secondary", writer.id),
            ));
        }
        if !writer.is_available_writer() {
            return Ok(Step::stay(
                phase,
                "wait_primary_writer",
                format!("waiting:{}", writer.status),
            ));
        }
        let Some(source_ref) = writer.stable_ref.as_deref() else {
            return Ok(Step::stay(phase, "wait_primary_reference", "waiting:no-reference"));
        };

        let request = CreateReplicaRequest::new(
            &self.config.secondary_db_id,
            source_ref,
            &self.config.region(Region::Primary).region,
            self.config.region(Region::Secondary),
        );
        let outcome = self.create_replica(Region::Secondary, &request).await?;
        let step = Step::advance(
            Phase::RebuildSecondaryWaitReplica,
            "create_secondary_replica",
            outcome.to_string(),
        );
        Ok(match outcome {
            CreateOutcome::Called => step.mutating(),
            CreateOutcome::AlreadyExists => step,
        })
    }

    async fn rebuild_wait_replica(&self) -> ControllerResult<Step> {
        let phase = Phase::RebuildSecondaryWaitReplica;
        let secondary = self.describe_secondary().await?;

        if secondary.is_available_writer() {
            return Err(ControllerError::invariant(
                phase,
                format!("secondary {} is a standalone writer, expected a replica", secondary.id),
            ));
        }

        if secondary.is_available_replica() {
            return Ok(Step::advance(Phase::Steady, "secondary_replica_ready", secondary.status));
        }
        if !secondary.exists {
            warn!(
                event = ControllerEvent::InstanceMissing.as_str(),
                phase = phase.as_str(),
                id = %secondary.id,
                "secondary replica does not exist; waiting"
            );
        }

        Ok(Step::stay(
            phase,
            "wait_secondary_replica",
            format!("waiting:{}", secondary.status),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{DnsConfig, RegionConfig};
    use crate::dns::MemoryDns;
    use crate::topology::{ControlPlaneCall, InstanceRecord, MemoryControlPlane};

    const RECORD: &str = "db.internal.example.";

    fn config() -> ControllerConfig {
        ControllerConfig {
            primary: RegionConfig {
                region: "us-east-1".into(),
                kms_key: "kms-east".into(),
                subnet_group: "subnets-east".into(),
                security_group_id: "sg-east".into(),
                instance_class: "db.r6g.large".into(),
                multi_az: true,
            },
            secondary: RegionConfig {
                region: "us-west-2".into(),
                kms_key: "kms-west".into(),
                subnet_group: "subnets-west".into(),
                security_group_id: "sg-west".into(),
                instance_class: "db.r6g.large".into(),
                multi_az: false,
            },
            primary_db_id: "orders-primary".into(),
            secondary_db_id: "orders-secondary".into(),
            failback_db_id: "orders-failback".into(),
            dns: DnsConfig {
                zone_id: "Z1".into(),
                record_name: "db.internal.example".into(),
                ttl: 30,
            },
            health_check_id: "hc-1".into(),
            state_param_name: "/dr/state".into(),
            failback_healthy_streak: 2,
            rebuild_final_snapshot: true,
        }
    }

    struct Fixture {
        config: ControllerConfig,
        topology: Topology,
        primary: MemoryControlPlane,
        secondary: MemoryControlPlane,
        dns: MemoryDns,
    }

    impl Fixture {
        fn new() -> Self {
            let primary = MemoryControlPlane::new();
            let secondary = MemoryControlPlane::new();
            Self {
                config: config(),
                topology: Topology::new(Arc::new(primary.clone()), Arc::new(secondary.clone())),
                primary,
                secondary,
                dns: MemoryDns::new(),
            }
        }

        async fn step(&self, state: &mut ControllerState) -> ControllerResult<StepReport> {
            PhaseEngine::new(&self.config, &self.topology, &self.dns)
                .step(state)
                .await
        }
    }

    fn state_in(phase: Phase, active: Region) -> ControllerState {
        let mut state = ControllerState::initial("orders-primary");
        state.phase = phase;
        state.active = active;
        state
    }

    #[test]
    fn test_failback_target_alternates() {
        let config = config();
        let mut state = ControllerState::initial("orders-primary");
        assert_eq!(failback_target_id(&config, &state), "orders-failback");

        state.primary_writer_id = "orders-failback".into();
        assert_eq!(failback_target_id(&config, &state), "orders-primary");
    }

    #[test]
    fn test_final_snapshot_name() {
        let id = final_snapshot_id("orders-secondary");
        let suffix = id.strip_prefix("orders-secondary-final-").unwrap();
        assert_eq!(suffix.len(), 14);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    // =========================================================================
    // FAILOVER
    // =========================================================================

    #[tokio::test]
    async fn test_promote_issued_once_while_converging() {
        let fx = Fixture::new();
        fx.secondary
            .put_instance(InstanceRecord::replica("orders-secondary", "arn:db:orders-primary", "sec.example"));
        let mut state = state_in(Phase::FailoverPromoteSecondary, Region::Primary);

        let report = fx.step(&mut state).await.unwrap();
        assert_eq!(report.to, Phase::FailoverPromoteSecondary);
        assert!(report.mutated);
        assert_eq!(state.last_action_name(), Some("promote_secondary"));

        // Still modifying: no second promote.
        let report = fx.step(&mut state).await.unwrap();
        assert!(!report.mutated);
        assert_eq!(report.to, Phase::FailoverPromoteSecondary);
        assert_eq!(fx.secondary.mutating_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_promoted_secondary_advances_to_dns() {
        let fx = Fixture::new();
        fx.secondary
            .put_instance(InstanceRecord::writer("orders-secondary", "sec.example"));
        let mut state = state_in(Phase::FailoverPromoteSecondary, Region::Primary);

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::FailoverUpdateDns);
        assert!(fx.secondary.mutating_calls().is_empty());
        assert!(fx.dns.changes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_secondary_is_fatal() {
        let fx = Fixture::new();
        let mut state = state_in(Phase::FailoverPromoteSecondary, Region::Primary);
        let before = state.clone();

        let err = fx.step(&mut state).await.unwrap_err();

        assert!(matches!(err, ControllerError::InvariantViolation { .. }));
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_failover_dns_waits_for_address() {
        let fx = Fixture::new();
        fx.secondary.put_instance(
            InstanceRecord::writer("orders-secondary", "sec.example").without_address(),
        );
        let mut state = state_in(Phase::FailoverUpdateDns, Region::Primary);

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::FailoverUpdateDns);
        assert_eq!(state.active, Region::Primary);
        assert!(fx.dns.changes().is_empty());
    }

    #[tokio::test]
    async fn test_failover_dns_completes_failover() {
        let fx = Fixture::new();
        fx.secondary
            .put_instance(InstanceRecord::writer("orders-secondary", "sec.example"));
        let mut state = state_in(Phase::FailoverUpdateDns, Region::Primary);
        state.transition_started_at = Some(Utc::now());

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::Steady);
        assert_eq!(state.active, Region::Secondary);
        assert!(state.transition_started_at.is_none());
        assert_eq!(fx.dns.record(RECORD), Some("sec.example.".to_string()));
    }

    // =========================================================================
    // FAILBACK
    // =========================================================================

    #[tokio::test]
    async fn test_failback_creates_replica_from_secondary() {
        let fx = Fixture::new();
        fx.secondary
            .put_instance(InstanceRecord::writer("orders-secondary", "sec.example"));
        let mut state = state_in(Phase::FailbackCreateReplicaPrimary, Region::Secondary);

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::FailbackPromotePrimary);
        let calls = fx.primary.mutating_calls();
        assert_eq!(calls.len(), 1);
        let ControlPlaneCall::CreateReplica(request) = &calls[0] else {
            panic!("expected create, got {:?}", calls[0]);
        };
        assert_eq!(request.target_id, "orders-failback");
        assert_eq!(request.source_ref, "arn:db:orders-secondary");
        assert_eq!(request.source_region, "us-west-2");
        assert_eq!(request.kms_key, "kms-east");
        assert!(request.multi_az);
    }

    #[tokio::test]
    async fn test_failback_existing_replica_skips_create() {
        let fx = Fixture::new();
        fx.primary.put_instance(
            InstanceRecord::replica("orders-failback", "arn:db:orders-secondary", "fb.example")
                .with_status("creating"),
        );
        let mut state = state_in(Phase::FailbackCreateReplicaPrimary, Region::Secondary);

        for _ in 0..2 {
            state.phase = Phase::FailbackCreateReplicaPrimary;
            let report = fx.step(&mut state).await.unwrap();
            assert_eq!(report.to, Phase::FailbackPromotePrimary);
            assert_eq!(report.action.as_deref(), Some("failback_replica_exists"));
        }

        assert!(fx.primary.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failback_stale_writer_is_fatal() {
        let fx = Fixture::new();
        fx.primary
            .put_instance(InstanceRecord::writer("orders-failback", "fb.example"));
        let mut state = state_in(Phase::FailbackCreateReplicaPrimary, Region::Secondary);

        let err = fx.step(&mut state).await.unwrap_err();
        assert!(err.requires_operator());
        assert!(err.to_string().contains("delete it from us-east-1"));
        assert!(fx.primary.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_failback_instance_waits() {
        let fx = Fixture::new();
        let mut state = state_in(Phase::FailbackPromotePrimary, Region::Secondary);

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::FailbackPromotePrimary);
        assert_eq!(report.result, "waiting:missing");
        assert!(fx.primary.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failback_dns_hands_authority_to_primary() {
        let fx = Fixture::new();
        fx.primary
            .put_instance(InstanceRecord::writer("orders-failback", "fb.example"));
        let mut state = state_in(Phase::FailbackUpdateDns, Region::Secondary);

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::RebuildSecondaryDeleteOld);
        assert_eq!(state.active, Region::Primary);
        assert_eq!(state.primary_writer_id, "orders-failback");
        assert_eq!(fx.dns.record(RECORD), Some("fb.example.".to_string()));
    }

    // =========================================================================
    // SECONDARY REBUILD
    // =========================================================================

    #[tokio::test]
    async fn test_delete_old_secondary_with_final_snapshot() {
        let fx = Fixture::new();
        fx.secondary
            .put_instance(InstanceRecord::writer("orders-secondary", "sec.example"));
        let mut state = state_in(Phase::RebuildSecondaryDeleteOld, Region::Primary);

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::RebuildSecondaryWaitDelete);
        let calls = fx.secondary.mutating_calls();
        let ControlPlaneCall::Delete(request) = &calls[0] else {
            panic!("expected delete, got {:?}", calls[0]);
        };
        assert!(request
            .final_snapshot_id
            .as_deref()
            .unwrap()
            .starts_with("orders-secondary-final-"));
        assert!(request.delete_automated_backups);
    }

    #[tokio::test]
    async fn test_delete_without_final_snapshot() {
        let mut fx = Fixture::new();
        fx.config.rebuild_final_snapshot = false;
        fx.secondary
            .put_instance(InstanceRecord::writer("orders-secondary", "sec.example"));
        let mut state = state_in(Phase::RebuildSecondaryDeleteOld, Region::Primary);

        let report = fx.step(&mut state).await.unwrap();
        assert_eq!(report.result, "delete-called:no-snapshot");
    }

    #[tokio::test]
    async fn test_deleting_secondary_is_not_deleted_again() {
        let fx = Fixture::new();
        fx.secondary.put_instance(
            InstanceRecord::writer("orders-secondary", "sec.example").with_status("deleting"),
        );
        let mut state = state_in(Phase::RebuildSecondaryDeleteOld, Region::Primary);

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::RebuildSecondaryWaitDelete);
        assert!(fx.secondary.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_replica_ends_rebuild() {
        let fx = Fixture::new();
        fx.secondary.put_instance(InstanceRecord::replica(
            "orders-secondary",
            "arn:db:orders-failback",
            "sec.example",
        ));
        let mut state = state_in(Phase::RebuildSecondaryDeleteOld, Region::Primary);

        let report = fx.step(&mut state).await.unwrap();
        assert_eq!(report.to, Phase::Steady);
    }

    #[tokio::test]
    async fn test_wait_delete_stays_until_gone() {
        let fx = Fixture::new();
        fx.secondary.put_instance(
            InstanceRecord::writer("orders-secondary", "sec.example").with_status("deleting"),
        );
        let mut state = state_in(Phase::RebuildSecondaryWaitDelete, Region::Primary);

        assert_eq!(
            fx.step(&mut state).await.unwrap().to,
            Phase::RebuildSecondaryWaitDelete
        );

        fx.secondary.converge_deletion("orders-secondary");
        assert_eq!(
            fx.step(&mut state).await.unwrap().to,
            Phase::RebuildSecondaryCreateReplica
        );
    }

    #[tokio::test]
    async fn test_rebuild_creates_replica_of_current_writer() {
        let fx = Fixture::new();
        fx.primary
            .put_instance(InstanceRecord::writer("orders-failback", "fb.example"));
        let mut state = state_in(Phase::RebuildSecondaryCreateReplica, Region::Primary);
        state.primary_writer_id = "orders-failback".into();

        let report = fx.step(&mut state).await.unwrap();

        assert_eq!(report.to, Phase::RebuildSecondaryWaitReplica);
        let calls = fx.secondary.mutating_calls();
        let ControlPlaneCall::CreateReplica(request) = &calls[0] else {
            panic!("expected create, got {:?}", calls[0]);
        };
        assert_eq!(request.target_id, "orders-secondary");
        assert_eq!(request.source_ref, "arn:db:orders-failback");
        assert_eq!(request.source_region, "us-east-1");
        assert!(!request.multi_az);
    }

    #[tokio::test]
    async fn test_rebuild_without_primary_writer_is_fatal() {
        let fx = Fixture::new();
        let mut state = state_in(Phase::RebuildSecondaryCreateReplica, Region::Primary);

        let err = fx.step(&mut state).await.unwrap_err();
        assert!(matches!(err, ControllerError::InvariantViolation { .. }));
    }

    #[tokio::test]
    async fn test_missing_rebuilt_replica_waits() {
        let fx = Fixture::new();
        let mut state = state_in(Phase::RebuildSecondaryWaitReplica, Region::Primary);

        for _ in 0..2 {
            let report = fx.step(&mut state).await.unwrap();
            assert_eq!(report.to, Phase::RebuildSecondaryWaitReplica);
            assert_eq!(report.result, "waiting:missing");
        }
        assert!(fx.secondary.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_collaborator_error_leaves_state_untouched() {
        let fx = Fixture::new();
        fx.secondary
            .fail_next(crate::service::ServiceError::other("Throttling", "slow down"));
        let mut state = state_in(Phase::RebuildSecondaryWaitReplica, Region::Primary);
        let before = state.clone();

        let err = fx.step(&mut state).await.unwrap_err();

        assert!(matches!(err, ControllerError::Service { .. }));
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_steady_is_idle() {
        let fx = Fixture::new();
        let mut state = ControllerState::initial("orders-primary");

        let report = fx.step(&mut state).await.unwrap();

        assert!(report.action.is_none());
        assert!(state.last_action.is_none());
        assert!(fx.primary.calls().is_empty());
        assert!(fx.secondary.calls().is_empty());
    }
}
