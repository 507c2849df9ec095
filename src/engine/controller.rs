//! Controller
//!
//! One tick: load state → evaluate health → pick the desired region →
//! enter a transition (from steady only) → run one phase step → persist.
//!
//! The persisted write is the only commit point. Any error before it
//! leaves the previous document in place.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use super::errors::{ControllerError, ControllerResult};
use super::transition::PhaseEngine;
use crate::config::ControllerConfig;
use crate::dns::{DnsControlPlane, DnsPublisher};
use crate::health::{evaluate, AntiFlappingGuard, HealthSource};
use crate::observability::ControllerEvent;
use crate::state::{ControllerState, HealthSnapshot, Phase};
use crate::store::{ParameterStore, StateStore};
use crate::topology::{DatabaseControlPlane, Region, Topology};

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub ok: bool,
    pub tick_id: Uuid,
    pub desired: Region,
    pub active: Region,
    pub phase: Phase,
    /// `None` when the health source could not be queried
    pub hc_ok: Option<bool>,
    /// Action recorded this tick, if any
    pub action: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// External systems the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub primary_db: Arc<dyn DatabaseControlPlane>,
    pub secondary_db: Arc<dyn DatabaseControlPlane>,
    pub dns: Arc<dyn DnsControlPlane>,
    pub health: Arc<dyn HealthSource>,
    pub store: Arc<dyn ParameterStore>,
}

/// Where the health signal left this tick.
struct HealthOutcome {
    desired: Region,
    hc_ok: Option<bool>,
}

/// Two-region failover controller.
pub struct Controller {
    config: Arc<ControllerConfig>,
    topology: Topology,
    dns: Arc<dyn DnsControlPlane>,
    health: Arc<dyn HealthSource>,
    store: Arc<dyn ParameterStore>,
    guard: AntiFlappingGuard,
}

impl Controller {
    /// Build a controller from a validated configuration.
    pub fn new(config: ControllerConfig, collaborators: Collaborators) -> ControllerResult<Self> {
        config.validate()?;

        Ok(Self {
            guard: AntiFlappingGuard::new(config.failback_healthy_streak),
            config: Arc::new(config),
            topology: Topology::new(collaborators.primary_db, collaborators.secondary_db),
            dns: collaborators.dns,
            health: collaborators.health,
            store: collaborators.store,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Load the persisted state without ticking.
    pub async fn current_state(&self) -> ControllerResult<ControllerState> {
        let store = StateStore::new(self.store.as_ref(), &self.config);
        Ok(store.load().await?.state)
    }

    /// Run one tick.
    pub async fn tick(&self) -> ControllerResult<TickSummary> {
        let tick_id = Uuid::new_v4();
        let span = tracing::info_span!("tick", %tick_id);

        async move {
            info!(event = ControllerEvent::TickStarted.as_str(), "tick started");

            match self.run_tick(tick_id).await {
                Ok(summary) => {
                    info!(
                        event = ControllerEvent::TickCompleted.as_str(),
                        active = %summary.active,
                        desired = %summary.desired,
                        phase = %summary.phase,
                        hc_ok = ?summary.hc_ok,
                        action = ?summary.action,
                        "tick completed"
                    );
                    Ok(summary)
                }
                Err(e) => {
                    error!(
                        event = ControllerEvent::TickAborted.as_str(),
                        error = %e,
                        requires_operator = e.requires_operator(),
                        "tick aborted; state not written"
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_tick(&self, tick_id: Uuid) -> ControllerResult<TickSummary> {
        let store = StateStore::new(self.store.as_ref(), &self.config);
        let mut state = store.load().await?.state;

        let health = self.observe_health(&mut state).await;

        if state.phase.is_steady() && health.desired != state.active {
            let entry = match state.active {
                Region::Primary => Phase::FailoverPromoteSecondary,
                Region::Secondary => Phase::FailbackCreateReplicaPrimary,
            };
            info!(
                event = ControllerEvent::TransitionStarted.as_str(),
                active = %state.active,
                desired = %health.desired,
                phase = %entry,
                "transition started"
            );
            state.phase = entry;
            state.transition_started_at = Some(Utc::now());
        }

        let mut action = None;
        if health.hc_ok.is_none() && state.phase.is_steady() {
            action = self.refresh_dns(&mut state).await;
        }

        let engine = PhaseEngine::new(&self.config, &self.topology, self.dns.as_ref());
        let report = engine.step(&mut state).await?;
        if report.action.is_some() {
            action = report.action;
        }

        let now = Utc::now();
        state.updated_at = Some(now);
        store.save(&state).await?;
        info!(
            event = ControllerEvent::StatePersisted.as_str(),
            phase = %state.phase,
            active = %state.active,
            "state persisted"
        );

        Ok(TickSummary {
            ok: true,
            tick_id,
            desired: health.desired,
            active: state.active,
            phase: state.phase,
            hc_ok: health.hc_ok,
            action,
            updated_at: now,
        })
    }

    /// Fold the health signal into `state`. A source failure yields no
    /// verdict: the streak is kept and the active region stays desired.
    async fn observe_health(&self, state: &mut ControllerState) -> HealthOutcome {
        let checked_at = Utc::now();

        let observations = match self.health.observations(&self.config.health_check_id).await {
            Ok(observations) => observations,
            Err(e) => {
                warn!(
                    event = ControllerEvent::HealthUnavailable.as_str(),
                    error = %e,
                    streak = state.failback_healthy_streak,
                    "health source unavailable; no verdict this tick"
                );
                state.hc = Some(HealthSnapshot {
                    primary_hc_healthy: None,
                    detail: None,
                    checked_at,
                    error: Some(e.to_string()),
                });
                return HealthOutcome {
                    desired: state.active,
                    hc_ok: None,
                };
            }
        };

        let verdict = evaluate(&observations);
        let decision =
            self.guard
                .observe(verdict.ok, state.failback_healthy_streak, state.active);

        info!(
            event = ControllerEvent::HealthEvaluated.as_str(),
            ok = verdict.ok,
            decision = %verdict.detail.decision,
            healthy = verdict.detail.healthy,
            observations = verdict.detail.observations,
            streak = decision.streak,
            "health evaluated"
        );
        if decision.suppressed {
            info!(
                event = ControllerEvent::FailbackSuppressed.as_str(),
                streak = decision.streak,
                threshold = self.guard.threshold(),
                "failback held until the primary stays healthy"
            );
        }

        state.failback_healthy_streak = decision.streak;
        state.hc = Some(HealthSnapshot {
            primary_hc_healthy: Some(verdict.ok),
            detail: Some(verdict.detail),
            checked_at,
            error: None,
        });

        HealthOutcome {
            desired: decision.desired,
            hc_ok: Some(verdict.ok),
        }
    }

    /// Re-point DNS at the active writer. Failures are logged and ignored.
    async fn refresh_dns(&self, state: &mut ControllerState) -> Option<String> {
        let (region, id) = match state.active {
            Region::Primary => (Region::Primary, state.primary_writer_id.clone()),
            Region::Secondary => (Region::Secondary, self.config.secondary_db_id.clone()),
        };

        let result = match self.topology.describe(region, &id).await {
            Ok(writer) if writer.is_available_writer() => match writer.address.as_deref() {
                Some(address) => {
                    let publisher = DnsPublisher::new(&self.config.dns, self.dns.as_ref());
                    match publisher.publish(address).await {
                        Ok(change) => {
                            info!(
                                event = ControllerEvent::DnsRefreshed.as_str(),
                                target = %change.value,
                                "dns refreshed to active writer"
                            );
                            format!("refreshed:{}", change.value)
                        }
                        Err(e) => {
                            warn!(
                                event = ControllerEvent::DnsRefreshFailed.as_str(),
                                error = %e,
                                "dns refresh failed"
                            );
                            format!("failed:{}", e.code)
                        }
                    }
                }
                None => "skipped:no-address".to_string(),
            },
            Ok(writer) => {
                warn!(
                    event = ControllerEvent::DnsRefreshFailed.as_str(),
                    id = %writer.id,
                    status = %writer.status,
                    "active writer not available; dns left as is"
                );
                format!("skipped:{}", writer.status)
            }
            Err(e) => {
                warn!(
                    event = ControllerEvent::DnsRefreshFailed.as_str(),
                    error = %e,
                    "could not describe active writer; dns left as is"
                );
                format!("failed:{}", e.code)
            }
        };

        const ACTION: &str = "dns_refresh_best_effort";
        state.record_action(ACTION, result);
        Some(ACTION.to_string())
    }
}
