//! The orchestrator: wires intent classification, guardrails, policy,
//! consensus, the sentry drift check, trust scoring, and the audit log into
//! a single `submit_query` entry point.
//!
//! This collapses what would otherwise be several pieces of global mutable
//! state (registry, trust store, policy rules, the fault injector) into one
//! value the transport layer owns and calls through — concurrent reads from
//! HTTP handlers share this `Arc` and need no additional locking beyond what
//! each subsystem already provides.

use crate::config::GatewayConfig;
use crate::sentry::validate_consensus_alignment;
use quorumgate_audit::{AuditRecord, Auditor, Registry};
use quorumgate_consensus::{
    no_op_hook, request_field, Certificate, ConsensusConfig, ConsensusEngine, ConsensusRound, ErrorKind, EventHook,
    Intent, Request, RiskLevel, RoundResult, Worker, WorkerId,
};
use quorumgate_policy::{authorize_agents, apply_pre_execution_guardrails, classify_risk, PolicyEngine};
use quorumgate_security::{Decision, Verdict};
use quorumgate_trust::TrustEngine;
use quorumgate_workers::{FaultInjector, SimulatedWorker};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    ConsensusReached,
    NoConsensus,
    Blocked,
}

/// Per-round detail mirrored onto the response so a caller can see exactly
/// what each worker returned without re-deriving it from the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusSummary {
    pub decision: Option<Decision>,
    pub worker_decisions: HashMap<WorkerId, Decision>,
    pub worker_errors: HashMap<WorkerId, ErrorKind>,
    pub seq: u64,
    pub worker_details: HashMap<WorkerId, Verdict>,
}

impl ConsensusSummary {
    fn empty() -> Self {
        Self {
            decision: None,
            worker_decisions: HashMap::new(),
            worker_errors: HashMap::new(),
            seq: 0,
            worker_details: HashMap::new(),
        }
    }

    fn from_round(round: &ConsensusRound) -> Self {
        Self {
            decision: round.consensus_decision,
            worker_decisions: round.worker_verdicts.iter().map(|(id, v)| (id.clone(), v.decision)).collect(),
            worker_errors: round.worker_errors.clone(),
            seq: round.seq,
            worker_details: round.worker_verdicts.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub status: QueryStatus,
    pub intent: Intent,
    pub guardrail_bypassed: bool,
    pub policy_id: String,
    pub decision: Option<Decision>,
    pub certificate: Option<Certificate>,
    pub sentry_valid: Option<bool>,
    pub reason: Option<String>,
    pub consensus: ConsensusSummary,
    pub active_faults: HashMap<WorkerId, String>,
}

pub struct Gateway {
    config: GatewayConfig,
    engine: ConsensusEngine,
    registry: Registry,
    policy_engine: PolicyEngine,
    trust_engine: TrustEngine,
    auditor: Auditor,
    fault_injector: FaultInjector,
    _db: sled::Db,
}

impl Gateway {
    pub async fn new(config: GatewayConfig, on_event: EventHook) -> anyhow::Result<Self> {
        let worker_ids: Vec<String> = (1..=config.n_workers).map(|i| format!("worker_{i}")).collect();
        let workers: Vec<Arc<dyn Worker>> = worker_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                Arc::new(SimulatedWorker::new(
                    quorumgate_consensus::WorkerIdentity::generate(id.clone()),
                    i as u64,
                )) as Arc<dyn Worker>
            })
            .collect();

        let registry = Registry::new();
        for (worker, id) in workers.iter().zip(worker_ids.iter()) {
            registry.register(id.clone(), "simulated");
            let _ = worker;
        }

        let engine = ConsensusEngine::new(
            ConsensusConfig { f: config.f_faults, timeout: config.timeout() },
            workers,
            on_event,
        );
        let fault_injector = FaultInjector::new(engine.workers_handle());

        let policy_engine = PolicyEngine::load(config.data_dir.join("policies.yaml")).await?;
        let trust_engine = TrustEngine::load(config.data_dir.join("trust_scores.json"), &worker_ids).await?;

        tokio::fs::create_dir_all(&config.data_dir).await.ok();
        let db = sled::open(config.data_dir.join("audit"))?;
        let auditor = Auditor::open(&db, "audit")?;

        Ok(Self {
            config,
            engine,
            registry,
            policy_engine,
            trust_engine,
            auditor,
            fault_injector,
            _db: db,
        })
    }

    pub fn new_with_no_op_events(config: GatewayConfig) -> impl std::future::Future<Output = anyhow::Result<Self>> {
        Self::new(config, no_op_hook())
    }

    pub fn mode(&self) -> crate::config::Mode {
        self.config.mode
    }

    pub fn current_view(&self) -> u64 {
        self.engine.current_view()
    }

    pub fn advance_view(&self) -> u64 {
        self.engine.advance_view()
    }

    pub fn quorum_size(&self) -> usize {
        self.engine.config().quorum_size()
    }

    pub fn f(&self) -> usize {
        self.engine.config().f
    }

    pub fn n(&self) -> usize {
        self.engine.config().n()
    }

    pub fn fault_injector(&self) -> &FaultInjector {
        &self.fault_injector
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn trust_engine(&self) -> &TrustEngine {
        &self.trust_engine
    }

    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }

    pub fn policy_engine(&self) -> &PolicyEngine {
        &self.policy_engine
    }

    pub async fn submit_query(&self, request: Request, strict_mode: bool) -> QueryOutcome {
        let action_type = request_field(&request, "operation").unwrap_or("UNKNOWN").to_string();
        let target = request_field(&request, "target").unwrap_or("").to_string();
        let description = request_field(&request, "description").unwrap_or("").to_string();

        let risk = classify_risk(&action_type, &target);
        let mut intent = Intent::new(&action_type, &target, &description, risk);
        let active_faults = self.fault_injector.active_faults().await;

        let (allowed, bypassed) = apply_pre_execution_guardrails(risk, &target, strict_mode);
        if !allowed {
            info!(action_type, target, "guardrail blocked request before consensus");
            self.log(&intent, false, None, false);
            return QueryOutcome {
                status: QueryStatus::Blocked,
                intent,
                guardrail_bypassed: false,
                policy_id: "guardrail".to_string(),
                decision: None,
                certificate: None,
                sentry_valid: None,
                reason: Some("critical risk against a production target in strict mode".to_string()),
                consensus: ConsensusSummary::empty(),
                active_faults,
            };
        }
        if bypassed {
            intent.upgrade_risk(RiskLevel::Critical);
        }

        let policy = self.policy_engine.evaluate(&intent, self.quorum_size()).await;

        let active_workers = self.registry.active_worker_ids();
        if let Err(e) = authorize_agents(&active_workers, policy.required_quorum) {
            warn!(%e, "gatekeeper refused to authorize enough agents");
            self.log(&intent, false, None, false);
            return QueryOutcome {
                status: QueryStatus::Blocked,
                intent,
                guardrail_bypassed: bypassed,
                policy_id: policy.policy_id,
                decision: None,
                certificate: None,
                sentry_valid: None,
                reason: Some(e.to_string()),
                consensus: ConsensusSummary::empty(),
                active_faults,
            };
        }

        let started = std::time::Instant::now();
        let outcome = self.engine.submit_request(&intent, request).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let all_worker_ids: Vec<String> = active_workers;
        let missing: Vec<String> = all_worker_ids
            .iter()
            .filter(|id| !outcome.round.worker_verdicts.contains_key(*id))
            .cloned()
            .collect();

        let _ = self
            .trust_engine
            .evaluate_round(outcome.round.consensus_decision, &outcome.round.worker_verdicts, &missing, latency_ms)
            .await;

        for worker_id in outcome.round.worker_verdicts.keys() {
            self.registry.record_success(worker_id);
        }
        for worker_id in &missing {
            self.registry.record_failure(worker_id);
        }

        let consensus = ConsensusSummary::from_round(&outcome.round);

        match outcome.result {
            RoundResult::ConsensusReached => {
                let certificate = outcome.certificate.expect("certificate present on success");
                let canonical_result = outcome
                    .round
                    .worker_verdicts
                    .values()
                    .find(|v| v.decision == certificate.decision)
                    .cloned()
                    .expect("at least one verdict matches the certified decision");
                let sentry_valid = validate_consensus_alignment(&intent, &canonical_result, Some(&intent.target));
                self.log(&intent, true, Some(&certificate), sentry_valid);
                QueryOutcome {
                    status: QueryStatus::ConsensusReached,
                    intent,
                    guardrail_bypassed: bypassed,
                    policy_id: policy.policy_id,
                    decision: Some(certificate.decision),
                    certificate: Some(certificate),
                    sentry_valid: Some(sentry_valid),
                    reason: None,
                    consensus,
                    active_faults,
                }
            }
            RoundResult::NoQuorum => {
                self.log(&intent, false, None, false);
                QueryOutcome {
                    status: QueryStatus::NoConsensus,
                    intent,
                    guardrail_bypassed: bypassed,
                    policy_id: policy.policy_id,
                    decision: None,
                    certificate: None,
                    sentry_valid: None,
                    reason: Some("insufficient agreeing verdicts for quorum".to_string()),
                    consensus,
                    active_faults,
                }
            }
            RoundResult::DriftDetected => {
                self.log(&intent, false, None, false);
                QueryOutcome {
                    status: QueryStatus::NoConsensus,
                    intent,
                    guardrail_bypassed: bypassed,
                    policy_id: policy.policy_id,
                    decision: None,
                    certificate: None,
                    sentry_valid: Some(false),
                    reason: Some("equivocated commits at the same (view, seq)".to_string()),
                    consensus,
                    active_faults,
                }
            }
        }
    }

    fn log(&self, intent: &Intent, consensus_reached: bool, certificate: Option<&Certificate>, sentry_validation: bool) {
        let record = AuditRecord {
            id: 0,
            intent_id: intent.intent_id.clone(),
            timestamp: chrono::Utc::now(),
            risk_level: format!("{:?}", intent.risk_level).to_uppercase(),
            action_type: intent.action_type.clone(),
            target: intent.target.clone(),
            consensus_reached,
            consensus_cert_json: certificate.and_then(|c| serde_json::to_string(c).ok()),
            sentry_validation,
        };
        if let Err(e) = self.auditor.log_execution(record) {
            warn!(%e, "failed to write audit record");
        }
    }
}
