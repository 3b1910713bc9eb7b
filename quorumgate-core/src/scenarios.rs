//! Scripted fault demonstrations: inject, run one round, clear, report.

use crate::gateway::{Gateway, QueryOutcome};
use quorumgate_consensus::Request;
use quorumgate_security::Decision;
use quorumgate_workers::{FaultConfig, FaultType};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub injected_faults: Vec<String>,
    pub outcome: QueryOutcome,
}

fn ping_request(target: &str) -> Request {
    let mut r = Request::new();
    r.insert("operation".into(), serde_json::json!("PING"));
    r.insert("target".into(), serde_json::json!(target));
    r.insert("description".into(), serde_json::json!("scenario probe"));
    r
}

fn delete_request(target: &str) -> Request {
    let mut r = Request::new();
    r.insert("operation".into(), serde_json::json!("DELETE"));
    r.insert("target".into(), serde_json::json!(target));
    r.insert("description".into(), serde_json::json!("scenario destructive action"));
    r
}

async fn run_and_clear(
    gateway: &Gateway,
    name: &str,
    injections: Vec<(String, FaultConfig)>,
    request: Request,
    strict_mode: bool,
) -> ScenarioReport {
    for (worker_id, config) in &injections {
        if let Err(e) = gateway.fault_injector().inject(worker_id, config.clone()).await {
            tracing::warn!(%e, worker_id, "scenario failed to inject fault");
        }
    }

    let outcome = gateway.submit_query(request, strict_mode).await;

    let cleared = gateway.fault_injector().clear(None).await.unwrap_or_default();

    ScenarioReport {
        scenario: name.to_string(),
        injected_faults: cleared,
        outcome,
    }
}

pub async fn compromised_agent(gateway: &Gateway) -> ScenarioReport {
    let worker_id = "worker_2".to_string();
    let config = FaultConfig {
        fault_type: FaultType::Byzantine,
        malicious_decision: Some(Decision::Approve),
        delay_seconds: None,
        collusion_group: None,
    };
    run_and_clear(
        gateway,
        "compromised_agent",
        vec![(worker_id, config)],
        delete_request("production_db"),
        false,
    )
    .await
}

pub async fn crash_recovery(gateway: &Gateway) -> ScenarioReport {
    let worker_id = "worker_3".to_string();
    let config = FaultConfig {
        fault_type: FaultType::Crash,
        malicious_decision: None,
        delay_seconds: None,
        collusion_group: None,
    };
    run_and_clear(
        gateway,
        "crash_recovery",
        vec![(worker_id, config)],
        ping_request("internal_service"),
        false,
    )
    .await
}

/// Colludes `k` workers (k > f) on an APPROVE verdict against a dangerous
/// request, to demonstrate the limit: collusion beyond f does overturn the
/// honest majority, which is the system correctly reflecting that more than
/// f simultaneous faults breaks the BFT guarantee.
pub async fn collusion_attempt(gateway: &Gateway, colluders: usize) -> ScenarioReport {
    let group = "collusion_demo".to_string();
    let mut injections = Vec::new();
    for i in 1..=colluders {
        let worker_id = format!("worker_{i}");
        injections.push((
            worker_id,
            FaultConfig {
                fault_type: FaultType::Collusion,
                malicious_decision: Some(Decision::Approve),
                delay_seconds: None,
                collusion_group: Some(group.clone()),
            },
        ));
    }
    run_and_clear(
        gateway,
        "collusion_attempt",
        injections,
        delete_request("production_db"),
        false,
    )
    .await
}

/// Crashes the current primary and submits through it once to show the
/// round still completing (the remaining honest majority covers for it at
/// `N=3f+1`, since `N-1` is still a quorum). The view advances unconditionally
/// because the fault targeted the primary itself, not because the round
/// failed — a crashed primary is demoted regardless of whether the honest
/// backups covered for it this round, so the next call targets the next
/// primary in rotation.
pub async fn primary_failure(gateway: &Gateway) -> ScenarioReport {
    let view = gateway.current_view();
    let n = gateway.n();
    let primary_idx = (view as usize) % n;
    let worker_id = format!("worker_{}", primary_idx + 1);
    let config = FaultConfig {
        fault_type: FaultType::Crash,
        malicious_decision: None,
        delay_seconds: None,
        collusion_group: None,
    };
    let report = run_and_clear(
        gateway,
        "primary_failure",
        vec![(worker_id, config)],
        ping_request("internal_service"),
        false,
    )
    .await;
    gateway.advance_view();
    report
}

pub async fn f2_failure(gateway: &Gateway) -> ScenarioReport {
    let config = FaultConfig {
        fault_type: FaultType::Crash,
        malicious_decision: None,
        delay_seconds: None,
        collusion_group: None,
    };
    run_and_clear(
        gateway,
        "f2_failure",
        vec![
            ("worker_1".to_string(), config.clone()),
            ("worker_2".to_string(), config),
        ],
        ping_request("internal_service"),
        false,
    )
    .await
}
