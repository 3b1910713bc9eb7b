//! A risk-weighted simulated worker.
//!
//! Stands in for the real decision workers named as an external collaborator
//! in this system's scope. Each instance carries its own seeded PRNG so a
//! scenario replayed with the same seed produces the same verdict
//! distribution — the determinism property the scenario harness and its
//! tests rely on.

use async_trait::async_trait;
use quorumgate_consensus::{request_field, Request, Worker, WorkerIdentity};
use quorumgate_security::{Decision, ReasonCode, Verdict};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

pub struct SimulatedWorker {
    identity: WorkerIdentity,
    rng: Mutex<StdRng>,
}

impl SimulatedWorker {
    pub fn new(identity: WorkerIdentity, seed: u64) -> Self {
        Self {
            identity,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Approve probability by risk signal inferred from the request target
    /// substring-matching "production" and the declared `risk` field, if
    /// present — a stand-in for a real worker's model-driven judgment.
    fn approve_probability(request: &Request) -> f64 {
        let target = request_field(request, "target").unwrap_or_default().to_lowercase();
        let declared_risk = request_field(request, "risk").unwrap_or_default().to_uppercase();
        match declared_risk.as_str() {
            "CRITICAL" => 0.05,
            "HIGH" => 0.2,
            "MEDIUM" => 0.7,
            "LOW" => 0.95,
            _ if target.contains("production") => 0.1,
            _ => 0.6,
        }
    }
}

#[async_trait]
impl Worker for SimulatedWorker {
    fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    async fn decide(&self, action_id: &str, request: &Request) -> anyhow::Result<Verdict> {
        let p_approve = Self::approve_probability(request);
        let roll: f64 = {
            let mut rng = self.rng.lock().expect("worker rng mutex poisoned");
            rng.gen()
        };
        let decision = if roll < p_approve { Decision::Approve } else { Decision::Reject };
        let confidence = 0.7 + 0.3 * (1.0 - (roll - p_approve).abs()).max(0.0).min(1.0);
        Ok(Verdict {
            action_id: action_id.to_string(),
            decision,
            reason_code: ReasonCode::Safe,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_risk(risk: &str) -> Request {
        let mut m = Request::new();
        m.insert("target".into(), serde_json::json!("some_target"));
        m.insert("risk".into(), serde_json::json!(risk));
        m
    }

    #[tokio::test]
    async fn same_seed_yields_identical_decisions() {
        let w1 = SimulatedWorker::new(WorkerIdentity::generate("w1"), 42);
        let w2 = SimulatedWorker::new(WorkerIdentity::generate("w1"), 42);
        let req = request_with_risk("LOW");
        let v1 = w1.decide("a1", &req).await.unwrap();
        let v2 = w2.decide("a1", &req).await.unwrap();
        assert_eq!(v1.decision, v2.decision);
    }

    #[tokio::test]
    async fn critical_risk_mostly_rejects() {
        let worker = SimulatedWorker::new(WorkerIdentity::generate("w1"), 7);
        let req = request_with_risk("CRITICAL");
        let mut rejects = 0;
        for i in 0..20 {
            let v = worker.decide(&format!("a{i}"), &req).await.unwrap();
            if v.decision == Decision::Reject {
                rejects += 1;
            }
        }
        assert!(rejects >= 15);
    }
}
