//! The fault-injecting decorator and the injector that swaps it into a live
//! worker list.
//!
//! A faulty worker wraps a real one and reuses its identity — the same
//! `worker_id` and signing key — so from the PBFT node's perspective nothing
//! about *who* is participating changes, only *what* they return. This is
//! what makes the fault demonstrations meaningful: a BYZANTINE worker still
//! signs with a key the verifier trusts, it just signs a lie.

use async_trait::async_trait;
use quorumgate_consensus::{Request, Worker, WorkerIdentity};
use quorumgate_security::{Decision, ReasonCode, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FaultType {
    Crash,
    Omission,
    Timing,
    Byzantine,
    Collusion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultConfig {
    pub fault_type: FaultType,
    pub malicious_decision: Option<Decision>,
    pub delay_seconds: Option<f64>,
    pub collusion_group: Option<String>,
}

pub struct FaultyWorker {
    inner: Arc<dyn Worker>,
    config: FaultConfig,
}

impl FaultyWorker {
    pub fn new(inner: Arc<dyn Worker>, config: FaultConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl Worker for FaultyWorker {
    fn identity(&self) -> &WorkerIdentity {
        self.inner.identity()
    }

    async fn decide(&self, action_id: &str, request: &Request) -> anyhow::Result<Verdict> {
        match self.config.fault_type {
            FaultType::Crash => {
                anyhow::bail!("worker {} crashed (fault injected)", self.inner.worker_id())
            }
            FaultType::Omission => {
                // Never returns; the enclosing round timeout is what ends this.
                std::future::pending::<()>().await;
                unreachable!("omission fault never resolves before its timeout")
            }
            FaultType::Timing => {
                let delay = self.config.delay_seconds.unwrap_or(0.0);
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                self.inner.decide(action_id, request).await
            }
            FaultType::Byzantine | FaultType::Collusion => Ok(Verdict {
                action_id: action_id.to_string(),
                decision: self.config.malicious_decision.unwrap_or(Decision::Approve),
                reason_code: ReasonCode::Safe,
                confidence: 0.99,
            }),
        }
    }
}

struct Injected {
    original: Arc<dyn Worker>,
    fault_type: FaultType,
}

/// Mutates the worker list between rounds. Injection and clearing take the
/// list's write lock, which blocks until any in-flight round's read-locked
/// dispatch phase completes — callers must not attempt to inject mid-round.
pub struct FaultInjector {
    workers: Arc<tokio::sync::RwLock<Vec<Arc<dyn Worker>>>>,
    originals: tokio::sync::Mutex<std::collections::HashMap<String, Injected>>,
}

impl FaultInjector {
    pub fn new(workers: Arc<tokio::sync::RwLock<Vec<Arc<dyn Worker>>>>) -> Self {
        Self {
            workers,
            originals: tokio::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub async fn inject(&self, worker_id: &str, config: FaultConfig) -> anyhow::Result<()> {
        let mut list = self.workers.write().await;
        let idx = list
            .iter()
            .position(|w| w.worker_id() == worker_id)
            .ok_or_else(|| anyhow::anyhow!("unknown worker: {worker_id}"))?;

        let mut originals = self.originals.lock().await;
        let fault_type = config.fault_type;
        let original = originals
            .entry(worker_id.to_string())
            .or_insert_with(|| Injected { original: Arc::clone(&list[idx]), fault_type })
            .original
            .clone();
        if let Some(entry) = originals.get_mut(worker_id) {
            entry.fault_type = fault_type;
        }

        list[idx] = Arc::new(FaultyWorker::new(original, config));
        Ok(())
    }

    pub async fn clear(&self, worker_id: Option<&str>) -> anyhow::Result<Vec<String>> {
        let mut list = self.workers.write().await;
        let mut originals = self.originals.lock().await;
        let mut cleared = Vec::new();

        match worker_id {
            Some(id) => {
                if let Some(injected) = originals.remove(id) {
                    if let Some(idx) = list.iter().position(|w| w.worker_id() == id) {
                        list[idx] = injected.original;
                    }
                    cleared.push(id.to_string());
                }
            }
            None => {
                for (id, injected) in originals.drain() {
                    if let Some(idx) = list.iter().position(|w| w.worker_id() == id) {
                        list[idx] = injected.original;
                    }
                    cleared.push(id);
                }
            }
        }
        Ok(cleared)
    }

    /// Worker id to the name of the fault currently active on it, matching
    /// `FaultType`'s wire casing.
    pub async fn active_faults(&self) -> std::collections::HashMap<String, String> {
        self.originals
            .lock()
            .await
            .iter()
            .map(|(id, injected)| (id.clone(), fault_type_name(injected.fault_type)))
            .collect()
    }
}

fn fault_type_name(fault_type: FaultType) -> String {
    serde_json::to_value(fault_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{fault_type:?}").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedWorker;
    use quorumgate_consensus::WorkerIdentity;

    fn sample_workers() -> Vec<Arc<dyn Worker>> {
        vec![
            Arc::new(SimulatedWorker::new(WorkerIdentity::generate("w1"), 1)),
            Arc::new(SimulatedWorker::new(WorkerIdentity::generate("w2"), 2)),
        ]
    }

    #[tokio::test]
    async fn byzantine_fault_forces_decision_but_keeps_identity() {
        let workers = Arc::new(tokio::sync::RwLock::new(sample_workers()));
        let original_key = workers.read().await[0].identity().verify_key_hex();
        let injector = FaultInjector::new(Arc::clone(&workers));

        injector
            .inject(
                "w1",
                FaultConfig {
                    fault_type: FaultType::Byzantine,
                    malicious_decision: Some(Decision::Approve),
                    delay_seconds: None,
                    collusion_group: None,
                },
            )
            .await
            .unwrap();

        let list = workers.read().await;
        let verdict = list[0].decide("a1", &Request::new()).await.unwrap();
        assert_eq!(verdict.decision, Decision::Approve);
        assert_eq!(list[0].identity().verify_key_hex(), original_key);
    }

    #[tokio::test]
    async fn clearing_restores_original_worker() {
        let workers = Arc::new(tokio::sync::RwLock::new(sample_workers()));
        let injector = FaultInjector::new(Arc::clone(&workers));
        injector
            .inject(
                "w1",
                FaultConfig {
                    fault_type: FaultType::Crash,
                    malicious_decision: None,
                    delay_seconds: None,
                    collusion_group: None,
                },
            )
            .await
            .unwrap();
        injector.clear(Some("w1")).await.unwrap();
        let list = workers.read().await;
        assert!(list[0].decide("a1", &Request::new()).await.is_ok());
    }

    #[tokio::test]
    async fn crash_fault_fails_immediately() {
        let workers = Arc::new(tokio::sync::RwLock::new(sample_workers()));
        let injector = FaultInjector::new(Arc::clone(&workers));
        injector
            .inject(
                "w2",
                FaultConfig {
                    fault_type: FaultType::Crash,
                    malicious_decision: None,
                    delay_seconds: None,
                    collusion_group: None,
                },
            )
            .await
            .unwrap();
        let list = workers.read().await;
        assert!(list[1].decide("a1", &Request::new()).await.is_err());
    }
}
