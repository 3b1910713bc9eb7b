//! Per-worker reputation scoring.
//!
//! One round's outcome feeds a small, bounded delta into each participating
//! worker's long-lived score. The store persists as a single JSON file,
//! following the same load-or-default-and-save convention used elsewhere in
//! this codebase for process-local state that doesn't need a database.

use chrono::{DateTime, Utc};
use quorumgate_consensus::WorkerId;
use quorumgate_security::{Decision, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

const AGREE_DELTA: f64 = 1.5;
const DISAGREE_DELTA: f64 = -10.0;
const MISSING_DELTA: f64 = -15.0;
const LATENCY_ALPHA: f64 = 0.1;
const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRecord {
    pub score: f64,
    pub total_participations: u64,
    pub agreements: u64,
    pub disagreements: u64,
    pub avg_latency_ms: Option<f64>,
}

impl Default for TrustRecord {
    fn default() -> Self {
        Self {
            score: 100.0,
            total_participations: 0,
            agreements: 0,
            disagreements: 0,
            avg_latency_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub worker_id: WorkerId,
    pub delta: f64,
    pub new_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct TrustStore {
    scores: HashMap<WorkerId, TrustRecord>,
    history: Vec<HistoryEntry>,
}

pub struct TrustEngine {
    path: PathBuf,
    store: tokio::sync::RwLock<TrustStore>,
}

impl TrustEngine {
    /// Loads trust state from `path`, seeding default records for exactly
    /// `worker_ids` (sized to the configured N, not a hardcoded cohort) when
    /// no file exists yet.
    pub async fn load(path: impl AsRef<Path>, worker_ids: &[WorkerId]) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => {
                let mut store = TrustStore::default();
                for id in worker_ids {
                    store.scores.insert(id.clone(), TrustRecord::default());
                }
                store
            }
        };
        let engine = Self {
            path,
            store: tokio::sync::RwLock::new(store),
        };
        engine.persist().await?;
        Ok(engine)
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let store = self.store.read().await;
        let text = serde_json::to_string_pretty(&*store)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }

    pub async fn record(&self, worker_id: &WorkerId) -> TrustRecord {
        self.store
            .read()
            .await
            .scores
            .get(worker_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn all_records(&self) -> HashMap<WorkerId, TrustRecord> {
        self.store.read().await.scores.clone()
    }

    /// Applies the per-worker delta for one completed round and persists.
    /// `worker_verdicts` covers only workers that actually responded;
    /// `missing_workers` lists the rest (timeout, error, or simply absent
    /// from the roster this round).
    pub async fn evaluate_round(
        &self,
        final_decision: Option<Decision>,
        worker_verdicts: &HashMap<WorkerId, Verdict>,
        missing_workers: &[WorkerId],
        latency_ms: f64,
    ) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        let now = Utc::now();

        for (worker_id, verdict) in worker_verdicts {
            let record = store.scores.entry(worker_id.clone()).or_default();
            let delta = match final_decision {
                Some(decision) if verdict.decision == decision => AGREE_DELTA,
                Some(_) => DISAGREE_DELTA,
                None => 0.0,
            };
            apply_delta(record, delta);
            if let Some(decision) = final_decision {
                if verdict.decision == decision {
                    record.agreements += 1;
                } else {
                    record.disagreements += 1;
                }
            }
            record.total_participations += 1;
            record.avg_latency_ms = Some(match record.avg_latency_ms {
                Some(prev) => LATENCY_ALPHA * latency_ms + (1.0 - LATENCY_ALPHA) * prev,
                None => latency_ms,
            });
            let new_score = record.score;
            store.history.push(HistoryEntry {
                timestamp: now,
                worker_id: worker_id.clone(),
                delta,
                new_score,
            });
        }

        for worker_id in missing_workers {
            let record = store.scores.entry(worker_id.clone()).or_default();
            apply_delta(record, MISSING_DELTA);
            record.total_participations += 1;
            let new_score = record.score;
            store.history.push(HistoryEntry {
                timestamp: now,
                worker_id: worker_id.clone(),
                delta: MISSING_DELTA,
                new_score,
            });
        }

        let history_len = store.history.len();
        if history_len > MAX_HISTORY {
            store.history.drain(0..history_len - MAX_HISTORY);
        }
        drop(store);
        self.persist().await?;
        info!("trust scores updated for round");
        Ok(())
    }
}

fn apply_delta(record: &mut TrustRecord, delta: f64) {
    record.score = (record.score + delta).clamp(0.0, 100.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumgate_security::ReasonCode;

    fn verdict(decision: Decision) -> Verdict {
        Verdict {
            action_id: "a1".into(),
            decision,
            reason_code: ReasonCode::Safe,
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn default_cohort_sized_to_n() {
        let dir = tempfile::tempdir().unwrap();
        let ids: Vec<WorkerId> = (1..=7).map(|i| format!("worker_{i}")).collect();
        let engine = TrustEngine::load(dir.path().join("trust.json"), &ids).await.unwrap();
        assert_eq!(engine.all_records().await.len(), 7);
    }

    #[tokio::test]
    async fn score_clamps_to_zero_and_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TrustEngine::load(dir.path().join("trust.json"), &[]).await.unwrap();
        let mut verdicts = HashMap::new();
        verdicts.insert("w1".to_string(), verdict(Decision::Reject));
        for _ in 0..20 {
            engine
                .evaluate_round(Some(Decision::Approve), &verdicts, &[], 10.0)
                .await
                .unwrap();
        }
        let record = engine.record(&"w1".to_string()).await;
        assert_eq!(record.score, 0.0);
    }

    #[tokio::test]
    async fn agreeing_worker_gains_score() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TrustEngine::load(dir.path().join("trust.json"), &[]).await.unwrap();
        let mut verdicts = HashMap::new();
        verdicts.insert("w1".to_string(), verdict(Decision::Approve));
        let before = engine.record(&"w1".to_string()).await.score;
        engine
            .evaluate_round(Some(Decision::Approve), &verdicts, &[], 10.0)
            .await
            .unwrap();
        let after = engine.record(&"w1".to_string()).await.score;
        assert!(after >= before || after == 100.0);
    }

    #[tokio::test]
    async fn missing_worker_is_penalized() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TrustEngine::load(dir.path().join("trust.json"), &[]).await.unwrap();
        engine
            .evaluate_round(Some(Decision::Approve), &HashMap::new(), &["w_absent".to_string()], 10.0)
            .await
            .unwrap();
        let record = engine.record(&"w_absent".to_string()).await;
        assert_eq!(record.score, 85.0);
    }
}
