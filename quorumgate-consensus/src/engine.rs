//! The per-round PBFT driver.
//!
//! One `ConsensusEngine` owns a view counter, a monotonic sequence counter,
//! and a `PbftNode` per worker. Each call to `submit_request` runs exactly
//! one round to completion (or to an early abort) inside the caller's task;
//! there is no background round-processing loop, because the coordinator is
//! the single driver and only one round is ever in flight on a given engine
//! at a time.

use crate::events::{EventHook, EventKind};
use crate::pbft_node::PbftNode;
use crate::types::{
    Certificate, Commit, ConsensusRound, ErrorKind, Intent, PrePrepare, Prepare, Request,
    SignedEntry, WorkerId, WorkerIdentity,
};
use crate::worker::Worker;
use quorumgate_security::{canonical_json, hash_value, Decision};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub f: usize,
    pub timeout: Duration,
}

impl ConsensusConfig {
    pub fn n(&self) -> usize {
        3 * self.f + 1
    }

    pub fn quorum_size(&self) -> usize {
        2 * self.f + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundResult {
    ConsensusReached,
    NoQuorum,
    DriftDetected,
}

pub struct RoundOutcome {
    pub round: ConsensusRound,
    pub certificate: Option<Certificate>,
    pub result: RoundResult,
}

pub struct ConsensusEngine {
    config: ConsensusConfig,
    workers: Arc<tokio::sync::RwLock<Vec<Arc<dyn Worker>>>>,
    nodes: Mutex<HashMap<WorkerId, PbftNode>>,
    seq: AtomicU64,
    view: AtomicU64,
    on_event: EventHook,
}

impl ConsensusEngine {
    pub fn new(
        config: ConsensusConfig,
        workers: Vec<Arc<dyn Worker>>,
        on_event: EventHook,
    ) -> Self {
        let nodes = workers
            .iter()
            .map(|w| (w.worker_id().to_string(), PbftNode::new(w.worker_id().to_string())))
            .collect();
        Self {
            config,
            workers: Arc::new(tokio::sync::RwLock::new(workers)),
            nodes: Mutex::new(nodes),
            seq: AtomicU64::new(0),
            view: AtomicU64::new(0),
            on_event,
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn current_view(&self) -> u64 {
        self.view.load(Ordering::SeqCst)
    }

    /// Elects the next primary on a detected primary failure. Persists
    /// across rounds: the view is never reset, so a demoted primary stays
    /// demoted until an operator-triggered reset.
    pub fn advance_view(&self) -> u64 {
        self.view.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn workers_handle(&self) -> Arc<tokio::sync::RwLock<Vec<Arc<dyn Worker>>>> {
        Arc::clone(&self.workers)
    }

    fn emit(&self, kind: EventKind, data: Value) {
        (self.on_event)(kind, data);
    }

    pub async fn submit_request(&self, intent: &Intent, request: Request) -> RoundOutcome {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let view = self.current_view();
        let request_hash = hash_value(&json!(&request));
        let started_at = chrono::Utc::now();

        self.emit(
            EventKind::RoundStarted,
            json!({"action_id": intent.intent_id, "sequence": seq}),
        );

        let workers = self.workers.read().await.clone();
        let quorum_size = self.config.quorum_size();

        // Phase 0: parallel verdict collection, each bounded by the
        // configured timeout. A single stuck worker never delays the rest.
        let mut verdict_futures = Vec::with_capacity(workers.len());
        for worker in workers.iter().cloned() {
            let action_id = intent.intent_id.clone();
            let request = request.clone();
            let timeout = self.config.timeout;
            verdict_futures.push(tokio::spawn(async move {
                let worker_id = worker.worker_id().to_string();
                let outcome = tokio::time::timeout(timeout, worker.decide(&action_id, &request)).await;
                (worker_id, outcome)
            }));
        }

        let mut worker_verdicts = HashMap::new();
        let mut worker_errors = HashMap::new();

        for handle in verdict_futures {
            match handle.await {
                Ok((worker_id, Ok(Ok(verdict)))) => {
                    self.emit(
                        EventKind::AgentResponse,
                        json!({"worker_id": worker_id, "status": "OK", "decision": verdict.decision}),
                    );
                    worker_verdicts.insert(worker_id, verdict);
                }
                Ok((worker_id, Ok(Err(err)))) => {
                    warn!(worker_id, %err, "worker returned an error");
                    self.emit(
                        EventKind::AgentResponse,
                        json!({"worker_id": worker_id, "status": "ERROR", "error": err.to_string()}),
                    );
                    worker_errors.insert(worker_id, ErrorKind::WorkerError);
                }
                Ok((worker_id, Err(_elapsed))) => {
                    warn!(worker_id, "worker timed out");
                    self.emit(
                        EventKind::AgentResponse,
                        json!({"worker_id": worker_id, "status": "TIMEOUT"}),
                    );
                    worker_errors.insert(worker_id, ErrorKind::Timeout);
                }
                Err(join_err) => {
                    warn!(%join_err, "worker task panicked or was cancelled");
                }
            }
        }

        let mut round = ConsensusRound {
            action_id: intent.intent_id.clone(),
            seq,
            view,
            request: request.clone(),
            request_hash: request_hash.clone(),
            started_at,
            worker_verdicts: worker_verdicts.clone(),
            worker_errors,
            consensus_decision: None,
            certificate: None,
        };

        // Quorum precondition.
        if worker_verdicts.len() < quorum_size {
            self.emit(
                EventKind::NoQuorum,
                json!({"action_id": intent.intent_id, "reason": "insufficient_verdicts"}),
            );
            return RoundOutcome {
                round,
                certificate: None,
                result: RoundResult::NoQuorum,
            };
        }

        // Decision tally: the majority decision must itself reach quorum.
        let mut approve_count = 0usize;
        let mut reject_count = 0usize;
        for v in worker_verdicts.values() {
            match v.decision {
                Decision::Approve => approve_count += 1,
                Decision::Reject => reject_count += 1,
            }
        }
        let majority_decision = if approve_count >= quorum_size {
            Some(Decision::Approve)
        } else if reject_count >= quorum_size {
            Some(Decision::Reject)
        } else {
            None
        };

        let Some(majority_decision) = majority_decision else {
            self.emit(
                EventKind::NoQuorum,
                json!({"action_id": intent.intent_id, "reason": "no_majority"}),
            );
            return RoundOutcome {
                round,
                certificate: None,
                result: RoundResult::NoQuorum,
            };
        };

        // Canonical result: first verdict, in worker-id lexicographic order,
        // matching the majority decision.
        let mut ordered_worker_ids: Vec<&WorkerId> = worker_verdicts.keys().collect();
        ordered_worker_ids.sort();
        let canonical_worker_id = ordered_worker_ids
            .into_iter()
            .find(|id| worker_verdicts[*id].decision == majority_decision)
            .expect("majority decision implies at least one matching verdict");
        let canonical_result = worker_verdicts[canonical_worker_id].clone();
        let result_hash = hash_value(&serde_json::to_value(&canonical_result).expect("verdict serializes"));

        round.consensus_decision = Some(majority_decision);

        self.emit(
            EventKind::PhaseUpdate,
            json!({"phase": "PRE_PREPARE", "action_id": intent.intent_id}),
        );

        // Phases 1-3 are driven locally against each worker's PbftNode: this
        // coordinator is the only writer, so there is no cross-task race on
        // node state and no out-of-order delivery to reason about.
        let identities: Vec<WorkerIdentity> = workers.iter().map(|w| w.identity().clone()).collect();
        let primary_idx = (view as usize) % identities.len().max(1);
        let primary = &identities[primary_idx];

        let pre_prepare_payload = json!({
            "view": view, "seq": seq, "request_hash": request_hash,
        });
        let pre_prepare_sig = primary.sign_hash(&hash_value(&pre_prepare_payload));
        let pre_prepare = PrePrepare {
            worker_id: primary.worker_id.clone(),
            view,
            seq,
            request_hash: request_hash.clone(),
            request: request.clone(),
            sig: pre_prepare_sig.clone(),
        };

        let mut nodes = self.nodes.lock().await;
        for identity in &identities {
            nodes
                .entry(identity.worker_id.clone())
                .or_insert_with(|| PbftNode::new(identity.worker_id.clone()))
                .on_pre_prepare(pre_prepare.clone());
        }

        self.emit(
            EventKind::PhaseUpdate,
            json!({"phase": "PREPARE", "action_id": intent.intent_id}),
        );

        for identity in &identities {
            let sig = identity.sign_hash(&hash_value(&pre_prepare_payload));
            let msg = Prepare {
                worker_id: identity.worker_id.clone(),
                view,
                seq,
                request_hash: request_hash.clone(),
                sig,
            };
            for node in nodes.values_mut() {
                node.on_prepare(msg.clone());
            }
        }

        let any_prepared = identities
            .iter()
            .any(|id| nodes[&id.worker_id].is_prepared(view, seq, &request_hash, quorum_size));
        if !any_prepared {
            drop(nodes);
            self.emit(
                EventKind::NoQuorum,
                json!({"action_id": intent.intent_id, "reason": "not_prepared"}),
            );
            return RoundOutcome {
                round,
                certificate: None,
                result: RoundResult::NoQuorum,
            };
        }

        self.emit(
            EventKind::PhaseUpdate,
            json!({"phase": "COMMIT", "action_id": intent.intent_id}),
        );

        let commit_payload = json!({
            "view": view, "seq": seq, "request_hash": request_hash, "result_hash": result_hash,
        });
        for identity in &identities {
            let sig = identity.sign_hash(&hash_value(&commit_payload));
            let msg = Commit {
                worker_id: identity.worker_id.clone(),
                view,
                seq,
                request_hash: request_hash.clone(),
                result_hash: result_hash.clone(),
                result: canonical_result.clone(),
                sig,
            };
            for node in nodes.values_mut() {
                node.on_commit(msg.clone());
            }
        }

        let any_committed = identities
            .iter()
            .any(|id| nodes[&id.worker_id].is_committed(view, seq, &request_hash, quorum_size));
        if !any_committed {
            drop(nodes);
            self.emit(
                EventKind::NoQuorum,
                json!({"action_id": intent.intent_id, "reason": "not_committed"}),
            );
            return RoundOutcome {
                round,
                certificate: None,
                result: RoundResult::NoQuorum,
            };
        }

        // Equivocation check: more than one distinct result_hash committed
        // for this (view, seq) means a split-brain commit. Refuse to build a
        // certificate rather than arbitrarily picking one.
        let distinct_hashes: Vec<String> = identities
            .iter()
            .flat_map(|id| nodes[&id.worker_id].distinct_result_hashes(view, seq))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        drop(nodes);

        if distinct_hashes.len() > 1 {
            warn!(?distinct_hashes, "equivocated commits detected");
            self.emit(
                EventKind::DriftDetected,
                json!({"action_id": intent.intent_id, "reason": "equivocated_commit_hashes"}),
            );
            return RoundOutcome {
                round,
                certificate: None,
                result: RoundResult::DriftDetected,
            };
        }

        // Certificate: the first 2f+1 workers (registration order) that
        // produced a verdict sign the bare hashes directly.
        let mut prepare_quorum = Vec::with_capacity(quorum_size);
        let mut commit_quorum = Vec::with_capacity(quorum_size);
        for identity in &identities {
            if !worker_verdicts.contains_key(&identity.worker_id) {
                continue;
            }
            if prepare_quorum.len() < quorum_size {
                prepare_quorum.push(SignedEntry {
                    worker_id: identity.worker_id.clone(),
                    signature: identity.sign_hash(&request_hash),
                });
            }
            if commit_quorum.len() < quorum_size {
                commit_quorum.push(SignedEntry {
                    worker_id: identity.worker_id.clone(),
                    signature: identity.sign_hash(&result_hash),
                });
            }
            if prepare_quorum.len() >= quorum_size && commit_quorum.len() >= quorum_size {
                break;
            }
        }

        let certificate = Certificate {
            view,
            seq,
            request_hash: request_hash.clone(),
            pre_prepare_signature: pre_prepare_sig,
            prepare_quorum,
            commit_quorum,
            result_hash,
            decision: majority_decision,
            timestamp: chrono::Utc::now(),
        };

        round.certificate = Some(certificate.clone());

        info!(
            action_id = %intent.intent_id, seq, view,
            decision = ?majority_decision,
            "consensus reached"
        );
        self.emit(
            EventKind::ConsensusReached,
            json!({
                "action_id": intent.intent_id,
                "decision": majority_decision,
                "sequence": seq,
                "prepare_count": certificate.prepare_quorum.len(),
                "commit_count": certificate.commit_quorum.len(),
            }),
        );

        RoundOutcome {
            round,
            certificate: Some(certificate),
            result: RoundResult::ConsensusReached,
        }
    }
}

/// `canonical_json` of a message tuple is what PBFT `Prepare`/`Commit`
/// signatures actually cover; exposed so call sites elsewhere (e.g. a
/// standalone PBFT message verifier) can reuse the exact same encoding.
pub fn pbft_message_bytes(value: &Value) -> Vec<u8> {
    canonical_json(value).into_bytes()
}
