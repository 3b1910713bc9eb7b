//! Per-worker PBFT node: message logs and the prepared/committed predicates.
//!
//! Each node tracks, for every `(view, seq, request_hash)` triple it has
//! seen, how many Prepare and Commit messages it has logged. The node does
//! not itself decide when a round completes — the consensus engine drives
//! that — it only answers "have I seen enough to call this prepared /
//! committed".

use crate::types::{Commit, Prepare, PrePrepare, WorkerId};
use std::collections::HashMap;

/// Bound on how many (view, seq) triples a node retains message logs for.
/// Older entries are evicted in insertion order once the bound is exceeded,
/// since the certificate — not the raw log — is the durable artifact a
/// caller needs once a round completes.
const MAX_RETAINED_ROUNDS: usize = 100;

type RoundKey = (u64, u64, String);

#[derive(Default)]
pub struct PbftNode {
    pub worker_id: WorkerId,
    pre_prepares: HashMap<RoundKey, PrePrepare>,
    prepares: HashMap<RoundKey, Vec<Prepare>>,
    commits: HashMap<RoundKey, Vec<Commit>>,
    insertion_order: Vec<RoundKey>,
}

impl PbftNode {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    fn touch(&mut self, key: &RoundKey) {
        if !self.insertion_order.iter().any(|k| k == key) {
            self.insertion_order.push(key.clone());
            if self.insertion_order.len() > MAX_RETAINED_ROUNDS {
                let evicted = self.insertion_order.remove(0);
                self.pre_prepares.remove(&evicted);
                self.prepares.remove(&evicted);
                self.commits.remove(&evicted);
            }
        }
    }

    pub fn on_pre_prepare(&mut self, msg: PrePrepare) {
        let key = (msg.view, msg.seq, msg.request_hash.clone());
        self.touch(&key);
        self.pre_prepares.insert(key, msg);
    }

    pub fn on_prepare(&mut self, msg: Prepare) {
        let key = (msg.view, msg.seq, msg.request_hash.clone());
        self.touch(&key);
        let entry = self.prepares.entry(key).or_default();
        if !entry.iter().any(|p| p.worker_id == msg.worker_id) {
            entry.push(msg);
        }
    }

    pub fn on_commit(&mut self, msg: Commit) {
        let key = (msg.view, msg.seq, msg.request_hash.clone());
        self.touch(&key);
        let entry = self.commits.entry(key).or_default();
        if !entry.iter().any(|c| c.worker_id == msg.worker_id) {
            entry.push(msg);
        }
    }

    pub fn prepare_count(&self, view: u64, seq: u64, request_hash: &str) -> usize {
        self.prepares
            .get(&(view, seq, request_hash.to_string()))
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn commit_count(&self, view: u64, seq: u64, request_hash: &str) -> usize {
        self.commits
            .get(&(view, seq, request_hash.to_string()))
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Distinct `result_hash` values committed for this `(view, seq)`,
    /// regardless of `request_hash`. More than one distinct value is
    /// equivocation.
    pub fn distinct_result_hashes(&self, view: u64, seq: u64) -> Vec<String> {
        let mut hashes: Vec<String> = self
            .commits
            .iter()
            .filter(|((v, s, _), _)| *v == view && *s == seq)
            .flat_map(|(_, commits)| commits.iter().map(|c| c.result_hash.clone()))
            .collect();
        hashes.sort();
        hashes.dedup();
        hashes
    }

    pub fn is_prepared(&self, view: u64, seq: u64, request_hash: &str, quorum_size: usize) -> bool {
        self.prepare_count(view, seq, request_hash) >= quorum_size
    }

    pub fn is_committed(&self, view: u64, seq: u64, request_hash: &str, quorum_size: usize) -> bool {
        self.commit_count(view, seq, request_hash) >= quorum_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumgate_security::{Decision, ReasonCode, Verdict};

    fn prepare(worker_id: &str, view: u64, seq: u64, hash: &str) -> Prepare {
        Prepare {
            worker_id: worker_id.to_string(),
            view,
            seq,
            request_hash: hash.to_string(),
            sig: "sig".to_string(),
        }
    }

    fn commit(worker_id: &str, view: u64, seq: u64, req_hash: &str, result_hash: &str) -> Commit {
        Commit {
            worker_id: worker_id.to_string(),
            view,
            seq,
            request_hash: req_hash.to_string(),
            result_hash: result_hash.to_string(),
            result: Verdict {
                action_id: "a1".into(),
                decision: Decision::Approve,
                reason_code: ReasonCode::Safe,
                confidence: 0.9,
            },
            sig: "sig".to_string(),
        }
    }

    #[test]
    fn becomes_prepared_at_quorum() {
        let mut node = PbftNode::new("n1".into());
        node.on_prepare(prepare("w1", 0, 1, "h"));
        node.on_prepare(prepare("w2", 0, 1, "h"));
        assert!(!node.is_prepared(0, 1, "h", 3));
        node.on_prepare(prepare("w3", 0, 1, "h"));
        assert!(node.is_prepared(0, 1, "h", 3));
    }

    #[test]
    fn duplicate_prepare_from_same_worker_does_not_double_count() {
        let mut node = PbftNode::new("n1".into());
        node.on_prepare(prepare("w1", 0, 1, "h"));
        node.on_prepare(prepare("w1", 0, 1, "h"));
        assert_eq!(node.prepare_count(0, 1, "h"), 1);
    }

    #[test]
    fn detects_equivocated_result_hashes() {
        let mut node = PbftNode::new("n1".into());
        node.on_commit(commit("w1", 0, 1, "rh", "result_a"));
        node.on_commit(commit("w2", 0, 1, "rh", "result_b"));
        assert_eq!(node.distinct_result_hashes(0, 1).len(), 2);
    }
}
