//! Shared data model: requests, intents, PBFT messages, rounds, and
//! certificates. This module carries no behavior beyond small invariant
//! helpers — the engine and PBFT node own the state transitions.

use chrono::{DateTime, Utc};
use quorumgate_security::Verdict;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub type WorkerId = String;

/// An opaque caller-supplied request. Canonicalized and hashed before use;
/// never interpreted beyond the three well-known fields.
pub type Request = HashMap<String, Value>;

pub fn request_field<'a>(request: &'a Request, key: &str) -> Option<&'a str> {
    request.get(key).and_then(|v| v.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub intent_id: String,
    pub action_type: String,
    pub target: String,
    pub description: String,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
}

impl Intent {
    pub fn new(action_type: &str, target: &str, description: &str, risk_level: RiskLevel) -> Self {
        Self {
            intent_id: Uuid::new_v4().to_string(),
            action_type: action_type.to_string(),
            target: target.to_string(),
            description: description.to_string(),
            risk_level,
            created_at: Utc::now(),
        }
    }

    /// Guardrail evaluation may upgrade risk exactly once; anything stricter
    /// than the current level wins.
    pub fn upgrade_risk(&mut self, upgraded: RiskLevel) {
        self.risk_level = upgraded;
    }
}

/// A worker's public identity. Signing keys never leave the process that
/// generated them; only the verifying key travels with the certificate.
#[derive(Clone)]
pub struct WorkerIdentity {
    pub worker_id: WorkerId,
    pub signing_key: quorumgate_security::KeyPair,
}

impl WorkerIdentity {
    pub fn generate(worker_id: impl Into<WorkerId>) -> Self {
        Self {
            worker_id: worker_id.into(),
            signing_key: quorumgate_security::KeyPair::generate(),
        }
    }

    pub fn verify_key_hex(&self) -> String {
        quorumgate_security::verifying_key_to_hex(&self.signing_key.verifying_key())
    }

    /// Signs the UTF-8 bytes of a hex hash string — the certificate's
    /// signature byte-domain convention (distinct from PBFT message
    /// signatures, which cover the full canonical message tuple).
    pub fn sign_hash(&self, hash_hex: &str) -> String {
        self.signing_key.sign_hex(hash_hex.as_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Timeout,
    WorkerError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrePrepare {
    pub worker_id: WorkerId,
    pub view: u64,
    pub seq: u64,
    pub request_hash: String,
    pub request: Request,
    pub sig: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prepare {
    pub worker_id: WorkerId,
    pub view: u64,
    pub seq: u64,
    pub request_hash: String,
    pub sig: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub worker_id: WorkerId,
    pub view: u64,
    pub seq: u64,
    pub request_hash: String,
    pub result_hash: String,
    pub result: Verdict,
    pub sig: String,
}

/// Per-round mutable state, owned exclusively by the task driving that
/// round. Becomes read-only once the round completes.
#[derive(Debug, Clone)]
pub struct ConsensusRound {
    pub action_id: String,
    pub seq: u64,
    pub view: u64,
    pub request: Request,
    pub request_hash: String,
    pub started_at: DateTime<Utc>,
    pub worker_verdicts: HashMap<WorkerId, Verdict>,
    pub worker_errors: HashMap<WorkerId, ErrorKind>,
    pub consensus_decision: Option<quorumgate_security::Decision>,
    pub certificate: Option<Certificate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEntry {
    pub worker_id: WorkerId,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub view: u64,
    pub seq: u64,
    pub request_hash: String,
    pub pre_prepare_signature: String,
    pub prepare_quorum: Vec<SignedEntry>,
    pub commit_quorum: Vec<SignedEntry>,
    pub result_hash: String,
    pub decision: quorumgate_security::Decision,
    pub timestamp: DateTime<Utc>,
}

impl Certificate {
    pub fn meets_quorum(&self, quorum_size: usize) -> bool {
        self.prepare_quorum.len() >= quorum_size && self.commit_quorum.len() >= quorum_size
    }
}
