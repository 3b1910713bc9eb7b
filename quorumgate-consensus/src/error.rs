//! The gateway-wide error taxonomy. Every terminal outcome a round can reach
//! is a named variant here rather than a generic string, so callers (the API
//! layer, the auditor, tests) can match on *kind* instead of parsing
//! messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("verdict did not conform to schema: {0}")]
    SchemaViolation(String),

    #[error("worker {worker_id} exceeded its deadline")]
    Timeout { worker_id: String },

    #[error("worker {worker_id} failed: {reason}")]
    WorkerError { worker_id: String, reason: String },

    #[error("no quorum reached: {reason}")]
    NoQuorum { reason: String },

    #[error("certificate signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("blocked by guardrail: {reason}")]
    GuardrailBlock { reason: String },

    #[error("policy requires {required} agents, only {available} authorized")]
    PolicyInsufficientAgents { required: usize, available: usize },

    #[error("drift detected: {reason}")]
    DriftDetected { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("persistence error: {0}")]
    Persistence(String),
}
