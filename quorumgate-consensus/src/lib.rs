//! The PBFT consensus core.
//!
//! Three-phase (pre-prepare, prepare, commit) agreement over a small,
//! strictly-schema'd verdict vocabulary, driven by a single coordinator task
//! per round. This crate knows about workers only through the [`Worker`]
//! capability trait — it has no idea whether a concrete worker is a
//! simulator, a fault-injecting wrapper, or something else entirely.
//!
//! ## Algorithm notes
//!
//! Unlike a networked PBFT deployment, all "nodes" here are local: the
//! engine drives every worker's [`pbft_node::PbftNode`] sequentially within
//! one task, so there is no message-ordering or partial-delivery problem to
//! solve. What's preserved from PBFT is the quorum arithmetic (`2f+1` out of
//! `3f+1`) and the three-phase shape, which gives the certificate its
//! Byzantine-fault tolerance even though the "network" is a function call.

pub mod engine;
pub mod error;
pub mod events;
pub mod pbft_node;
pub mod types;
pub mod verifier;
pub mod worker;

pub use engine::{ConsensusConfig, ConsensusEngine, RoundOutcome, RoundResult};
pub use error::GatewayError;
pub use events::{no_op_hook, EventHook, EventKind};
pub use pbft_node::PbftNode;
pub use types::{
    request_field, Certificate, Commit, ConsensusRound, ErrorKind, Intent, PrePrepare, Prepare,
    Request, RiskLevel, SignedEntry, WorkerId, WorkerIdentity,
};
pub use verifier::{verify_certificate, VerificationReport};
pub use worker::Worker;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quorumgate_security::{Decision, ReasonCode, Verdict};
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedWorker {
        identity: WorkerIdentity,
        decision: Decision,
    }

    #[async_trait]
    impl Worker for FixedWorker {
        fn identity(&self) -> &WorkerIdentity {
            &self.identity
        }

        async fn decide(&self, action_id: &str, _request: &Request) -> anyhow::Result<Verdict> {
            Ok(Verdict {
                action_id: action_id.to_string(),
                decision: self.decision,
                reason_code: ReasonCode::Safe,
                confidence: 0.9,
            })
        }
    }

    fn worker(id: &str, decision: Decision) -> Arc<dyn Worker> {
        Arc::new(FixedWorker {
            identity: WorkerIdentity::generate(id),
            decision,
        })
    }

    fn sample_request() -> Request {
        let mut m = Request::new();
        m.insert("operation".into(), serde_json::json!("PING"));
        m.insert("target".into(), serde_json::json!("internal_service"));
        m
    }

    #[tokio::test]
    async fn unanimous_approve_reaches_consensus_with_quorum_signatures() {
        let workers = vec![
            worker("worker_1", Decision::Approve),
            worker("worker_2", Decision::Approve),
            worker("worker_3", Decision::Approve),
            worker("worker_4", Decision::Approve),
        ];
        let engine = ConsensusEngine::new(
            ConsensusConfig { f: 1, timeout: Duration::from_secs(5) },
            workers,
            no_op_hook(),
        );
        let intent = Intent::new("PING", "internal_service", "health check", RiskLevel::Low);
        let outcome = engine.submit_request(&intent, sample_request()).await;
        assert_eq!(outcome.result, RoundResult::ConsensusReached);
        let cert = outcome.certificate.expect("certificate should be present");
        assert!(cert.prepare_quorum.len() >= 3);
        assert!(cert.commit_quorum.len() >= 3);
        assert_eq!(cert.decision, Decision::Approve);
    }

    #[tokio::test]
    async fn single_byzantine_approve_cannot_outvote_three_rejects() {
        let workers = vec![
            worker("worker_1", Decision::Reject),
            worker("worker_2", Decision::Approve),
            worker("worker_3", Decision::Reject),
            worker("worker_4", Decision::Reject),
        ];
        let engine = ConsensusEngine::new(
            ConsensusConfig { f: 1, timeout: Duration::from_secs(5) },
            workers,
            no_op_hook(),
        );
        let intent = Intent::new("DELETE", "some_db", "drop it", RiskLevel::Critical);
        let outcome = engine.submit_request(&intent, sample_request()).await;
        let cert = outcome.certificate.expect("certificate should be present");
        assert_eq!(cert.decision, Decision::Reject);
    }

    #[tokio::test]
    async fn split_two_two_yields_no_quorum() {
        let workers = vec![
            worker("worker_1", Decision::Approve),
            worker("worker_2", Decision::Approve),
            worker("worker_3", Decision::Reject),
            worker("worker_4", Decision::Reject),
        ];
        let engine = ConsensusEngine::new(
            ConsensusConfig { f: 1, timeout: Duration::from_secs(5) },
            workers,
            no_op_hook(),
        );
        let intent = Intent::new("UPDATE", "some_resource", "modify it", RiskLevel::High);
        let outcome = engine.submit_request(&intent, sample_request()).await;
        assert_eq!(outcome.result, RoundResult::NoQuorum);
        assert!(outcome.certificate.is_none());
    }

    #[tokio::test]
    async fn sequence_numbers_strictly_increase() {
        let workers = vec![
            worker("worker_1", Decision::Approve),
            worker("worker_2", Decision::Approve),
            worker("worker_3", Decision::Approve),
            worker("worker_4", Decision::Approve),
        ];
        let engine = ConsensusEngine::new(
            ConsensusConfig { f: 1, timeout: Duration::from_secs(5) },
            workers,
            no_op_hook(),
        );
        let intent = Intent::new("PING", "svc", "d", RiskLevel::Low);
        let first = engine.submit_request(&intent, sample_request()).await;
        let second = engine.submit_request(&intent, sample_request()).await;
        assert!(second.round.seq > first.round.seq);
    }
}
