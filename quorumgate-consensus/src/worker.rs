//! The worker capability interface.
//!
//! A worker is defined by exactly one capability: produce a verdict for an
//! action within a timeout. Concrete implementations (a risk-weighted
//! simulator, a fault-injecting decorator) live in `quorumgate-workers`;
//! this crate only depends on the trait, never a concrete type, so the
//! consensus engine has no knowledge of how a verdict was actually produced.

use crate::types::{Request, WorkerIdentity};
use async_trait::async_trait;
use quorumgate_security::Verdict;

#[async_trait]
pub trait Worker: Send + Sync {
    fn identity(&self) -> &WorkerIdentity;

    fn worker_id(&self) -> &str {
        &self.identity().worker_id
    }

    /// Produces a verdict for `action_id` given `request`. Implementations
    /// must not panic; any internal fault should surface as an `Err` so the
    /// engine can record it as a `WorkerError` rather than aborting dispatch
    /// of the other workers.
    async fn decide(&self, action_id: &str, request: &Request) -> anyhow::Result<Verdict>;
}
