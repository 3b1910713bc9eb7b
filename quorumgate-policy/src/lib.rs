//! Intent classification, guardrails, authorization, and YAML-driven policy
//! evaluation — everything that decides *whether* and *with what quorum
//! size* a request reaches the consensus engine.

pub mod classifier;
pub mod gatekeeper;
pub mod policy;

pub use classifier::{apply_pre_execution_guardrails, classify_risk};
pub use gatekeeper::authorize_agents;
pub use policy::{Policy, PolicyDecision, PolicyEngine};
