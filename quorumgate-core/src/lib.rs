//! The gateway orchestrator: configuration, the sentry drift check, and the
//! `Gateway` value that wires the security, consensus, workers, policy,
//! trust, and audit crates into the `submit_query` control flow described at
//! the top of this system's design.

pub mod config;
pub mod gateway;
pub mod scenarios;
pub mod sentry;

pub use config::{GatewayConfig, Mode};
pub use gateway::{Gateway, QueryOutcome, QueryStatus};
pub use sentry::validate_consensus_alignment;
