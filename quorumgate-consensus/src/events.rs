//! Event hook: the engine's one-way notification channel to the transport
//! layer. The engine never imports a WebSocket type; it calls `on_event`
//! with a tagged kind and a JSON payload, and whatever the caller supplied
//! at construction (a broadcaster, a test collector, a no-op) decides what
//! to do with it. This keeps the dependency arrow pointing from transport to
//! core, never the reverse.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RoundStarted,
    PhaseUpdate,
    AgentResponse,
    ConsensusReached,
    NoQuorum,
    DriftDetected,
}

pub type EventHook = Arc<dyn Fn(EventKind, Value) + Send + Sync>;

pub fn no_op_hook() -> EventHook {
    Arc::new(|_, _| {})
}
