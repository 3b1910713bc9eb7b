//! REST handlers. Each function borrows the shared `Gateway` out of
//! `AppState` and translates its result into the JSON shapes external
//! callers see — no business logic lives here beyond that translation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use quorumgate_consensus::Request as GatewayRequest;
use quorumgate_core::Gateway;
use quorumgate_workers::FaultConfig;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    let state = AppState { gateway };
    Router::new()
        .route("/health", get(health))
        .route("/query", post(submit_query))
        .route("/agents", get(list_agents))
        .route("/faults/inject", post(inject_fault))
        .route("/faults/clear", post(clear_faults))
        .route("/scenarios/:name", post(run_scenario))
        .route("/history", get(history))
        .route("/trust", get(trust))
        .route("/analytics", get(analytics))
        .route("/policy", get(get_policy).post(set_policy))
        .route("/config", get(get_config))
        .route("/session/export", get(export_session))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "timestamp": chrono::Utc::now() }))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequestBody {
    pub operation: String,
    pub target: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strict_mode: bool,
}

async fn submit_query(
    State(state): State<AppState>,
    Json(body): Json<QueryRequestBody>,
) -> Json<serde_json::Value> {
    let mut request = GatewayRequest::new();
    request.insert("operation".to_string(), serde_json::json!(body.operation));
    request.insert("target".to_string(), serde_json::json!(body.target));
    request.insert("description".to_string(), serde_json::json!(body.description));

    info!(operation = %body.operation, target = %body.target, "received query");
    let outcome = state.gateway.submit_query(request, body.strict_mode).await;
    Json(serde_json::to_value(outcome).unwrap_or_else(|_| serde_json::json!({"error": "serialization failure"})))
}

async fn list_agents(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.gateway.registry().snapshot();
    let active_faults = state.gateway.fault_injector().active_faults().await;
    Json(serde_json::json!({
        "agents": snapshot,
        "active_faults": active_faults,
        "mode": format!("{:?}", state.gateway_mode()).to_lowercase(),
        "f": state.gateway.f(),
        "n": state.gateway.n(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct InjectFaultBody {
    pub worker_id: String,
    pub fault_type: String,
    pub malicious_decision: Option<quorumgate_security::Decision>,
    pub delay_seconds: Option<f64>,
    pub collusion_group: Option<String>,
}

async fn inject_fault(State(state): State<AppState>, Json(body): Json<InjectFaultBody>) -> Response {
    let fault_type = match body.fault_type.to_uppercase().as_str() {
        "CRASH" => quorumgate_workers::FaultType::Crash,
        "OMISSION" => quorumgate_workers::FaultType::Omission,
        "TIMING" => quorumgate_workers::FaultType::Timing,
        "BYZANTINE" => quorumgate_workers::FaultType::Byzantine,
        "COLLUSION" => quorumgate_workers::FaultType::Collusion,
        other => {
            warn!(fault_type = other, "rejected unknown fault type");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let config = FaultConfig {
        fault_type,
        malicious_decision: body.malicious_decision,
        delay_seconds: body.delay_seconds,
        collusion_group: body.collusion_group,
    };

    match state.gateway.fault_injector().inject(&body.worker_id, config).await {
        Ok(()) => {
            let active = state.gateway.fault_injector().active_faults().await;
            Json(serde_json::json!({ "injected": body.worker_id, "active_faults": active })).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ClearFaultsBody {
    pub worker_id: Option<String>,
}

async fn clear_faults(State(state): State<AppState>, Json(body): Json<ClearFaultsBody>) -> Json<serde_json::Value> {
    let cleared = state
        .gateway
        .fault_injector()
        .clear(body.worker_id.as_deref())
        .await
        .unwrap_or_default();
    let remaining = state.gateway.fault_injector().active_faults().await;
    Json(serde_json::json!({ "cleared": cleared, "active_faults": remaining }))
}

async fn run_scenario(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let report = match name.as_str() {
        "compromised_agent" => quorumgate_core::scenarios::compromised_agent(&state.gateway).await,
        "crash_recovery" => quorumgate_core::scenarios::crash_recovery(&state.gateway).await,
        "collusion_attempt" => quorumgate_core::scenarios::collusion_attempt(&state.gateway, state.gateway.f() + 1).await,
        "primary_failure" => quorumgate_core::scenarios::primary_failure(&state.gateway).await,
        "f2_failure" => quorumgate_core::scenarios::f2_failure(&state.gateway).await,
        other => {
            warn!(scenario = other, "rejected unknown scenario name");
            return StatusCode::NOT_FOUND.into_response();
        }
    };
    Json(report).into_response()
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

async fn history(State(state): State<AppState>, Query(params): Query<HistoryParams>) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(50);
    match state.gateway.auditor().get_history(limit) {
        Ok(records) => Json(serde_json::json!({ "history": records })),
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}

async fn trust(State(state): State<AppState>) -> Json<serde_json::Value> {
    let records = state.gateway.trust_engine().all_records().await;
    Json(serde_json::json!({ "scores": records }))
}

async fn analytics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let history = state.gateway.auditor().get_history(1000).unwrap_or_default();
    let total = history.len();
    let consensus_reached = history.iter().filter(|r| r.consensus_reached).count();
    let sentry_failures = history.iter().filter(|r| !r.sentry_validation).count();
    Json(serde_json::json!({
        "total_queries": total,
        "consensus_reached": consensus_reached,
        "sentry_failures": sentry_failures,
    }))
}

async fn get_policy(State(state): State<AppState>) -> Json<serde_json::Value> {
    let policies = state.gateway.policy_engine().current_policies().await;
    Json(serde_json::json!({ "policies": policies }))
}

#[derive(Debug, Deserialize)]
pub struct SetPolicyBody {
    pub yaml_content: String,
}

async fn set_policy(State(state): State<AppState>, Json(body): Json<SetPolicyBody>) -> Response {
    match state.gateway.policy_engine().update_policies(&body.yaml_content).await {
        Ok(true) => Json(serde_json::json!({ "updated": true })).into_response(),
        Ok(false) => StatusCode::BAD_REQUEST.into_response(),
        Err(e) => {
            warn!(%e, "failed to persist policy update");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "f": state.gateway.f(),
        "n": state.gateway.n(),
        "quorum_size": state.gateway.quorum_size(),
    }))
}

/// A thin CSV serialization of the audit history — an external collaborator
/// by design, with no logic beyond mapping rows to fields.
async fn export_session(State(state): State<AppState>) -> Response {
    let history = state.gateway.auditor().get_history(10_000).unwrap_or_default();
    let mut csv = String::from("id,intent_id,timestamp,risk_level,action_type,target,consensus_reached,sentry_validation\n");
    for record in &history {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            record.id,
            record.intent_id,
            record.timestamp.to_rfc3339(),
            record.risk_level,
            record.action_type,
            record.target,
            record.consensus_reached,
            record.sentry_validation,
        ));
    }
    (
        [(axum::http::header::CONTENT_TYPE, "text/csv")],
        csv,
    )
        .into_response()
}

impl AppState {
    fn gateway_mode(&self) -> quorumgate_core::Mode {
        self.gateway.mode()
    }
}
