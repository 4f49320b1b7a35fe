//! `/health` and `/ready` (spec.md §6.1).

use crate::envelope::Envelope;
use crate::state::AppState;
use axum::extract::State;
use serde_json::json;

pub async fn health(State(state): State<AppState>) -> Envelope<serde_json::Value> {
    let database = state.store.ping().await;
    Envelope::ok(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "system": "up",
    }))
}

pub async fn ready(State(state): State<AppState>) -> Envelope<serde_json::Value> {
    let database = state.store.probe_transaction().await;
    let job_manager = true; // the Job Manager has no external dependency of its own to probe.
    let status = if database && job_manager { "ready" } else { "not_ready" };
    Envelope::ok(json!({
        "status": status,
        "checks": { "database": database, "jobManager": job_manager },
    }))
}
