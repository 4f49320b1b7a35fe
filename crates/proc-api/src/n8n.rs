//! `POST /webhook/n8n` (spec.md §6.1): the inbound side of the integration,
//! distinct from the outbound Webhook Dispatcher in `proc-webhook`. An
//! external orchestrator (n8n) posts an action here; `action="process"`
//! creates and starts a job exactly like `/process/{shopType}`.

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{parse_shop_type, validate_batch_size};
use axum::extract::State;
use proc_engine::CreateJobRequest;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct N8nBody {
    pub action: String,
    pub shop_type: String,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

pub async fn n8n_webhook(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<N8nBody>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    if body.action != "process" {
        return Ok(Envelope::ok(json!({ "acknowledged": true, "action": body.action })));
    }

    parse_shop_type(&body.shop_type)?;
    let mut metadata = body.metadata;
    if let (Some(batch_id), serde_json::Value::Object(map)) = (&body.batch_id, &mut metadata) {
        map.insert("batch_id".to_string(), json!(batch_id));
    }
    let batch_size = validate_batch_size(None)?;
    let job = state
        .jobs
        .create(CreateJobRequest {
            shop_type: body.shop_type,
            batch_size,
            metadata,
        })
        .await?;
    state.jobs.start(job.job_id).await?;
    Ok(Envelope::ok(json!({ "job_id": job.job_id, "status": "running" })))
}
