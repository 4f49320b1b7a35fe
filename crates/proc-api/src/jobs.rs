//! `/jobs*` routes of spec.md §6.1.

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{parse_shop_type, validate_batch_size, validate_reason};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use proc_engine::CreateJobRequest;
use proc_storage::{Job, JobFilter, JobStatus, Paging, ProcessingErrorRow};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    pub shop_type: String,
    pub batch_size: Option<i32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

pub async fn create_job(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<CreateJobBody>,
) -> Result<(StatusCode, Envelope<Job>), ApiError> {
    parse_shop_type(&body.shop_type)?;
    let batch_size = validate_batch_size(body.batch_size)?;
    let job = state
        .jobs
        .create(CreateJobRequest {
            shop_type: body.shop_type,
            batch_size,
            metadata: body.metadata,
        })
        .await?;
    Ok((StatusCode::CREATED, Envelope::ok(job)))
}

pub async fn start_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    state.jobs.start(job_id).await?;
    Ok(Envelope::ok(json!({ "job_id": job_id, "status": "running" })))
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelJobBody {
    pub reason: Option<String>,
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    body: Option<axum::Json<CancelJobBody>>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    let reason = validate_reason(body.and_then(|b| b.0.reason))?;
    state.jobs.cancel(job_id, reason).await?;
    Ok(Envelope::ok(json!({ "job_id": job_id, "status": "cancelled" })))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Envelope<Job>, ApiError> {
    let job = state
        .jobs
        .get_by_id(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id} not found")))?;
    Ok(Envelope::ok(job))
}

pub async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Envelope<proc_engine::Progress>, ApiError> {
    let progress = state.jobs.progress(job_id).await?;
    Ok(Envelope::ok(progress))
}

#[derive(Debug, Deserialize)]
pub struct PagingQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn job_errors(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<PagingQuery>,
) -> Result<Envelope<Vec<ProcessingErrorRow>>, ApiError> {
    let paging = Paging {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    };
    let errors = state.jobs.get_errors(job_id, paging).await?;
    Ok(Envelope::ok(errors))
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub shop_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Envelope<Vec<Job>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(parse_job_status)
        .transpose()?;
    let jobs = state
        .jobs
        .list(JobFilter {
            shop_type: query.shop_type,
            status,
            limit: query.limit.unwrap_or(50),
            offset: query.offset.unwrap_or(0),
        })
        .await?;
    Ok(Envelope::ok(jobs))
}

fn parse_job_status(raw: &str) -> Result<JobStatus, ApiError> {
    match raw {
        "pending" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        "cancelled" => Ok(JobStatus::Cancelled),
        other => Err(ApiError::BadRequest(format!("unknown job status {other:?}"))),
    }
}

/// Body of `POST /process/{shopType}` (spec.md §6.1: `{batch_size?,
/// metadata?}`). Unlike `CreateJobBody`, `shop_type` comes from the path,
/// not the body.
#[derive(Debug, Deserialize, Default)]
pub struct ProcessShopBody {
    pub batch_size: Option<i32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// `POST /process/{shopType}` (spec.md §6.1): create + start in one call.
pub async fn process_shop(
    State(state): State<AppState>,
    Path(shop_type): Path<String>,
    body: Option<axum::Json<ProcessShopBody>>,
) -> Result<(StatusCode, Envelope<Job>), ApiError> {
    parse_shop_type(&shop_type)?;
    let body = body.map(|b| b.0).unwrap_or_default();
    let batch_size = validate_batch_size(body.batch_size)?;
    let job = state
        .jobs
        .create(CreateJobRequest {
            shop_type,
            batch_size,
            metadata: body.metadata,
        })
        .await?;
    state.jobs.start(job.job_id).await?;
    Ok((StatusCode::CREATED, Envelope::ok(job)))
}
