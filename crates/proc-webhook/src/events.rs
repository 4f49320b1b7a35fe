//! The six webhook events of spec.md §4.6, and the envelope they're
//! wrapped in on the wire.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// `{ "event": ..., "timestamp": ..., "data": ..., "source": "supermarket-processor" }`
/// (spec.md §4.6). Built once per dispatch from a [`WebhookEvent`].
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub event: &'static str,
    pub timestamp: String,
    pub data: Value,
    pub source: &'static str,
}

/// `job.progress`'s data keys (spec.md §4.6 table), broken out as its own
/// struct since the Job Manager's pipeline constructs it once per progress
/// beat from live counters rather than from a generic map.
#[derive(Debug, Clone)]
pub struct JobProgressData {
    pub job_id: Uuid,
    pub progress_percentage: f64,
    pub processed_count: i64,
    pub total_products: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub current_batch: u64,
    pub total_batches: u64,
}

/// `job.failed`'s data keys.
#[derive(Debug, Clone)]
pub struct JobFailedData {
    pub job_id: Uuid,
    pub shop_type: String,
    pub error_message: String,
    pub processed_count: i64,
    pub failed_count: i64,
}

/// One instance of each event row in spec.md §4.6's table. Each variant
/// carries exactly the data keys that row specifies; `path()`/`name()`
/// return the wire values.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    JobStarted {
        job_id: Uuid,
        shop_type: String,
        total_products: i64,
        status: &'static str,
    },
    JobProgress(JobProgressData),
    JobCompleted {
        job_id: Uuid,
        status: &'static str,
        total_processed: i64,
        success_count: i64,
        failed_count: i64,
        skipped_count: i64,
        deduped_count: i64,
        duration_ms: i64,
        error_count: i64,
    },
    JobFailed(JobFailedData),
    HighErrorRate {
        job_id: Uuid,
        alert_type: &'static str,
        shop_type: String,
        error_rate: f64,
        total_errors: i64,
        processed_count: i64,
        error_types: Vec<String>,
    },
    SystemHealthCheck {
        status: &'static str,
        version: &'static str,
    },
}

impl WebhookEvent {
    /// Dot-separated event name, the envelope's `"event"` field.
    pub fn name(&self) -> &'static str {
        match self {
            WebhookEvent::JobStarted { .. } => "job.started",
            WebhookEvent::JobProgress(_) => "job.progress",
            WebhookEvent::JobCompleted { .. } => "job.completed",
            WebhookEvent::JobFailed(_) => "job.failed",
            WebhookEvent::HighErrorRate { .. } => "processing.high_error_rate",
            WebhookEvent::SystemHealthCheck { .. } => "system.health_check",
        }
    }

    /// The path appended to the dispatcher's configured base URL.
    pub fn path(&self) -> &'static str {
        match self {
            WebhookEvent::JobStarted { .. } => "/webhook/processor/job-started",
            WebhookEvent::JobProgress(_) => "/webhook/processor/job-progress",
            WebhookEvent::JobCompleted { .. } => "/webhook/processor/job-completed",
            WebhookEvent::JobFailed(_) => "/webhook/processor/job-failed",
            WebhookEvent::HighErrorRate { .. } => "/webhook/processor/alert",
            WebhookEvent::SystemHealthCheck { .. } => "/webhook/processor/health-check",
        }
    }

    fn data(&self) -> Value {
        match self {
            WebhookEvent::JobStarted {
                job_id,
                shop_type,
                total_products,
                status,
            } => json!({
                "job_id": job_id,
                "shop_type": shop_type,
                "total_products": total_products,
                "status": status,
            }),
            WebhookEvent::JobProgress(d) => json!({
                "job_id": d.job_id,
                "progress_percentage": d.progress_percentage,
                "processed_count": d.processed_count,
                "total_products": d.total_products,
                "success_count": d.success_count,
                "failed_count": d.failed_count,
                "current_batch": d.current_batch,
                "total_batches": d.total_batches,
            }),
            WebhookEvent::JobCompleted {
                job_id,
                status,
                total_processed,
                success_count,
                failed_count,
                skipped_count,
                deduped_count,
                duration_ms,
                error_count,
            } => json!({
                "job_id": job_id,
                "status": status,
                "total_processed": total_processed,
                "success_count": success_count,
                "failed_count": failed_count,
                "skipped_count": skipped_count,
                "deduped_count": deduped_count,
                "duration_ms": duration_ms,
                "error_count": error_count,
            }),
            WebhookEvent::JobFailed(d) => json!({
                "job_id": d.job_id,
                "status": "failed",
                "shop_type": d.shop_type,
                "error_message": d.error_message,
                "processed_count": d.processed_count,
                "failed_count": d.failed_count,
            }),
            WebhookEvent::HighErrorRate {
                job_id,
                alert_type,
                shop_type,
                error_rate,
                total_errors,
                processed_count,
                error_types,
            } => json!({
                "job_id": job_id,
                "alert_type": alert_type,
                "shop_type": shop_type,
                "error_rate": error_rate,
                "total_errors": total_errors,
                "processed_count": processed_count,
                "error_types": error_types,
            }),
            WebhookEvent::SystemHealthCheck { status, version } => json!({
                "status": status,
                "version": version,
            }),
        }
    }

    pub(crate) fn into_envelope(self) -> Envelope {
        Envelope {
            event: self.name(),
            timestamp: Utc::now().to_rfc3339(),
            data: self.data(),
            source: "supermarket-processor",
        }
    }
}
