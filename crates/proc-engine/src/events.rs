//! The "observable lifecycle" of spec.md §5/§9: job and batch events,
//! published on a broadcast channel so the Webhook Dispatcher and
//! Monitoring Agent can subscribe independently without the Job Manager
//! knowing either exists.

use proc_webhook::{Dispatcher, JobFailedData, JobProgressData, WebhookEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// One event in the `job:*`/`batch:*` contract labels of spec.md §4.5/§9.
/// Ordering guarantees (spec.md §5: "batch k's events are observed before
/// batch k+1 starts"; "job:started is observed before any batch:started";
/// terminal events are last) are enforced by the pipeline publishing these
/// strictly in sequence on a single `broadcast::Sender`, never concurrently.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Started {
        job_id: Uuid,
        shop_type: String,
        total_products: i64,
    },
    BatchStarted {
        job_id: Uuid,
        batch_index: u64,
        total_batches: u64,
    },
    BatchCompleted {
        job_id: Uuid,
        batch_index: u64,
        success: i64,
        failed: i64,
    },
    Progress {
        job_id: Uuid,
        shop_type: String,
        progress_percentage: f64,
        processed_count: i64,
        total_products: i64,
        success_count: i64,
        failed_count: i64,
        current_batch: u64,
        total_batches: u64,
    },
    Completed {
        job_id: Uuid,
        total_processed: i64,
        success_count: i64,
        failed_count: i64,
        skipped_count: i64,
        deduped_count: i64,
        duration_ms: i64,
        error_count: i64,
    },
    Failed {
        job_id: Uuid,
        shop_type: String,
        error_message: String,
        processed_count: i64,
        failed_count: i64,
    },
    Cancelled {
        job_id: Uuid,
        reason: String,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::Started { job_id, .. }
            | JobEvent::BatchStarted { job_id, .. }
            | JobEvent::BatchCompleted { job_id, .. }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Cancelled { job_id, .. } => *job_id,
        }
    }
}

/// Capacity of the broadcast channel. Generous relative to expected
/// subscriber count (webhook dispatcher, monitoring agent, tests); a slow
/// subscriber drops the oldest events rather than back-pressuring the
/// pipeline, which must never block on an observer (spec.md §5 "Webhook
/// Dispatcher... overflow is queued or dropped").
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Bridges the internal `JobEvent` stream to spec.md §4.6's webhook
/// contract. Runs for the lifetime of the `JobManager` that spawned it;
/// the Job Manager never calls `Dispatcher` directly, so a slow or
/// misconfigured webhook endpoint can never be observed by the pipeline.
pub fn spawn_webhook_forwarder(mut events: broadcast::Receiver<JobEvent>, webhook: Arc<Dispatcher>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(JobEvent::Started {
                    job_id,
                    shop_type,
                    total_products,
                }) => webhook.post(WebhookEvent::JobStarted {
                    job_id,
                    shop_type,
                    total_products,
                    status: "running",
                }),
                Ok(JobEvent::Progress {
                    job_id,
                    progress_percentage,
                    processed_count,
                    total_products,
                    success_count,
                    failed_count,
                    current_batch,
                    total_batches,
                    ..
                }) => {
                    // spec.md §4.6: progress is webhooked every 10th batch
                    // and on the final batch, not on every beat.
                    if total_batches > 0 && (current_batch % 10 == 0 || current_batch == total_batches) {
                        webhook.post(WebhookEvent::JobProgress(JobProgressData {
                            job_id,
                            progress_percentage,
                            processed_count,
                            total_products,
                            success_count,
                            failed_count,
                            current_batch,
                            total_batches,
                        }));
                    }
                }
                Ok(JobEvent::Completed {
                    job_id,
                    total_processed,
                    success_count,
                    failed_count,
                    skipped_count,
                    deduped_count,
                    duration_ms,
                    error_count,
                }) => webhook.post(WebhookEvent::JobCompleted {
                    job_id,
                    status: "completed",
                    total_processed,
                    success_count,
                    failed_count,
                    skipped_count,
                    deduped_count,
                    duration_ms,
                    error_count,
                }),
                Ok(JobEvent::Failed {
                    job_id,
                    shop_type,
                    error_message,
                    processed_count,
                    failed_count,
                }) => webhook.post(WebhookEvent::JobFailed(JobFailedData {
                    job_id,
                    shop_type,
                    error_message,
                    processed_count,
                    failed_count,
                })),
                // job:cancelled and batch:* have no entry in spec.md §4.6's
                // event table; they stay internal-only.
                Ok(JobEvent::BatchStarted { .. })
                | Ok(JobEvent::BatchCompleted { .. })
                | Ok(JobEvent::Cancelled { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
