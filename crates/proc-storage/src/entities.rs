//! Persistent entities of spec.md §3.2, grouped per their owning table.

use crate::text_json::TextJson;
use chrono::{DateTime, Utc};
use proc_model::{ProductRecord, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// `raw.products`. Immutable once inserted; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawRow {
    pub id: Uuid,
    pub shop_type: String,
    /// The upstream scraper's job identifier, distinct from this engine's
    /// `processing_jobs.job_id`.
    pub job_id: String,
    pub raw_data: TextJson<Value>,
    pub scraped_at: DateTime<Utc>,
}

/// `staging.products`. Unique by `(shop_type, external_id)`; overwritten
/// each processing pass.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StagingRow {
    pub shop_type: String,
    pub external_id: String,
    pub raw_product_id: Uuid,
    pub name: String,
    pub price: f64,
    pub content_hash: String,
    pub data: TextJson<Value>,
    pub processed_at: DateTime<Utc>,
}

/// One staging write, as produced by the Batch Adapter.
#[derive(Debug, Clone)]
pub struct StagingUpsert {
    pub shop_type: String,
    pub external_id: String,
    pub raw_product_id: Uuid,
    pub name: String,
    pub price: f64,
    pub content_hash: String,
    pub data: Value,
}

/// `processed.products`. Unique by `(shop_type, external_id,
/// schema_version)`; upserted in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRow {
    pub record: ProductRecord,
    pub job_id: Uuid,
    pub raw_product_id: Uuid,
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One processed write, as produced by the Batch Adapter.
#[derive(Debug, Clone)]
pub struct ProcessedUpsert {
    pub record: ProductRecord,
    pub external_id: String,
    pub job_id: Uuid,
    pub raw_product_id: Uuid,
    pub schema_version: String,
    pub content_hash: String,
}

/// Outcome of upserting one `ProcessedUpsert` (spec.md §4.4 step 6): did
/// the store already hold a row with an identical `content_hash`?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Changed,
    Deduped,
}

/// `processing_jobs.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `processing_jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub shop_type: String,
    pub status: JobStatus,
    pub batch_size: i32,
    pub total_products: i64,
    pub processed_count: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub skipped_count: i64,
    pub deduped_count: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub metadata: Value,
}

/// Arguments to `Store::create_job`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub shop_type: String,
    pub batch_size: i32,
    pub metadata: Value,
}

/// Arbitrary-column-subset patch applied to a job in flight (spec.md §4.3
/// "patch (arbitrary column subset)"). `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub total_products: Option<i64>,
    pub processed_count: Option<i64>,
    pub success_count: Option<i64>,
    pub failed_count: Option<i64>,
    pub skipped_count: Option<i64>,
    pub deduped_count: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Arguments to `Store::complete_job` (spec.md §4.3 "complete").
#[derive(Debug, Clone)]
pub struct CompleteJob {
    pub status: JobStatus,
    pub total_products: i64,
    pub processed_count: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub skipped_count: i64,
    pub deduped_count: i64,
    pub duration_ms: i64,
    pub error_message: Option<String>,
}

/// Filters accepted by `Store::list_jobs`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub shop_type: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// `processing_errors`. `severity` is stored as text and converted at the
/// storage boundary (see `pg::ProcessingErrorSqlRow`) since `Severity`
/// lives in the I/O-free `proc-model` crate and doesn't implement `sqlx`'s
/// traits directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingErrorRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub raw_product_id: Option<Uuid>,
    pub product_id: Option<String>,
    pub shop_type: String,
    pub error_type: String,
    pub error_message: String,
    pub error_details: TextJson<Value>,
    pub stack_trace: Option<String>,
    pub severity: Severity,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// One error row to insert (spec.md §4.3 "batch insert in a single
/// transaction").
#[derive(Debug, Clone)]
pub struct NewProcessingError {
    pub job_id: Uuid,
    pub raw_product_id: Option<Uuid>,
    pub product_id: Option<String>,
    pub shop_type: String,
    pub error_type: String,
    pub error_message: String,
    pub error_details: Value,
    pub stack_trace: Option<String>,
    pub severity: Severity,
}

/// Paging filter on `Store::get_errors`.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Paging { limit: 50, offset: 0 }
    }
}

/// Filters accepted by `Store::list_processed`.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub shop_type: Option<String>,
    pub is_active: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

/// Result of `Store::compliance_rate` (spec.md §4.3 "Audit").
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub compliant: usize,
    pub total: usize,
    pub violations: Vec<proc_model::ValidationReport>,
}
