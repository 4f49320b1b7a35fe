//! The Storage Contract (spec.md §4.3): abstract relational operations
//! over the five tables of §3.2. `proc-engine` depends only on this trait;
//! `PgStore` (§`pg`) is the sole production implementation.

use crate::entities::*;
use crate::error::StorageResult;
use chrono::{DateTime, Utc};
use proc_model::{validate, ValidateOptions};
use serde_json::Value;
use uuid::Uuid;

/// Range-read filter on `Store::read_raw`.
#[derive(Debug, Clone, Default)]
pub struct RawRowFilter {
    pub shop_type: String,
    pub job_id: Option<String>,
    pub scraped_after: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // -- raw (read-only to the engine) -----------------------------------

    async fn read_raw(&self, filter: RawRowFilter) -> StorageResult<Vec<RawRow>>;
    async fn read_raw_by_id(&self, id: Uuid) -> StorageResult<Option<RawRow>>;

    // -- staging + processed + errors (single atomic batch write) --------

    /// Writes staging rows, processed rows, and error rows for one batch.
    /// MUST be committed atomically when the platform allows cross-table
    /// transactions (spec.md §4.3's transactional invariant); returns the
    /// per-row dedup outcome for each `processed` entry, in the same order.
    async fn commit_batch(
        &self,
        staging: &[StagingUpsert],
        processed: &[ProcessedUpsert],
        errors: &[NewProcessingError],
    ) -> StorageResult<Vec<UpsertOutcome>>;

    async fn get_processed(
        &self,
        shop_type: &str,
        external_id: &str,
        schema_version: &str,
    ) -> StorageResult<Option<ProcessedRow>>;

    async fn get_product_by_unified_id(&self, unified_id: &str) -> StorageResult<Option<ProcessedRow>>;

    async fn list_processed(&self, filter: ProductFilter) -> StorageResult<Vec<ProcessedRow>>;

    // -- jobs --------------------------------------------------------------

    async fn create_job(&self, job: NewJob) -> StorageResult<Job>;
    async fn patch_job(&self, job_id: Uuid, patch: JobPatch) -> StorageResult<()>;
    async fn complete_job(&self, job_id: Uuid, complete: CompleteJob) -> StorageResult<()>;
    async fn get_job(&self, job_id: Uuid) -> StorageResult<Option<Job>>;
    async fn list_jobs(&self, filter: JobFilter) -> StorageResult<Vec<Job>>;
    async fn get_active_jobs(&self) -> StorageResult<Vec<Job>>;

    // -- errors --------------------------------------------------------------

    async fn get_errors(&self, job_id: Uuid, paging: Paging) -> StorageResult<Vec<ProcessingErrorRow>>;
    async fn resolve_error(&self, id: Uuid) -> StorageResult<()>;

    // -- health --------------------------------------------------------------

    /// Transactionless connectivity probe (`SELECT 1`-equivalent). Never
    /// propagates the underlying error; advisory only.
    async fn ping(&self) -> bool;
    /// Begin + rollback probe, exercising transaction plumbing end to end.
    async fn probe_transaction(&self) -> bool;
}

/// `complianceRate(products) → (compliant, total, violations[])` (spec.md
/// §4.3 "Audit"). Implemented once here, against the pure `proc-model`
/// validator, so every `Store` implementation gets it for free.
pub fn compliance_rate(products: &[Value]) -> ComplianceReport {
    let mut compliant = 0;
    let mut violations = Vec::new();
    for product in products {
        let report = validate(product, ValidateOptions::default());
        if report.ok {
            compliant += 1;
        } else {
            violations.push(report);
        }
    }
    ComplianceReport {
        compliant,
        total: products.len(),
        violations,
    }
}
