//! The Batch Adapter (spec.md §4.4): given a slice of raw rows and job
//! context, produces canonical outputs and error rows through the shop
//! transformer and the structural validator, then writes the result
//! through the `Store` as a single atomic batch.

use proc_model::{content_hash, validate, ErrorKind, Severity, ShopType, ValidateOptions};
use proc_storage::{NewProcessingError, ProcessedUpsert, RawRow, StagingUpsert, Store, UpsertOutcome};
use proc_transform::{Registry, TransformOutcome, Transformer};
use std::sync::Arc;
use uuid::Uuid;

/// Per-job configuration the adapter needs to process one batch (spec.md
/// §4.4 "Inputs").
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: Uuid,
    pub shop_type: ShopType,
    pub enforce_structure: bool,
    pub schema_version: String,
}

/// `processBatch(batch) → BatchResult` (spec.md §4.4 "Output"), minus the
/// `processed_products`/`staging_products` payloads the spec lists for
/// observability: those already live in `Store` once committed, so the
/// adapter returns only the counters and error rows a caller needs to
/// update job progress.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub processed: i64,
    pub success: i64,
    pub failed: i64,
    pub skipped: i64,
    pub deduped: i64,
    pub errors: Vec<NewProcessingError>,
}

/// Batch-level failure: either the shop transformer couldn't be resolved
/// (a fatal *initialization* error, spec.md §4.4 step 1, distinct from any
/// row-level failure) or the atomic commit itself failed
/// (`DATABASE_ERROR`, spec.md §7).
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("no transformer registered for shop {0}")]
    UnknownShop(ShopType),
    #[error("batch commit failed: {0}")]
    Storage(#[from] proc_storage::StorageError),
}

/// A typed `ProductRecord` can't carry extra fields, so the compliance
/// audit's type/presence check (proc_storage::compliance_rate) can never
/// fail against one. The semantic invariants of spec.md §3.1 (I2, I4) can
/// still be violated by a misbehaving transformer, so the structure
/// enforcement gate (spec.md §4.4 step 4) checks those here too.
fn violates_record_invariants(record: &proc_model::ProductRecord) -> bool {
    let i2 = record.is_promotion && record.current_price > record.price_before_bonus;
    let i4 = (record.promotion_type == "none") == record.is_promotion;
    i2 || i4
}

/// `OUTPUT_TARGET` (spec.md §6.3): which of the two write destinations a
/// batch's accepted rows land in. `Staging` only feeds the dedup/content-hash
/// table; `Processed` only feeds the canonical product table; `Both` (the
/// default) writes both in the same atomic commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTarget {
    Staging,
    Processed,
    #[default]
    Both,
}

impl std::str::FromStr for OutputTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" => Ok(OutputTarget::Staging),
            "processed" => Ok(OutputTarget::Processed),
            "both" => Ok(OutputTarget::Both),
            other => Err(format!("unknown OUTPUT_TARGET {other:?}, expected staging|processed|both")),
        }
    }
}

pub struct BatchAdapter {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    output_target: OutputTarget,
}

impl BatchAdapter {
    pub fn new(store: Arc<dyn Store>, registry: Arc<Registry>) -> Self {
        BatchAdapter { store, registry, output_target: OutputTarget::default() }
    }

    pub fn with_output_target(mut self, output_target: OutputTarget) -> Self {
        self.output_target = output_target;
        self
    }

    /// `raw_data` that signals the upstream scraper explicitly declined to
    /// supply a payload for this row (spec.md §9 open question (b):
    /// `skipped_count` is the count of rows the transformer was never
    /// asked to process, distinct from rows it tried and failed).
    fn is_explicitly_skipped(row: &RawRow) -> bool {
        match &row.raw_data.0 {
            serde_json::Value::Null => true,
            serde_json::Value::Object(obj) => obj.is_empty(),
            _ => false,
        }
    }

    pub async fn process_batch(
        &self,
        ctx: &JobContext,
        rows: &[RawRow],
    ) -> Result<BatchOutcome, BatchError> {
        let transformer = self
            .registry
            .get(ctx.shop_type)
            .ok_or(BatchError::UnknownShop(ctx.shop_type))?;

        let mut skipped = 0i64;
        let mut errors = Vec::new();
        // Rows that passed transformation + validation, carried alongside
        // the raw row they came from for the eventual staging/processed
        // writes (spec.md §4.5 "row outcomes... reported to Storage in the
        // raw-row input order").
        let mut accepted: Vec<(&RawRow, String, proc_model::ProductRecord)> = Vec::new();

        for row in rows {
            if Self::is_explicitly_skipped(row) {
                skipped += 1;
                continue;
            }

            match transformer.transform(&row.raw_data, &ctx.schema_version) {
                TransformOutcome::Err(err) => {
                    errors.push(NewProcessingError {
                        job_id: ctx.job_id,
                        raw_product_id: Some(row.id),
                        product_id: None,
                        shop_type: ctx.shop_type.to_string(),
                        error_type: err.kind.as_str().to_string(),
                        error_message: err.message.clone(),
                        error_details: serde_json::json!({ "raw_product_id": row.id }),
                        stack_trace: None,
                        severity: err.severity,
                    });
                }
                TransformOutcome::Ok { record, external_id } => {
                    let report = validate(&record.to_value(), ValidateOptions::default());
                    if report.ok {
                        accepted.push((row, external_id, record));
                    } else {
                        let missing_required = !report.missing.is_empty();
                        errors.push(NewProcessingError {
                            job_id: ctx.job_id,
                            raw_product_id: Some(row.id),
                            product_id: Some(external_id),
                            shop_type: ctx.shop_type.to_string(),
                            error_type: ErrorKind::ValidationError.as_str().to_string(),
                            error_message: format!(
                                "structural validation failed: missing={:?} extras={:?} type_errors={:?}",
                                report.missing, report.extras, report.type_errors
                            ),
                            error_details: serde_json::to_value(&report).unwrap_or_default(),
                            stack_trace: None,
                            severity: ErrorKind::ValidationError.severity(missing_required),
                        });
                    }
                }
            }
        }

        let values: Vec<serde_json::Value> = accepted.iter().map(|(_, _, r)| r.to_value()).collect();
        let compliance = proc_storage::compliance_rate(&values);
        let invariant_violations = accepted
            .iter()
            .filter(|(_, _, record)| violates_record_invariants(record))
            .count();

        if ctx.enforce_structure && (!compliance.violations.is_empty() || invariant_violations > 0) {
            // Step 4: structure enforcement failed. No partial writes: every
            // row this batch would otherwise have written becomes a
            // STRUCTURE_VIOLATION error instead (spec.md §4.4 step 4, §8 S4).
            for (row, external_id, _) in &accepted {
                errors.push(NewProcessingError {
                    job_id: ctx.job_id,
                    raw_product_id: Some(row.id),
                    product_id: Some(external_id.clone()),
                    shop_type: ctx.shop_type.to_string(),
                    error_type: ErrorKind::StructureViolation.as_str().to_string(),
                    error_message: "record failed structural compliance audit".to_string(),
                    error_details: serde_json::json!({ "violations": compliance.violations.len() }),
                    stack_trace: None,
                    severity: Severity::Critical,
                });
            }

            self.store.commit_batch(&[], &[], &errors).await?;

            return Ok(BatchOutcome {
                processed: rows.len() as i64,
                success: 0,
                failed: (rows.len() as i64) - skipped,
                skipped,
                deduped: 0,
                errors,
            });
        }

        let write_staging = matches!(self.output_target, OutputTarget::Staging | OutputTarget::Both);
        let write_processed = matches!(self.output_target, OutputTarget::Processed | OutputTarget::Both);
        let mut staging = Vec::with_capacity(if write_staging { accepted.len() } else { 0 });
        let mut processed = Vec::with_capacity(if write_processed { accepted.len() } else { 0 });
        for (row, external_id, record) in &accepted {
            let hash = content_hash(&record.to_value());
            if write_staging {
                staging.push(StagingUpsert {
                    shop_type: ctx.shop_type.to_string(),
                    external_id: external_id.clone(),
                    raw_product_id: row.id,
                    name: record.title.clone(),
                    price: record.current_price,
                    content_hash: hash.clone(),
                    data: record.to_value(),
                });
            }
            if write_processed {
                processed.push(ProcessedUpsert {
                    record: record.clone(),
                    external_id: external_id.clone(),
                    job_id: ctx.job_id,
                    raw_product_id: row.id,
                    schema_version: ctx.schema_version.clone(),
                    content_hash: hash,
                });
            }
        }

        let outcomes = self.store.commit_batch(&staging, &processed, &errors).await?;

        let deduped = outcomes.iter().filter(|o| **o == UpsertOutcome::Deduped).count() as i64;

        Ok(BatchOutcome {
            processed: rows.len() as i64,
            success: accepted.len() as i64,
            failed: (rows.len() as i64) - skipped - accepted.len() as i64,
            skipped,
            deduped,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proc_storage::test_support::MemoryStore;
    use serde_json::json;

    fn raw_row(raw_data: serde_json::Value) -> RawRow {
        RawRow {
            id: Uuid::new_v4(),
            shop_type: "ah".to_string(),
            job_id: "scraper-job-1".to_string(),
            raw_data: proc_storage::TextJson(raw_data),
            scraped_at: Utc::now(),
        }
    }

    fn adapter(store: Arc<dyn Store>) -> BatchAdapter {
        BatchAdapter::new(store, Arc::new(Registry::default()))
    }

    fn ctx(job_id: Uuid) -> JobContext {
        JobContext {
            job_id,
            shop_type: ShopType::Ah,
            enforce_structure: false,
            schema_version: "1.0.0".to_string(),
        }
    }

    #[tokio::test]
    async fn s1_happy_path_single_row() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let adapter = adapter(store.clone());
        let row = raw_row(json!({
            "webshopId": 1010,
            "title": "Milk 1L",
            "currentPrice": 1.29,
            "priceBeforeBonus": 1.49,
            "brand": "B",
            "salesUnitSize": "1l",
            "shopType": "AH",
            "images": [{"url": "u", "width": 300}],
            "mainCategory": "Dairy",
            "orderAvailabilityStatus": "IN_ASSORTMENT",
        }));
        let job_id = Uuid::new_v4();
        let outcome = adapter.process_batch(&ctx(job_id), &[row]).await.unwrap();

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.success, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.skipped, 0);
        assert!(outcome.errors.is_empty());

        let product = store
            .get_processed("ah", "1010", "1.0.0")
            .await
            .unwrap()
            .expect("processed row written");
        assert_eq!(product.record.unified_id, "ah_1010_1.0.0");
        assert!(product.record.is_active);
        assert!(!product.record.is_promotion);
        assert_eq!(product.record.promotion_type, "none");
    }

    #[tokio::test]
    async fn s2_missing_required_field_becomes_high_severity_error() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let adapter = adapter(store.clone());
        let row = raw_row(json!({
            "webshopId": 2020,
            "title": null,
            "currentPrice": 1.0,
            "shopType": "AH",
        }));
        let raw_id = row.id;
        let job_id = Uuid::new_v4();
        let outcome = adapter.process_batch(&ctx(job_id), &[row]).await.unwrap();

        assert_eq!(outcome.success, 0);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].error_type, "VALIDATION_ERROR");
        assert_eq!(outcome.errors[0].severity, Severity::High);
        assert_eq!(outcome.errors[0].raw_product_id, Some(raw_id));

        let product = store.get_processed("ah", "2020", "1.0.0").await.unwrap();
        assert!(product.is_none());
    }

    /// A transformer that always emits a record violating invariant I4
    /// (`promotion_type="none"` while `is_promotion=true`), standing in for
    /// spec.md §8 S4's "transformer emits an extra field" since a typed
    /// `ProductRecord` can't literally carry one.
    struct NonCompliantTransformer;

    impl Transformer for NonCompliantTransformer {
        fn shop_type(&self) -> ShopType {
            ShopType::Ah
        }

        fn extract_external_id(&self, raw_data: &serde_json::Value) -> Option<String> {
            raw_data.get("webshopId").map(|v| v.to_string())
        }

        fn transform(&self, raw_data: &serde_json::Value, schema_version: &str) -> TransformOutcome {
            let external_id = self.extract_external_id(raw_data).unwrap();
            let record = proc_model::ProductRecord {
                unified_id: proc_model::unified_id("ah", &external_id, schema_version),
                shop_type: "ah".to_string(),
                title: "Cheese".to_string(),
                is_promotion: true,
                promotion_type: "none".to_string(),
                ..proc_model::ProductRecord::default()
            };
            TransformOutcome::Ok { record, external_id }
        }
    }

    #[tokio::test]
    async fn s4_structure_enforcement_fails_whole_batch() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let adapter = BatchAdapter::new(
            store.clone(),
            Arc::new(Registry::single(ShopType::Ah, Box::new(NonCompliantTransformer))),
        );
        let row = raw_row(json!({ "webshopId": 3030 }));
        let raw_id = row.id;

        let mut enforcing_ctx = ctx(Uuid::new_v4());
        enforcing_ctx.enforce_structure = true;
        let outcome = adapter.process_batch(&enforcing_ctx, &[row]).await.unwrap();

        assert_eq!(outcome.success, 0);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].error_type, "STRUCTURE_VIOLATION");
        assert_eq!(outcome.errors[0].severity, Severity::Critical);
        assert_eq!(outcome.errors[0].raw_product_id, Some(raw_id));

        let product = store.get_processed("ah", "3030", "1.0.0").await.unwrap();
        assert!(product.is_none(), "structure violation must not write processed rows");
    }

    #[tokio::test]
    async fn s4_same_violation_without_enforcement_is_written_and_audited() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let adapter = BatchAdapter::new(
            store.clone(),
            Arc::new(Registry::single(ShopType::Ah, Box::new(NonCompliantTransformer))),
        );
        let row = raw_row(json!({ "webshopId": 4040 }));

        let lenient_ctx = ctx(Uuid::new_v4());
        let outcome = adapter.process_batch(&lenient_ctx, &[row]).await.unwrap();

        assert_eq!(outcome.success, 1);
        assert!(outcome.errors.is_empty());
        let product = store.get_processed("ah", "4040", "1.0.0").await.unwrap();
        assert!(product.is_some());
    }

    #[tokio::test]
    async fn skipped_row_is_neither_success_nor_failure() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let adapter = adapter(store.clone());
        let row = raw_row(json!({}));
        let outcome = adapter.process_batch(&ctx(Uuid::new_v4()), &[row]).await.unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.success, 0);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn s6_rerun_same_row_dedupes() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let adapter = adapter(store.clone());
        let row = raw_row(json!({
            "webshopId": 1010,
            "title": "Milk 1L",
            "currentPrice": 1.29,
            "priceBeforeBonus": 1.49,
            "brand": "B",
            "salesUnitSize": "1l",
            "shopType": "AH",
            "orderAvailabilityStatus": "IN_ASSORTMENT",
        }));

        let first = adapter.process_batch(&ctx(Uuid::new_v4()), &[row.clone()]).await.unwrap();
        assert_eq!(first.success, 1);
        assert_eq!(first.deduped, 0);

        let second = adapter.process_batch(&ctx(Uuid::new_v4()), &[row]).await.unwrap();
        assert_eq!(second.success, 1);
        assert_eq!(second.deduped, 1);
    }
}
