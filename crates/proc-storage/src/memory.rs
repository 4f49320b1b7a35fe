//! `MemoryStore`: an in-memory `Store` test double, so integration tests
//! (spec.md §8 scenarios S1-S6) run without a live Postgres instance.
//! Grounded on the teacher pack's `control-plane-api` `test-support`
//! feature pattern: a thin, fully-synchronous stand-in behind the same
//! trait the production code depends on.

use crate::entities::*;
use crate::error::StorageResult;
use crate::store::{RawRowFilter, Store};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    raw: Vec<RawRow>,
    staging: HashMap<(String, String), StagingRow>,
    processed: HashMap<(String, String, String), ProcessedRow>,
    jobs: HashMap<Uuid, Job>,
    errors: Vec<ProcessingErrorRow>,
}

/// In-memory `Store`. `seed_raw` is the only way to populate `raw.products`
/// since the engine treats that table as read-only and upstream-owned.
#[derive(Default)]
pub struct MemoryStore(Mutex<Inner>);

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn seed_raw(&self, rows: Vec<RawRow>) {
        self.0.lock().unwrap().raw = rows;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read_raw(&self, filter: RawRowFilter) -> StorageResult<Vec<RawRow>> {
        let inner = self.0.lock().unwrap();
        let mut rows: Vec<RawRow> = inner
            .raw
            .iter()
            .filter(|r| r.shop_type == filter.shop_type)
            .filter(|r| filter.job_id.as_deref().map(|j| j == r.job_id).unwrap_or(true))
            .filter(|r| filter.scraped_after.map(|after| r.scraped_at > after).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.scraped_at);
        let start = filter.offset.max(0) as usize;
        let end = if filter.limit <= 0 {
            rows.len()
        } else {
            (start + filter.limit as usize).min(rows.len())
        };
        Ok(rows.get(start..end).unwrap_or_default().to_vec())
    }

    async fn read_raw_by_id(&self, id: Uuid) -> StorageResult<Option<RawRow>> {
        Ok(self.0.lock().unwrap().raw.iter().find(|r| r.id == id).cloned())
    }

    async fn commit_batch(
        &self,
        staging: &[StagingUpsert],
        processed: &[ProcessedUpsert],
        errors: &[NewProcessingError],
    ) -> StorageResult<Vec<UpsertOutcome>> {
        let mut inner = self.0.lock().unwrap();
        let now = Utc::now();

        for s in staging {
            inner.staging.insert(
                (s.shop_type.clone(), s.external_id.clone()),
                StagingRow {
                    shop_type: s.shop_type.clone(),
                    external_id: s.external_id.clone(),
                    raw_product_id: s.raw_product_id,
                    name: s.name.clone(),
                    price: s.price,
                    content_hash: s.content_hash.clone(),
                    data: crate::text_json::TextJson(s.data.clone()),
                    processed_at: now,
                },
            );
        }

        let mut outcomes = Vec::with_capacity(processed.len());
        for p in processed {
            let key = (p.record.shop_type.clone(), p.external_id.clone(), p.schema_version.clone());
            let outcome = match inner.processed.get(&key) {
                None => UpsertOutcome::Inserted,
                Some(existing) if existing_hash(existing) == p.content_hash => UpsertOutcome::Deduped,
                Some(_) => UpsertOutcome::Changed,
            };
            let created_at = inner.processed.get(&key).map(|r| r.created_at).unwrap_or(now);
            inner.processed.insert(
                key,
                ProcessedRow {
                    record: p.record.clone(),
                    job_id: p.job_id,
                    raw_product_id: p.raw_product_id,
                    schema_version: p.schema_version.clone(),
                    created_at,
                    updated_at: now,
                },
            );
            outcomes.push(outcome);
        }

        for e in errors {
            inner.errors.push(ProcessingErrorRow {
                id: Uuid::new_v4(),
                job_id: e.job_id,
                raw_product_id: e.raw_product_id,
                product_id: e.product_id.clone(),
                shop_type: e.shop_type.clone(),
                error_type: e.error_type.clone(),
                error_message: e.error_message.clone(),
                error_details: crate::text_json::TextJson(e.error_details.clone()),
                stack_trace: e.stack_trace.clone(),
                severity: e.severity,
                is_resolved: false,
                created_at: now,
            });
        }

        Ok(outcomes)
    }

    async fn get_processed(
        &self,
        shop_type: &str,
        external_id: &str,
        schema_version: &str,
    ) -> StorageResult<Option<ProcessedRow>> {
        let key = (shop_type.to_string(), external_id.to_string(), schema_version.to_string());
        Ok(self.0.lock().unwrap().processed.get(&key).cloned())
    }

    async fn get_product_by_unified_id(&self, unified_id: &str) -> StorageResult<Option<ProcessedRow>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .processed
            .values()
            .find(|r| r.record.unified_id == unified_id)
            .cloned())
    }

    async fn list_processed(&self, filter: ProductFilter) -> StorageResult<Vec<ProcessedRow>> {
        let inner = self.0.lock().unwrap();
        let mut rows: Vec<ProcessedRow> = inner
            .processed
            .values()
            .filter(|r| filter.shop_type.as_deref().map(|s| s == r.record.shop_type).unwrap_or(true))
            .filter(|r| filter.is_active.map(|a| a == r.record.is_active).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.updated_at);
        rows.reverse();
        let start = filter.offset.max(0) as usize;
        let end = if filter.limit <= 0 {
            rows.len()
        } else {
            (start + filter.limit as usize).min(rows.len())
        };
        Ok(rows.get(start..end).unwrap_or_default().to_vec())
    }

    async fn create_job(&self, job: NewJob) -> StorageResult<Job> {
        let mut inner = self.0.lock().unwrap();
        let job_id = Uuid::new_v4();
        let record = Job {
            job_id,
            shop_type: job.shop_type,
            status: JobStatus::Pending,
            batch_size: job.batch_size,
            total_products: 0,
            processed_count: 0,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            deduped_count: 0,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error_message: None,
            metadata: job.metadata,
        };
        inner.jobs.insert(job_id, record.clone());
        Ok(record)
    }

    async fn patch_job(&self, job_id: Uuid, patch: JobPatch) -> StorageResult<()> {
        let mut inner = self.0.lock().unwrap();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            if let Some(v) = patch.status {
                job.status = v;
            }
            if let Some(v) = patch.total_products {
                job.total_products = v;
            }
            if let Some(v) = patch.processed_count {
                job.processed_count = v;
            }
            if let Some(v) = patch.success_count {
                job.success_count = v;
            }
            if let Some(v) = patch.failed_count {
                job.failed_count = v;
            }
            if let Some(v) = patch.skipped_count {
                job.skipped_count = v;
            }
            if let Some(v) = patch.deduped_count {
                job.deduped_count = v;
            }
            if let Some(v) = patch.started_at {
                job.started_at = Some(v);
            }
            if let Some(v) = patch.error_message {
                job.error_message = Some(v);
            }
        }
        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid, complete: CompleteJob) -> StorageResult<()> {
        let mut inner = self.0.lock().unwrap();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.status = complete.status;
            job.total_products = complete.total_products;
            job.processed_count = complete.processed_count;
            job.success_count = complete.success_count;
            job.failed_count = complete.failed_count;
            job.skipped_count = complete.skipped_count;
            job.deduped_count = complete.deduped_count;
            job.duration_ms = Some(complete.duration_ms);
            job.error_message = complete.error_message;
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> StorageResult<Option<Job>> {
        Ok(self.0.lock().unwrap().jobs.get(&job_id).cloned())
    }

    async fn list_jobs(&self, filter: JobFilter) -> StorageResult<Vec<Job>> {
        let inner = self.0.lock().unwrap();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| filter.shop_type.as_deref().map(|s| s == j.shop_type).unwrap_or(true))
            .filter(|j| filter.status.map(|s| s == j.status).unwrap_or(true))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs.reverse();
        let start = filter.offset.max(0) as usize;
        let end = if filter.limit <= 0 {
            jobs.len()
        } else {
            (start + filter.limit as usize).min(jobs.len())
        };
        Ok(jobs.get(start..end).unwrap_or_default().to_vec())
    }

    async fn get_active_jobs(&self) -> StorageResult<Vec<Job>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .jobs
            .values()
            .filter(|j| matches!(j.status, JobStatus::Pending | JobStatus::Running))
            .cloned()
            .collect())
    }

    async fn get_errors(&self, job_id: Uuid, paging: Paging) -> StorageResult<Vec<ProcessingErrorRow>> {
        let inner = self.0.lock().unwrap();
        let mut rows: Vec<ProcessingErrorRow> =
            inner.errors.iter().filter(|e| e.job_id == job_id).cloned().collect();
        rows.sort_by_key(|e| e.created_at);
        let start = paging.offset.max(0) as usize;
        let end = if paging.limit <= 0 {
            rows.len()
        } else {
            (start + paging.limit as usize).min(rows.len())
        };
        Ok(rows.get(start..end).unwrap_or_default().to_vec())
    }

    async fn resolve_error(&self, id: Uuid) -> StorageResult<()> {
        let mut inner = self.0.lock().unwrap();
        if let Some(e) = inner.errors.iter_mut().find(|e| e.id == id) {
            e.is_resolved = true;
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn probe_transaction(&self) -> bool {
        true
    }
}

fn existing_hash(row: &ProcessedRow) -> String {
    // Stored processed rows don't separately retain their content_hash in
    // the in-memory model (unlike the Postgres table); recompute it the
    // same way the Batch Adapter does, over the canonical record value.
    proc_model::content_hash(&row.record.to_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_and_fetch_job_roundtrips() {
        let store = MemoryStore::new();
        let job = store
            .create_job(NewJob {
                shop_type: "ah".to_string(),
                batch_size: 100,
                metadata: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let fetched = store.get_job(job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched.job_id, job.job_id);
    }

    #[tokio::test]
    async fn second_commit_with_same_record_is_deduped() {
        let store = MemoryStore::new();
        let record = proc_model::new_template(Some(&json!({
            "unified_id": "ah_1_1.0.0",
            "shop_type": "ah",
            "title": "x",
        })));
        let upsert = ProcessedUpsert {
            record: record.clone(),
            external_id: "1".to_string(),
            job_id: Uuid::new_v4(),
            raw_product_id: Uuid::new_v4(),
            schema_version: "1.0.0".to_string(),
            content_hash: proc_model::content_hash(&record.to_value()),
        };
        let first = store.commit_batch(&[], &[upsert.clone()], &[]).await.unwrap();
        assert_eq!(first, vec![UpsertOutcome::Inserted]);
        let second = store.commit_batch(&[], &[upsert], &[]).await.unwrap();
        assert_eq!(second, vec![UpsertOutcome::Deduped]);
    }
}
