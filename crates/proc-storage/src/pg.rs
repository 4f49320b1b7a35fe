//! `PgStore`: the sole production `Store` implementation, built on
//! `sqlx::PgPool` (spec.md §4.3). Modeled directly on
//! `agent-sql::controllers`/`agent-sql::publications`'s use of explicit
//! transactions (`pool.begin().await?` ... `txn.commit().await?`) and a
//! `TextJson<T>` wrapper for opaque JSON columns.

use crate::entities::*;
use crate::error::{StorageError, StorageResult};
use crate::store::{RawRowFilter, Store};
use crate::text_json::TextJson;
use async_trait::async_trait;
use chrono::Utc;
use proc_model::Severity;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

fn severity_to_text(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn severity_from_text(s: &str) -> Severity {
    match s {
        "low" => Severity::Low,
        "high" => Severity::High,
        "critical" => Severity::Critical,
        _ => Severity::Medium,
    }
}

#[derive(sqlx::FromRow)]
struct ProcessingErrorSqlRow {
    id: Uuid,
    job_id: Uuid,
    raw_product_id: Option<Uuid>,
    product_id: Option<String>,
    shop_type: String,
    error_type: String,
    error_message: String,
    error_details: TextJson<Value>,
    stack_trace: Option<String>,
    severity: String,
    is_resolved: bool,
    created_at: chrono::DateTime<Utc>,
}

impl From<ProcessingErrorSqlRow> for ProcessingErrorRow {
    fn from(r: ProcessingErrorSqlRow) -> Self {
        ProcessingErrorRow {
            id: r.id,
            job_id: r.job_id,
            raw_product_id: r.raw_product_id,
            product_id: r.product_id,
            shop_type: r.shop_type,
            error_type: r.error_type,
            error_message: r.error_message,
            error_details: r.error_details,
            stack_trace: r.stack_trace,
            severity: severity_from_text(&r.severity),
            is_resolved: r.is_resolved,
            created_at: r.created_at,
        }
    }
}

fn job_from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<Job> {
    Ok(Job {
        job_id: row.try_get("job_id")?,
        shop_type: row.try_get("shop_type")?,
        status: row.try_get("status")?,
        batch_size: row.try_get("batch_size")?,
        total_products: row.try_get("total_products")?,
        processed_count: row.try_get("processed_count")?,
        success_count: row.try_get("success_count")?,
        failed_count: row.try_get("failed_count")?,
        skipped_count: row.try_get("skipped_count")?,
        deduped_count: row.try_get("deduped_count")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_ms: row.try_get("duration_ms")?,
        error_message: row.try_get("error_message")?,
        metadata: row.try_get::<TextJson<Value>, _>("metadata")?.0,
    })
}

fn processed_from_row(row: &sqlx::postgres::PgRow) -> sqlx::Result<ProcessedRow> {
    let record_value: TextJson<Value> = row.try_get("record")?;
    let record: proc_model::ProductRecord = serde_json::from_value(record_value.0)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(ProcessedRow {
        record,
        job_id: row.try_get("job_id")?,
        raw_product_id: row.try_get("raw_product_id")?,
        schema_version: row.try_get("schema_version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn read_raw(&self, filter: RawRowFilter) -> StorageResult<Vec<RawRow>> {
        let rows = sqlx::query_as::<Postgres, RawRow>(
            r#"select id, shop_type, job_id, raw_data, scraped_at
               from raw.products
               where shop_type = $1
                 and ($2::text is null or job_id = $2)
                 and ($3::timestamptz is null or scraped_at > $3)
               order by scraped_at asc
               limit $4 offset $5"#,
        )
        .bind(&filter.shop_type)
        .bind(&filter.job_id)
        .bind(filter.scraped_after)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn read_raw_by_id(&self, id: Uuid) -> StorageResult<Option<RawRow>> {
        let row = sqlx::query_as::<Postgres, RawRow>(
            r#"select id, shop_type, job_id, raw_data, scraped_at from raw.products where id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn commit_batch(
        &self,
        staging: &[StagingUpsert],
        processed: &[ProcessedUpsert],
        errors: &[NewProcessingError],
    ) -> StorageResult<Vec<UpsertOutcome>> {
        // Staging + processed in one transaction; errors in a second, per
        // spec.md §4.3's "engine MAY split into two transactions" escape
        // hatch. The batch is not acknowledged to the Job Manager (this
        // function does not return) until both succeed.
        let mut txn = self.pool.begin().await?;

        for s in staging {
            sqlx::query(
                r#"insert into staging.products
                     (shop_type, external_id, raw_product_id, name, price, content_hash, data, processed_at)
                   values ($1, $2, $3, $4, $5, $6, $7, now())
                   on conflict (shop_type, external_id) do update set
                     raw_product_id = excluded.raw_product_id,
                     name = excluded.name,
                     price = excluded.price,
                     content_hash = excluded.content_hash,
                     data = excluded.data,
                     processed_at = now()"#,
            )
            .bind(&s.shop_type)
            .bind(&s.external_id)
            .bind(s.raw_product_id)
            .bind(&s.name)
            .bind(s.price)
            .bind(&s.content_hash)
            .bind(TextJson(s.data.clone()))
            .execute(&mut *txn)
            .await?;
        }

        let mut outcomes = Vec::with_capacity(processed.len());
        for p in processed {
            let existing: Option<(String,)> = sqlx::query_as(
                r#"select content_hash from processed.products
                   where shop_type = $1 and external_id = $2 and schema_version = $3"#,
            )
            .bind(&p.record.shop_type)
            .bind(&p.external_id)
            .bind(&p.schema_version)
            .fetch_optional(&mut *txn)
            .await?;

            let outcome = match &existing {
                None => UpsertOutcome::Inserted,
                Some((hash,)) if hash == &p.content_hash => UpsertOutcome::Deduped,
                Some(_) => UpsertOutcome::Changed,
            };

            let record_value =
                serde_json::to_value(&p.record).expect("ProductRecord always serializes");
            sqlx::query(
                r#"insert into processed.products
                     (unified_id, shop_type, external_id, schema_version, job_id, raw_product_id,
                      content_hash, record, created_at, updated_at)
                   values ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
                   on conflict (shop_type, external_id, schema_version) do update set
                     job_id = excluded.job_id,
                     raw_product_id = excluded.raw_product_id,
                     content_hash = excluded.content_hash,
                     record = excluded.record,
                     updated_at = now()"#,
            )
            .bind(&p.record.unified_id)
            .bind(&p.record.shop_type)
            .bind(&p.external_id)
            .bind(&p.schema_version)
            .bind(p.job_id)
            .bind(p.raw_product_id)
            .bind(&p.content_hash)
            .bind(TextJson(record_value))
            .execute(&mut *txn)
            .await?;

            outcomes.push(outcome);
        }

        txn.commit().await?;

        if !errors.is_empty() {
            let mut txn = self.pool.begin().await?;
            for e in errors {
                sqlx::query(
                    r#"insert into processing_errors
                         (id, job_id, raw_product_id, product_id, shop_type, error_type,
                          error_message, error_details, stack_trace, severity, is_resolved, created_at)
                       values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, false, now())"#,
                )
                .bind(Uuid::new_v4())
                .bind(e.job_id)
                .bind(e.raw_product_id)
                .bind(&e.product_id)
                .bind(&e.shop_type)
                .bind(&e.error_type)
                .bind(&e.error_message)
                .bind(TextJson(e.error_details.clone()))
                .bind(&e.stack_trace)
                .bind(severity_to_text(e.severity))
                .execute(&mut *txn)
                .await?;
            }
            txn.commit().await?;
        }

        Ok(outcomes)
    }

    async fn get_processed(
        &self,
        shop_type: &str,
        external_id: &str,
        schema_version: &str,
    ) -> StorageResult<Option<ProcessedRow>> {
        let row = sqlx::query(
            r#"select job_id, raw_product_id, schema_version, record, created_at, updated_at
               from processed.products
               where shop_type = $1 and external_id = $2 and schema_version = $3"#,
        )
        .bind(shop_type)
        .bind(external_id)
        .bind(schema_version)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(processed_from_row).transpose().map_err(StorageError::from)
    }

    async fn get_product_by_unified_id(&self, unified_id: &str) -> StorageResult<Option<ProcessedRow>> {
        let row = sqlx::query(
            r#"select job_id, raw_product_id, schema_version, record, created_at, updated_at
               from processed.products where unified_id = $1"#,
        )
        .bind(unified_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(processed_from_row).transpose().map_err(StorageError::from)
    }

    async fn list_processed(&self, filter: ProductFilter) -> StorageResult<Vec<ProcessedRow>> {
        let rows = sqlx::query(
            r#"select job_id, raw_product_id, schema_version, record, created_at, updated_at
               from processed.products
               where ($1::text is null or shop_type = $1)
                 and ($2::bool is null or (record->>'is_active')::bool = $2)
               order by updated_at desc
               limit $3 offset $4"#,
        )
        .bind(&filter.shop_type)
        .bind(filter.is_active)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(processed_from_row)
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(StorageError::from)
    }

    async fn create_job(&self, job: NewJob) -> StorageResult<Job> {
        let job_id = Uuid::new_v4();
        let row = sqlx::query(
            r#"insert into processing_jobs
                 (job_id, shop_type, status, batch_size, total_products, processed_count,
                  success_count, failed_count, skipped_count, deduped_count, metadata)
               values ($1, $2, 'pending', $3, 0, 0, 0, 0, 0, 0, $4)
               returning job_id, shop_type, status, batch_size, total_products, processed_count,
                 success_count, failed_count, skipped_count, deduped_count, started_at,
                 completed_at, duration_ms, error_message, metadata"#,
        )
        .bind(job_id)
        .bind(&job.shop_type)
        .bind(job.batch_size)
        .bind(TextJson(job.metadata))
        .fetch_one(&self.pool)
        .await?;
        job_from_row(&row).map_err(StorageError::from)
    }

    async fn patch_job(&self, job_id: Uuid, patch: JobPatch) -> StorageResult<()> {
        sqlx::query(
            r#"update processing_jobs set
                 status = coalesce($2, status),
                 total_products = coalesce($3, total_products),
                 processed_count = coalesce($4, processed_count),
                 success_count = coalesce($5, success_count),
                 failed_count = coalesce($6, failed_count),
                 skipped_count = coalesce($7, skipped_count),
                 deduped_count = coalesce($8, deduped_count),
                 started_at = coalesce($9, started_at),
                 error_message = coalesce($10, error_message)
               where job_id = $1"#,
        )
        .bind(job_id)
        .bind(patch.status)
        .bind(patch.total_products)
        .bind(patch.processed_count)
        .bind(patch.success_count)
        .bind(patch.failed_count)
        .bind(patch.skipped_count)
        .bind(patch.deduped_count)
        .bind(patch.started_at)
        .bind(patch.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid, complete: CompleteJob) -> StorageResult<()> {
        sqlx::query(
            r#"update processing_jobs set
                 status = $2,
                 total_products = $3,
                 processed_count = $4,
                 success_count = $5,
                 failed_count = $6,
                 skipped_count = $7,
                 deduped_count = $8,
                 duration_ms = $9,
                 error_message = $10,
                 completed_at = now()
               where job_id = $1"#,
        )
        .bind(job_id)
        .bind(complete.status)
        .bind(complete.total_products)
        .bind(complete.processed_count)
        .bind(complete.success_count)
        .bind(complete.failed_count)
        .bind(complete.skipped_count)
        .bind(complete.deduped_count)
        .bind(complete.duration_ms)
        .bind(complete.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> StorageResult<Option<Job>> {
        let row = sqlx::query(
            r#"select job_id, shop_type, status, batch_size, total_products, processed_count,
                 success_count, failed_count, skipped_count, deduped_count, started_at,
                 completed_at, duration_ms, error_message, metadata
               from processing_jobs where job_id = $1"#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(job_from_row).transpose().map_err(StorageError::from)
    }

    async fn list_jobs(&self, filter: JobFilter) -> StorageResult<Vec<Job>> {
        let rows = sqlx::query(
            r#"select job_id, shop_type, status, batch_size, total_products, processed_count,
                 success_count, failed_count, skipped_count, deduped_count, started_at,
                 completed_at, duration_ms, error_message, metadata
               from processing_jobs
               where ($1::text is null or shop_type = $1)
                 and ($2::job_status is null or status = $2)
               order by started_at desc nulls last
               limit $3 offset $4"#,
        )
        .bind(&filter.shop_type)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect::<sqlx::Result<Vec<_>>>().map_err(StorageError::from)
    }

    async fn get_active_jobs(&self) -> StorageResult<Vec<Job>> {
        let rows = sqlx::query(
            r#"select job_id, shop_type, status, batch_size, total_products, processed_count,
                 success_count, failed_count, skipped_count, deduped_count, started_at,
                 completed_at, duration_ms, error_message, metadata
               from processing_jobs where status in ('pending', 'running')
               order by started_at asc nulls last"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect::<sqlx::Result<Vec<_>>>().map_err(StorageError::from)
    }

    async fn get_errors(&self, job_id: Uuid, paging: Paging) -> StorageResult<Vec<ProcessingErrorRow>> {
        let rows = sqlx::query_as::<Postgres, ProcessingErrorSqlRow>(
            r#"select id, job_id, raw_product_id, product_id, shop_type, error_type,
                 error_message, error_details, stack_trace, severity, is_resolved, created_at
               from processing_errors
               where job_id = $1
               order by created_at asc
               limit $2 offset $3"#,
        )
        .bind(job_id)
        .bind(paging.limit)
        .bind(paging.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProcessingErrorRow::from).collect())
    }

    async fn resolve_error(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query(r#"update processing_errors set is_resolved = true where id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query("select 1").execute(&self.pool).await.is_ok()
    }

    async fn probe_transaction(&self) -> bool {
        let Ok(mut txn) = self.pool.begin().await else {
            return false;
        };
        let ok = sqlx::query("select 1").execute(&mut *txn).await.is_ok();
        let _ = txn.rollback().await;
        ok
    }
}
