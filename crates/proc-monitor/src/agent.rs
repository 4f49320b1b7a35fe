use crate::config::MonitorConfig;
use crate::metrics::SampledMetrics;
use proc_engine::JobEvent;
use proc_storage::{JobFilter, Paging, Store};
use proc_webhook::{Dispatcher, WebhookEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Alert kinds the agent can raise. Spec.md §4.6 only gives the Webhook
/// Dispatcher one alert-shaped event (`processing.high_error_rate`), so
/// every variant here is forwarded through that event with a distinguishing
/// `alert_type` string; the variant exists to key the independent cooldown
/// map (spec.md §4.7), not to pick a different wire event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertType {
    /// Raised per job when its success rate falls below
    /// `MonitorConfig::min_success_rate` on a `job:progress` beat.
    JobHighErrorRate,
    /// Raised globally (no job id) when the rolling error count sampled
    /// across recent jobs exceeds `MonitorConfig::max_recent_error_count`.
    GlobalHighErrorRate,
}

impl AlertType {
    fn wire_name(&self) -> &'static str {
        match self {
            AlertType::JobHighErrorRate => "high_error_rate",
            AlertType::GlobalHighErrorRate => "global_high_error_rate",
        }
    }
}

/// The Monitoring Agent. Cheap to clone via `Arc`; `spawn` starts its two
/// independent loops (periodic sampling, `job:progress` watching).
pub struct Agent {
    store: Arc<dyn Store>,
    webhook: Arc<Dispatcher>,
    config: MonitorConfig,
    system: Mutex<System>,
    cooldowns: Mutex<HashMap<(AlertType, Option<Uuid>), Instant>>,
    process_start: Instant,
    pid: Pid,
}

impl Agent {
    pub fn new(store: Arc<dyn Store>, webhook: Arc<Dispatcher>, config: MonitorConfig) -> Arc<Self> {
        let pid = Pid::from_u32(std::process::id());
        Arc::new(Agent {
            store,
            webhook,
            config,
            system: Mutex::new(System::new()),
            cooldowns: Mutex::new(HashMap::new()),
            process_start: Instant::now(),
            pid,
        })
    }

    /// Starts the periodic sampler and the `job:progress` watcher as
    /// detached tasks on the current runtime. `events` should be a fresh
    /// subscription off the same `JobManager` whose jobs this agent
    /// monitors (spec.md §4.7 "subscribes to `job:progress`").
    pub fn spawn(self: &Arc<Self>, events: broadcast::Receiver<JobEvent>) {
        let sampler = self.clone();
        tokio::spawn(async move { sampler.run_sampling_loop().await });
        let watcher = self.clone();
        tokio::spawn(async move { watcher.run_progress_watch(events).await });
    }

    async fn run_sampling_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.sample_interval);
        loop {
            ticker.tick().await;
            let metrics = self.sample().await;
            tracing::debug!(?metrics, "monitoring sample");
            self.webhook.post(WebhookEvent::SystemHealthCheck {
                status: if metrics.database_reachable { "ok" } else { "degraded" },
                version: env!("CARGO_PKG_VERSION"),
            });
            if metrics.last_24h_error_count > self.config.max_recent_error_count {
                self.raise(
                    AlertType::GlobalHighErrorRate,
                    None,
                    "*",
                    metrics.last_24h_error_count,
                    metrics.last_24h_error_count,
                    metrics.top_error_types.iter().map(|(k, _)| k.clone()).collect(),
                )
                .await;
            }
        }
    }

    async fn run_progress_watch(self: Arc<Self>, mut events: broadcast::Receiver<JobEvent>) {
        loop {
            match events.recv().await {
                Ok(JobEvent::Progress {
                    job_id,
                    shop_type,
                    processed_count,
                    success_count,
                    failed_count,
                    ..
                }) => {
                    self.check_job_success_rate(job_id, shop_type, processed_count, success_count, failed_count)
                        .await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn check_job_success_rate(
        &self,
        job_id: Uuid,
        shop_type: String,
        processed_count: i64,
        success_count: i64,
        failed_count: i64,
    ) {
        if processed_count == 0 {
            return;
        }
        let success_rate = success_count as f64 / processed_count as f64;
        if success_rate >= self.config.min_success_rate {
            return;
        }

        let error_types = self
            .store
            .get_errors(job_id, Paging { limit: 200, offset: 0 })
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.error_type)
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();

        self.raise(
            AlertType::JobHighErrorRate,
            Some(job_id),
            &shop_type,
            failed_count,
            processed_count,
            error_types,
        )
        .await;
    }

    async fn raise(
        &self,
        alert_type: AlertType,
        job_id: Option<Uuid>,
        shop_type: &str,
        total_errors: i64,
        processed_count: i64,
        error_types: Vec<String>,
    ) {
        let key = (alert_type, job_id);
        let mut cooldowns = self.cooldowns.lock().await;
        let now = Instant::now();
        if let Some(last) = cooldowns.get(&key) {
            if now.duration_since(*last) < self.config.cooldown {
                return;
            }
        }
        cooldowns.insert(key, now);
        drop(cooldowns);

        let error_rate = if processed_count > 0 {
            total_errors as f64 / processed_count as f64
        } else {
            0.0
        };
        tracing::warn!(?alert_type, %shop_type, %error_rate, "raising alert");
        self.webhook.post(WebhookEvent::HighErrorRate {
            job_id: job_id.unwrap_or_else(Uuid::nil),
            alert_type: alert_type.wire_name(),
            shop_type: shop_type.to_string(),
            error_rate,
            total_errors,
            processed_count,
            error_types,
        });
    }

    /// One sampling pass (spec.md §4.7's metric list).
    pub async fn sample(&self) -> SampledMetrics {
        let database_reachable = self.store.ping().await;
        let active_job_count = self.store.get_active_jobs().await.map(|j| j.len()).unwrap_or(0);

        let recent_jobs = self
            .store
            .list_jobs(JobFilter {
                limit: self.config.sample_job_window,
                ..Default::default()
            })
            .await
            .unwrap_or_default();

        let window_start = chrono::Utc::now() - chrono::Duration::hours(24);
        let mut last_24h_error_count = 0i64;
        let mut error_type_counts: HashMap<String, i64> = HashMap::new();
        let mut throughput_samples = Vec::new();

        for job in &recent_jobs {
            let errors = self
                .store
                .get_errors(job.job_id, Paging { limit: 500, offset: 0 })
                .await
                .unwrap_or_default();
            for error in errors.into_iter().filter(|e| e.created_at >= window_start) {
                last_24h_error_count += 1;
                *error_type_counts.entry(error.error_type).or_insert(0) += 1;
            }
            if let (Some(started), Some(duration_ms)) = (job.started_at, job.duration_ms) {
                let _ = started;
                if duration_ms > 0 {
                    throughput_samples.push(job.processed_count as f64 / (duration_ms as f64 / 1000.0));
                }
            }
        }

        let mut top_error_types: Vec<(String, i64)> = error_type_counts.into_iter().collect();
        top_error_types.sort_by(|a, b| b.1.cmp(&a.1));
        top_error_types.truncate(5);

        let recent_throughput = if throughput_samples.is_empty() {
            0.0
        } else {
            throughput_samples.iter().sum::<f64>() / throughput_samples.len() as f64
        };

        let process_memory_bytes = {
            let mut system = self.system.lock().await;
            system.refresh_process(self.pid);
            system.process(self.pid).map(|p| p.memory()).unwrap_or(0)
        };

        SampledMetrics {
            database_reachable,
            active_job_count,
            last_24h_error_count,
            top_error_types,
            recent_throughput,
            process_memory_bytes,
            uptime: self.process_start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proc_storage::test_support::MemoryStore;
    use proc_storage::NewProcessingError;
    use proc_webhook::WebhookConfig;
    use std::time::Duration as StdDuration;

    fn agent() -> Arc<Agent> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let webhook = Arc::new(Dispatcher::new(WebhookConfig::new(
            "http://127.0.0.1:1/".parse().unwrap(),
        )));
        Agent::new(store, webhook, MonitorConfig::default())
    }

    #[tokio::test]
    async fn sample_reports_zero_on_empty_store() {
        let agent = agent();
        let metrics = agent.sample().await;
        assert!(metrics.database_reachable);
        assert_eq!(metrics.active_job_count, 0);
        assert_eq!(metrics.last_24h_error_count, 0);
    }

    #[tokio::test]
    async fn low_success_rate_raises_once_per_cooldown() {
        let agent = agent();
        let job_id = Uuid::new_v4();
        agent
            .check_job_success_rate(job_id, "ah".to_string(), 10, 2, 8)
            .await;
        // Second beat within the cooldown window must not re-raise; we can't
        // observe the webhook directly (best-effort, fire-and-forget), but
        // we can assert the cooldown map absorbed it without panicking and
        // without a growing number of distinct keys.
        agent
            .check_job_success_rate(job_id, "ah".to_string(), 20, 4, 16)
            .await;
        let cooldowns = agent.cooldowns.lock().await;
        assert_eq!(cooldowns.len(), 1);
    }

    #[tokio::test]
    async fn healthy_rate_never_raises() {
        let agent = agent();
        let job_id = Uuid::new_v4();
        agent
            .check_job_success_rate(job_id, "ah".to_string(), 10, 10, 0)
            .await;
        let cooldowns = agent.cooldowns.lock().await;
        assert!(cooldowns.is_empty());
    }

    #[tokio::test]
    async fn global_error_count_aggregates_across_jobs() {
        let store = Arc::new(MemoryStore::new());
        let job = store
            .create_job(proc_storage::NewJob {
                shop_type: "ah".to_string(),
                batch_size: 10,
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();
        store
            .commit_batch(
                &[],
                &[],
                &[NewProcessingError {
                    job_id: job.job_id,
                    raw_product_id: None,
                    product_id: None,
                    shop_type: "ah".to_string(),
                    error_type: "VALIDATION_ERROR".to_string(),
                    error_message: "x".to_string(),
                    error_details: serde_json::json!({}),
                    stack_trace: None,
                    severity: proc_model::Severity::High,
                }],
            )
            .await
            .unwrap();

        let webhook = Arc::new(Dispatcher::new(WebhookConfig::new(
            "http://127.0.0.1:1/".parse().unwrap(),
        )));
        let agent = Agent::new(store, webhook, MonitorConfig::default());
        let metrics = agent.sample().await;
        assert_eq!(metrics.last_24h_error_count, 1);
        assert_eq!(metrics.top_error_types, vec![("VALIDATION_ERROR".to_string(), 1)]);
        let _ = Utc::now();
        let _ = StdDuration::from_secs(0);
    }
}
