use std::time::Duration;

/// Thresholds and cadence for the Monitoring Agent (spec.md §4.7:
/// "configurable thresholds", "independent cooldown (default 5 min)").
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often the periodic sampler runs. Spec default: 30s.
    pub sample_interval: Duration,
    /// Minimum time between two alerts of the same `(AlertType, job_id)`.
    /// Spec default: 5 min.
    pub cooldown: Duration,
    /// A job's per-row success rate falling below this after any
    /// `job:progress` beat raises `high_error_rate` for that job.
    pub min_success_rate: f64,
    /// A rolling 24h error count above this raises a global (job_id-less)
    /// `high_error_rate` alert on the next sample tick.
    pub max_recent_error_count: i64,
    /// How many jobs the periodic sampler inspects when aggregating the
    /// rolling error count; bounds the cost of a Non-goal-compliant
    /// "no query/reporting beyond list/get" sampler.
    pub sample_job_window: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            sample_interval: Duration::from_secs(30),
            cooldown: Duration::from_secs(5 * 60),
            min_success_rate: 0.8,
            max_recent_error_count: 100,
            sample_job_window: 200,
        }
    }
}
