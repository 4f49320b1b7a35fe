use std::time::Duration;

/// One sampling pass's worth of data (spec.md §4.7: "database pool
/// counters, active job count, last 24h error count and top error types,
/// recent throughput, process memory and uptime").
#[derive(Debug, Clone, serde::Serialize)]
pub struct SampledMetrics {
    pub database_reachable: bool,
    pub active_job_count: usize,
    pub last_24h_error_count: i64,
    pub top_error_types: Vec<(String, i64)>,
    /// Processed rows per second, averaged over the jobs inspected this
    /// sample.
    pub recent_throughput: f64,
    pub process_memory_bytes: u64,
    #[serde(with = "duration_secs")]
    pub uptime: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}
