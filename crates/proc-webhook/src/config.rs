use std::time::Duration;
use url::Url;

/// `WEBHOOK_BASE_URL` / `WEBHOOK_TIMEOUT` / `WEBHOOK_RETRY_ATTEMPTS`
/// (spec.md §6.3), plus a bounded-concurrency knob §5 requires but leaves
/// unspecified in units.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub max_concurrent: usize,
}

impl WebhookConfig {
    pub fn new(base_url: Url) -> Self {
        WebhookConfig {
            base_url,
            timeout: Duration::from_millis(5000),
            retry_attempts: 3,
            max_concurrent: 16,
        }
    }
}
