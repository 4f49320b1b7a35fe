use crate::config::WebhookConfig;
use crate::events::WebhookEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Fire-and-forget HTTP POST dispatcher (spec.md §4.6). Cloning is cheap;
/// the underlying `reqwest::Client` and semaphore are shared.
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    config: WebhookConfig,
    inflight: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(config: WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client builds with a static config");
        Dispatcher {
            inflight: Arc::new(Semaphore::new(config.max_concurrent)),
            client,
            config,
        }
    }

    /// Dispatch `event`. Never blocks the caller past acquiring a
    /// concurrency permit, never returns an error, and never affects job
    /// status (spec.md §4.6, §7 "Webhook failures never propagate").
    pub fn post(&self, event: WebhookEvent) {
        let client = self.client.clone();
        let base_url = self.config.base_url.clone();
        let attempts = self.config.retry_attempts.max(1);
        let inflight = self.inflight.clone();

        tokio::spawn(async move {
            let Ok(_permit) = inflight.acquire_owned().await else {
                return;
            };

            let path = event.path();
            let event_name = event.name();
            let url = match base_url.join(path.trim_start_matches('/')) {
                Ok(u) => u,
                Err(error) => {
                    tracing::warn!(%error, %path, "invalid webhook URL, dropping dispatch");
                    return;
                }
            };
            let envelope = event.into_envelope();

            let mut delay = BACKOFF_BASE;
            for attempt in 1..=attempts {
                let result = client
                    .post(url.clone())
                    .header("content-type", "application/json")
                    .json(&envelope)
                    .send()
                    .await;

                match result {
                    Ok(response) if response.status().is_success() => {
                        tracing::debug!(event = event_name, %attempt, "webhook delivered");
                        return;
                    }
                    Ok(response) => {
                        tracing::debug!(
                            event = event_name,
                            %attempt,
                            status = %response.status(),
                            "webhook endpoint rejected delivery"
                        );
                    }
                    Err(error) => {
                        tracing::debug!(event = event_name, %attempt, %error, "webhook request failed");
                    }
                }

                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(BACKOFF_CAP);
                }
            }

            tracing::warn!(
                event = event_name,
                %attempts,
                "webhook delivery exhausted retries, dropping (WEBHOOK_DELIVERY_FAILURE)"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn post_to_unreachable_host_does_not_panic_or_block() {
        let config = WebhookConfig::new("http://127.0.0.1:1/".parse().unwrap());
        let dispatcher = Dispatcher::new(WebhookConfig {
            retry_attempts: 1,
            timeout: Duration::from_millis(200),
            ..config
        });
        dispatcher.post(WebhookEvent::SystemHealthCheck {
            status: "ok",
            version: "1.0.0",
        });
        // Give the detached task a moment; the assertion is simply that
        // `post` itself returned immediately without needing to await
        // delivery (best-effort semantics, spec.md §4.6).
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
