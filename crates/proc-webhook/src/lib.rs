//! The Webhook Dispatcher (spec.md §4.6): fire-and-forget HTTP POST
//! notifications to an external orchestrator, with exponential-backoff
//! retry, bounded concurrency, and best-effort semantics. A dispatch
//! failure MUST NOT affect job status, so `post` returns `()`, never a
//! `Result` the caller could mistakenly propagate.

mod config;
mod dispatcher;
mod events;

pub use config::WebhookConfig;
pub use dispatcher::Dispatcher;
pub use events::{JobFailedData, JobProgressData, WebhookEvent};
