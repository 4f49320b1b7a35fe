//! The processing engine: the Batch Adapter (spec.md §4.4) and the Job
//! Manager (spec.md §4.5) that drives it, wired to the Webhook Dispatcher
//! through an internal broadcast of lifecycle events (spec.md §9).

mod batch;
mod events;
mod job;

pub use batch::{BatchAdapter, BatchError, BatchOutcome, JobContext, OutputTarget};
pub use events::{spawn_webhook_forwarder, JobEvent, EVENT_CHANNEL_CAPACITY};
pub use job::{CreateJobRequest, JobManager, JobManagerConfig, JobManagerError, Progress};
