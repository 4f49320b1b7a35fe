use proc_engine::JobManager;
use proc_storage::Store;
use std::sync::Arc;

/// Shared application state handed to every handler via axum's `State`
/// extractor (spec.md §4.8: handlers "extract path/query/body... and
/// immediately delegate to `proc-engine`/`proc-storage`").
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobManager>,
    pub store: Arc<dyn Store>,
}
