//! The Control Surface (spec.md §4.8/§6.1): thin axum handlers, one per
//! route, that extract path/query/body and delegate to `proc-engine` and
//! `proc-storage`. CORS and authentication are out of scope for this
//! crate's own logic; `proc-server` wires a `tower_http::cors::CorsLayer`
//! around the router this module builds.

mod envelope;
mod error;
mod health;
mod jobs;
mod n8n;
mod products;
mod state;
mod validation;

pub use envelope::Envelope;
pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;

/// Builds the full route table of spec.md §6.1. The caller (`proc-server`)
/// attaches middleware (CORS, tracing) and binds a listener.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/:id/start", post(jobs::start_job))
        .route("/jobs/:id/cancel", post(jobs::cancel_job))
        .route("/jobs/:id", get(jobs::get_job))
        .route("/jobs/:id/progress", get(jobs::job_progress))
        .route("/jobs/:id/errors", get(jobs::job_errors))
        .route("/products", get(products::list_products))
        .route("/products/:unified_id", get(products::get_product))
        .route("/process/:shop_type", post(jobs::process_shop))
        .route("/webhook/n8n", post(n8n::n8n_webhook))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use proc_engine::{BatchAdapter, JobManager, JobManagerConfig};
    use proc_storage::test_support::MemoryStore;
    use proc_transform::Registry;
    use proc_webhook::{Dispatcher, WebhookConfig};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let store: Arc<dyn proc_storage::Store> = Arc::new(MemoryStore::new());
        let adapter = Arc::new(BatchAdapter::new(store.clone(), Arc::new(Registry::default())));
        let webhook = Arc::new(Dispatcher::new(WebhookConfig::new(
            "http://127.0.0.1:1/".parse().unwrap(),
        )));
        let jobs = Arc::new(JobManager::new(store.clone(), adapter, webhook, JobManagerConfig::default()));
        router(AppState { jobs, store })
    }

    #[tokio::test]
    async fn health_reports_ok_against_memory_store() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_job_rejects_unknown_shop_type() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"shop_type":"not-a-shop"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_job_succeeds_with_known_shop_type() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"shop_type":"ah","batch_size":50}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn get_missing_job_is_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri(format!("/jobs/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn starting_a_never_created_job_is_404_not_409() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/jobs/{}/start", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
