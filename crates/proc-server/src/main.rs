mod config;

use anyhow::Context;
use clap::Parser;
use config::Config;
use futures::FutureExt;
use proc_api::AppState;
use proc_engine::{BatchAdapter, JobManager, JobManagerConfig};
use proc_monitor::{Agent, MonitorConfig};
use proc_storage::PgStore;
use proc_transform::Registry;
use proc_webhook::{Dispatcher, WebhookConfig};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let args = Config::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_new(&args.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(async_main(args));
    tracing::info!(?result, "main function completed, shutting down runtime");
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result
}

async fn async_main(args: Config) -> anyhow::Result<()> {
    // Bind early, before the (possibly slow) database connection, so health
    // checks against the port don't fail while Postgres is still coming up.
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .context("failed to bind server port")?;

    let pg_options = args.postgres_connect_options();
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(args.postgres_pool_size)
        .acquire_timeout(args.postgres_connection_timeout())
        .idle_timeout(args.postgres_idle_timeout())
        .connect_with(pg_options)
        .await
        .context("connecting to database")?;

    let pool_copy = pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(120));
        loop {
            interval.tick().await;
            tracing::info!(
                total_connections = pool_copy.size(),
                idle_connections = pool_copy.num_idle(),
                "db connection pool stats"
            );
        }
    });

    let store: Arc<dyn proc_storage::Store> = Arc::new(PgStore::new(pool));

    let webhook_config = WebhookConfig {
        timeout: args.webhook_timeout(),
        retry_attempts: args.webhook_retry_attempts,
        ..WebhookConfig::new(args.webhook_base_url.clone())
    };
    let webhook = Arc::new(Dispatcher::new(webhook_config));

    let adapter = Arc::new(
        BatchAdapter::new(store.clone(), Arc::new(Registry::default()))
            .with_output_target(args.output_target()?),
    );

    let job_manager_config = JobManagerConfig {
        default_batch_size: args.batch_size,
        ..JobManagerConfig::default()
    };
    let jobs = Arc::new(JobManager::new(store.clone(), adapter, webhook.clone(), job_manager_config));

    let monitor = Agent::new(store.clone(), webhook, MonitorConfig::default());
    monitor.spawn(jobs.subscribe());

    let allow_origin = args
        .allow_origin
        .iter()
        .map(|origin| origin.parse())
        .collect::<Result<Vec<_>, _>>()
        .context("parsing --allow-origin values")?;
    let cors = tower_http::cors::CorsLayer::new()
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_origin(tower_http::cors::AllowOrigin::list(allow_origin))
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request());

    let router = proc_api::router(AppState { jobs, store })
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    tracing::info!(port = args.port, "supermarket processing engine listening");
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    Ok(())
}
