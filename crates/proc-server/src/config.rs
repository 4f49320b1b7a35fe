use clap::Parser;
use proc_engine::OutputTarget;
use std::time::Duration;

/// Process-wide configuration (spec.md §6.3), read from environment
/// variables with the same names the spec gives them. Mirrors
/// `agent::main::Args`'s shape: one `clap::Parser` struct, `env = "..."`
/// on every field, sane defaults so a local stack needs nothing but
/// `DATABASE`-adjacent variables set.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Supermarket product processing engine", long_about = None)]
pub struct Config {
    /// Port the HTTP Control Surface binds.
    #[clap(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Which of staging/processed/both the Batch Adapter writes to.
    #[clap(long = "output-target", env = "OUTPUT_TARGET", default_value = "both")]
    pub output_target: String,

    /// Default job batch size when a caller doesn't specify one.
    #[clap(long = "batch-size", env = "BATCH_SIZE", default_value = "100")]
    pub batch_size: i32,

    /// HTTP request timeout, in milliseconds, for the Control Surface's
    /// own outbound calls (none today; carried for parity with spec.md
    /// §6.3 and future use by handlers that call out).
    #[clap(long = "request-timeout", env = "REQUEST_TIMEOUT", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Base URL the Webhook Dispatcher posts events to.
    #[clap(long = "webhook-base-url", env = "WEBHOOK_BASE_URL")]
    pub webhook_base_url: url::Url,

    #[clap(long = "webhook-timeout", env = "WEBHOOK_TIMEOUT", default_value = "5000")]
    pub webhook_timeout_ms: u64,

    #[clap(long = "webhook-retry-attempts", env = "WEBHOOK_RETRY_ATTEMPTS", default_value = "3")]
    pub webhook_retry_attempts: u32,

    #[clap(long = "log-level", env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Origins the Control Surface's CORS layer allows. May be specified
    /// multiple times; empty means same-origin only.
    #[clap(long = "allow-origin", env = "ALLOW_ORIGIN", value_delimiter = ',')]
    pub allow_origin: Vec<String>,

    #[clap(long = "postgres-host", env = "POSTGRES_HOST", default_value = "127.0.0.1")]
    pub postgres_host: String,
    #[clap(long = "postgres-port", env = "POSTGRES_PORT", default_value = "5432")]
    pub postgres_port: u16,
    #[clap(long = "postgres-db", env = "POSTGRES_DB", default_value = "supermarket_processor")]
    pub postgres_db: String,
    #[clap(long = "postgres-user", env = "POSTGRES_USER", default_value = "processor")]
    pub postgres_user: String,
    #[clap(long = "postgres-password", env = "POSTGRES_PASSWORD", default_value = "")]
    pub postgres_password: String,
    #[clap(long = "postgres-ssl", env = "POSTGRES_SSL", default_value = "prefer")]
    pub postgres_ssl: String,
    #[clap(long = "postgres-pool-size", env = "POSTGRES_POOL_SIZE", default_value = "10")]
    pub postgres_pool_size: u32,
    #[clap(long = "postgres-connection-timeout", env = "POSTGRES_CONNECTION_TIMEOUT", default_value = "5000")]
    pub postgres_connection_timeout_ms: u64,
    #[clap(long = "postgres-idle-timeout", env = "POSTGRES_IDLE_TIMEOUT", default_value = "600000")]
    pub postgres_idle_timeout_ms: u64,
}

impl Config {
    pub fn output_target(&self) -> anyhow::Result<OutputTarget> {
        self.output_target
            .parse()
            .map_err(|error: String| anyhow::anyhow!(error))
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }

    pub fn postgres_connect_options(&self) -> sqlx::postgres::PgConnectOptions {
        let mut options = sqlx::postgres::PgConnectOptions::new()
            .host(&self.postgres_host)
            .port(self.postgres_port)
            .database(&self.postgres_db)
            .username(&self.postgres_user);
        if !self.postgres_password.is_empty() {
            options = options.password(&self.postgres_password);
        }
        let ssl_mode = match self.postgres_ssl.to_lowercase().as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            _ => sqlx::postgres::PgSslMode::Prefer,
        };
        options.ssl_mode(ssl_mode)
    }

    pub fn postgres_connection_timeout(&self) -> Duration {
        Duration::from_millis(self.postgres_connection_timeout_ms)
    }

    pub fn postgres_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.postgres_idle_timeout_ms)
    }
}
