//! GitPulse server binary.
//!
//! Parses flags (each with a `GITPULSE_*` environment fallback), wires the
//! cache stack, and serves the HTTP API until SIGINT.

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use error::CliError;
use gitpulse::cache::CachedClient;
use gitpulse::client::GithubClient;
use gitpulse::config::Config;
use gitpulse::service::Service;
use gitpulse::stale::StaleClient;
use gitpulse::store::{KVStore, LmdbStore};
use gitpulse::upstream::{Client, RateLimitedDo, ReqwestDo};

#[derive(Debug, Parser)]
#[command(name = "gitpulse")]
#[command(version = gitpulse::VERSION)]
#[command(about = "Most active GitHub contributors by language", long_about = None)]
struct Cli {
    /// Listen address for the HTTP server
    #[arg(long, env = "GITPULSE_HTTP_ADDRESS", default_value = "0.0.0.0:8080")]
    http_address: String,

    /// Base URL of the GitHub REST API, with protocol
    #[arg(
        long,
        env = "GITPULSE_GITHUB_API_ADDRESS",
        default_value = "https://api.github.com"
    )]
    github_api_address: String,

    /// GitHub auth token (optional; the anonymous rate limit is much lower)
    #[arg(long, env = "GITPULSE_GITHUB_API_TOKEN")]
    github_api_token: Option<String>,

    /// Upstream request budget in requests per second; fractions allowed
    #[arg(long, env = "GITPULSE_GITHUB_API_RATE_LIMIT", default_value_t = 0.5)]
    github_api_rate_limit: f64,

    /// Timeout in seconds for a single upstream HTTP call
    #[arg(long, env = "GITPULSE_GITHUB_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    github_http_timeout_secs: u64,

    /// Entries per operation in the in-memory cache
    #[arg(long, env = "GITPULSE_CACHE_SIZE", default_value_t = 10_000)]
    cache_size: usize,

    /// Lifetime in seconds of in-memory cache entries
    #[arg(long, env = "GITPULSE_CACHE_TTL_SECS", default_value_t = 600)]
    cache_ttl_secs: u64,

    /// Directory for the persistent store
    #[arg(long, env = "GITPULSE_DB_PATH", default_value = "./gitpulse.data")]
    db_path: PathBuf,

    /// Bucket name inside the persistent store
    #[arg(long, env = "GITPULSE_DB_BUCKET", default_value = "github")]
    db_bucket: String,

    /// Maximum on-disk size of the store in megabytes
    #[arg(long, env = "GITPULSE_DB_MAP_SIZE_MB", default_value_t = 256)]
    db_map_size_mb: usize,

    /// Maximum age in seconds at which persisted data is still served
    #[arg(long, env = "GITPULSE_DB_TTL_SECS", default_value_t = 8 * 60 * 60)]
    db_ttl_secs: u64,

    /// Age in seconds past which served data also triggers a background refresh
    #[arg(long, env = "GITPULSE_DB_REFRESH_TTL_SECS", default_value_t = 60 * 60)]
    db_refresh_ttl_secs: u64,

    /// Timeout in seconds for each aggregation query
    #[arg(long, env = "GITPULSE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            http_address: self.http_address,
            github_api_address: self.github_api_address,
            github_api_token: self.github_api_token,
            github_api_rate_limit: self.github_api_rate_limit,
            github_http_timeout: Duration::from_secs(self.github_http_timeout_secs),
            cache_size: self.cache_size,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            db_path: self.db_path,
            db_bucket: self.db_bucket,
            db_map_size: self.db_map_size_mb * 1024 * 1024,
            db_ttl: Duration::from_secs(self.db_ttl_secs),
            db_refresh_ttl: Duration::from_secs(self.db_refresh_ttl_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(cli.into_config()).await {
        e.exit();
    }
}

async fn run(config: Config) -> Result<(), CliError> {
    info!("GitPulse v{}", gitpulse::VERSION);

    let doer = ReqwestDo::new(config.github_http_timeout).map_err(CliError::Setup)?;
    let limited =
        RateLimitedDo::new(doer, config.github_api_rate_limit).map_err(CliError::Setup)?;
    let github = Arc::new(Client::new(
        limited,
        config.github_api_address.clone(),
        config.github_api_token.clone(),
    ));

    let store = Arc::new(
        LmdbStore::open(&config.db_path, &config.db_bucket, config.db_map_size)
            .map_err(CliError::Setup)?,
    );
    info!(
        path = %config.db_path.display(),
        bucket = %config.db_bucket,
        "persistent store opened"
    );

    let stale = Arc::new(StaleClient::new(
        github as Arc<dyn GithubClient>,
        Arc::clone(&store) as Arc<dyn KVStore>,
        config.db_ttl,
        config.db_refresh_ttl,
    ));
    stale.run_scheduler();

    let cached = Arc::new(
        CachedClient::new(
            Arc::clone(&stale) as Arc<dyn GithubClient>,
            config.cache_size,
            config.cache_ttl,
        )
        .map_err(CliError::Setup)?,
    );
    let service = Arc::new(Service::new(cached, config.request_timeout));

    let app = gitpulse::http::router(service);
    let listener = tokio::net::TcpListener::bind(&config.http_address)
        .await
        .map_err(|e| CliError::Bind {
            address: config.http_address.clone(),
            error: e,
        })?;
    info!(address = %config.http_address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Serve)?;

    // Stop scheduling refreshes before the store's last owner drops it.
    stale.close();
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
    }
}
