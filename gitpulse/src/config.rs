//! Service configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Every knob the wiring needs, with defaults suitable for running against
/// the real GitHub API without an auth token.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the HTTP server.
    pub http_address: String,
    /// Base URL of the GitHub REST API, with protocol.
    pub github_api_address: String,
    /// Optional auth token; the anonymous rate limit is much lower.
    pub github_api_token: Option<String>,
    /// Upstream request budget in requests per second; fractions allowed.
    pub github_api_rate_limit: f64,
    /// Whole-request timeout for a single upstream HTTP call.
    pub github_http_timeout: Duration,
    /// Entries per operation in the in-memory LRU cache.
    pub cache_size: usize,
    /// Maximum lifetime of an in-memory cache entry.
    pub cache_ttl: Duration,
    /// Directory for the persistent store.
    pub db_path: PathBuf,
    /// Bucket (named database) inside the store.
    pub db_bucket: String,
    /// Upper bound for the store's on-disk size in bytes.
    pub db_map_size: usize,
    /// Maximum age at which persisted data is still served.
    pub db_ttl: Duration,
    /// Age past which served data additionally triggers a background
    /// refresh. Must stay below `db_ttl` to be useful.
    pub db_refresh_ttl: Duration,
    /// Timeout applied to each aggregation query.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_address: "0.0.0.0:8080".to_string(),
            github_api_address: "https://api.github.com".to_string(),
            github_api_token: None,
            github_api_rate_limit: 0.5,
            github_http_timeout: Duration::from_secs(30),
            cache_size: 10_000,
            cache_ttl: Duration::from_secs(10 * 60),
            db_path: PathBuf::from("./gitpulse.data"),
            db_bucket: "github".to_string(),
            db_map_size: 256 * 1024 * 1024,
            db_ttl: Duration::from_secs(8 * 60 * 60),
            db_refresh_ttl: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_public_api() {
        let config = Config::default();
        assert_eq!(config.github_api_address, "https://api.github.com");
        assert!(config.github_api_token.is_none());
    }

    #[test]
    fn refresh_ttl_defaults_below_ttl() {
        let config = Config::default();
        assert!(config.db_refresh_ttl < config.db_ttl);
    }
}
