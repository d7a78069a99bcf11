//! GitPulse: most active GitHub contributors by language.
//!
//! The public API is the aggregation query "who wrote the most commits
//! across the top-N starred repositories of a language". GitHub is slow,
//! rate-limited, and computes contributor statistics lazily (answering 202
//! until they exist), so the interesting part of this crate is the stack
//! between the query and the network:
//!
//! ```text
//! Service ─ LRU cache ─ stale-data layer ─ GitHub client ─ rate limiter ─ HTTP
//!                            │
//!                       KV store + refresh scheduler
//! ```
//!
//! Each layer implements [`client::GithubClient`] and wraps the next one,
//! so the stack is assembled from `Arc<dyn GithubClient>` pieces:
//!
//! ```ignore
//! let doer = upstream::RateLimitedDo::new(upstream::ReqwestDo::new(timeout)?, 0.5)?;
//! let github = Arc::new(upstream::Client::new(doer, "https://api.github.com", None));
//! let stale = Arc::new(stale::StaleClient::new(github, store, ttl, refresh_ttl));
//! stale.run_scheduler();
//! let cached = Arc::new(cache::CachedClient::new(stale, 10_000, cache_ttl)?);
//! let service = service::Service::new(cached, request_timeout);
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod service;
pub mod stale;
pub mod store;
pub mod upstream;

/// Version of the GitPulse library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
