//! In-memory LRU layer in front of the stale-data layer.
//!
//! Short-circuits repeated identical queries without touching the store.
//! Projects and stats keep independent caches of equal capacity; entries
//! expire by age at lookup time and are evicted least-recently-used when a
//! cache is full. Downstream errors, including the "scheduled for later"
//! signal, are propagated untouched and never cached.
//!
//! Concurrent misses for the same key are not coalesced here; the refresh
//! scheduler downstream absorbs the duplicates.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio_util::sync::CancellationToken;

use crate::client::GithubClient;
use crate::error::Error;
use crate::model::{ContributorStats, Project};

struct ProjectsCacheEntry {
    created: Instant,
    count: usize,
    data: Vec<Project>,
}

struct StatsCacheEntry {
    created: Instant,
    data: Vec<ContributorStats>,
}

/// LRU-cached [`GithubClient`] decorator.
pub struct CachedClient {
    client: Arc<dyn GithubClient>,
    projects_cache: Mutex<LruCache<String, ProjectsCacheEntry>>,
    stats_cache: Mutex<LruCache<String, StatsCacheEntry>>,
    ttl: Duration,
}

impl CachedClient {
    /// Creates the layer with `size` entries per operation.
    ///
    /// A zero size fails with [`Error::InvalidRequest`].
    pub fn new(client: Arc<dyn GithubClient>, size: usize, ttl: Duration) -> Result<Self, Error> {
        let size = NonZeroUsize::new(size).ok_or_else(|| {
            Error::InvalidRequest("cache size must be greater than 0".to_string())
        })?;

        Ok(Self {
            client,
            projects_cache: Mutex::new(LruCache::new(size)),
            stats_cache: Mutex::new(LruCache::new(size)),
            ttl,
        })
    }
}

#[async_trait]
impl GithubClient for CachedClient {
    async fn projects_by_language(
        &self,
        cancel: &CancellationToken,
        language: &str,
        count: usize,
    ) -> Result<Vec<Project>, Error> {
        let key = language.to_string();
        {
            let mut cache = self.projects_cache.lock().unwrap();
            if let Some(entry) = cache.get(&key) {
                if entry.count >= count && entry.created.elapsed() < self.ttl {
                    let mut projects = entry.data.clone();
                    projects.truncate(count);
                    return Ok(projects);
                }
            }
        }

        let projects = self
            .client
            .projects_by_language(cancel, language, count)
            .await?;

        let entry = ProjectsCacheEntry {
            created: Instant::now(),
            count,
            data: projects.clone(),
        };
        self.projects_cache.lock().unwrap().put(key, entry);

        Ok(projects)
    }

    async fn stats_by_project(
        &self,
        cancel: &CancellationToken,
        name: &str,
        owner: &str,
    ) -> Result<Vec<ContributorStats>, Error> {
        let key = format!("{name}/{owner}");
        {
            let mut cache = self.stats_cache.lock().unwrap();
            if let Some(entry) = cache.get(&key) {
                if entry.created.elapsed() < self.ttl {
                    return Ok(entry.data.clone());
                }
            }
        }

        let stats = self.client.stats_by_project(cancel, name, owner).await?;

        let entry = StatsCacheEntry {
            created: Instant::now(),
            data: stats.clone(),
        };
        self.stats_cache.lock().unwrap().put(key, entry);

        Ok(stats)
    }
}
