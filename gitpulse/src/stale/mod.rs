//! Stale-data layer: serve from the store, refresh in the background.
//!
//! [`StaleClient`] answers every query from the persistent store when it
//! can, trading freshness for availability under a heavily rate-limited
//! upstream:
//!
//! - entry fresh (`age < ttl`, enough projects): served immediately; when
//!   `age >= refresh_ttl` a background refresh is enqueued as well,
//! - entry missing, expired, undecodable, or too small: a refresh is
//!   enqueued and the caller gets [`Error::ScheduledForLater`], meaning
//!   "try again soon",
//! - refresh queue full: [`Error::Overloaded`].
//!
//! Refreshes run through the [`scheduler`] loop, which coalesces per-key
//! work and writes results back to the store.

mod entry;
mod scheduler;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::client::GithubClient;
use crate::error::Error;
use crate::model::{ContributorStats, Project};
use crate::stale::entry::{ProjectsEntry, StatsEntry};
use crate::stale::scheduler::{ProjectsRefresh, Scheduler, StatsRefresh};
use crate::store::KVStore;

/// Capacity of each refresh request queue.
const REFRESH_QUEUE_CAPACITY: usize = 1000;

/// Read-through persistent cache over a [`GithubClient`].
pub struct StaleClient {
    store: Arc<dyn KVStore>,
    ttl: Duration,
    refresh_ttl: Duration,
    projects_tx: mpsc::Sender<ProjectsRefresh>,
    stats_tx: mpsc::Sender<StatsRefresh>,
    scheduler: Mutex<Option<Scheduler>>,
    cancel: CancellationToken,
}

impl StaleClient {
    /// Creates the layer.
    ///
    /// `ttl` is the maximum age at which stored data is still served;
    /// `refresh_ttl` is the (smaller) age past which serving additionally
    /// triggers a background refresh. The scheduler does not run until
    /// [`StaleClient::run_scheduler`] is called.
    pub fn new(
        client: Arc<dyn GithubClient>,
        store: Arc<dyn KVStore>,
        ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let (projects_tx, projects_rx) = mpsc::channel(REFRESH_QUEUE_CAPACITY);
        let (stats_tx, stats_rx) = mpsc::channel(REFRESH_QUEUE_CAPACITY);

        Self {
            store: Arc::clone(&store),
            ttl,
            refresh_ttl,
            projects_tx,
            stats_tx,
            scheduler: Mutex::new(Some(Scheduler {
                client,
                store,
                projects_rx,
                stats_rx,
                pending_probe: None,
            })),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawns the scheduler loop. Does not block; calling it again is a
    /// no-op.
    pub fn run_scheduler(&self) {
        if let Some(scheduler) = self.scheduler.lock().unwrap().take() {
            tokio::spawn(scheduler.run(self.cancel.clone()));
        }
    }

    /// Stops the scheduler loop.
    ///
    /// Refresh workers already in flight run to completion on their own;
    /// their completion signals are discarded. The underlying store is not
    /// touched; it belongs to the caller.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    fn set_pending_probe(&self, probe: mpsc::Sender<usize>) {
        if let Some(scheduler) = self.scheduler.lock().unwrap().as_mut() {
            scheduler.pending_probe = Some(probe);
        }
    }
}

impl Drop for StaleClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl GithubClient for StaleClient {
    async fn projects_by_language(
        &self,
        _cancel: &CancellationToken,
        language: &str,
        count: usize,
    ) -> Result<Vec<Project>, Error> {
        let key = entry::projects_key(language);
        if let Some(data) = self.store.read(&key)? {
            match serde_json::from_slice::<ProjectsEntry>(&data) {
                Ok(entry) => {
                    let now = entry::unix_now();
                    if entry.count >= count && entry.created + self.ttl.as_secs() as i64 > now {
                        if entry.created + self.refresh_ttl.as_secs() as i64 <= now {
                            let request = ProjectsRefresh {
                                language: language.to_string(),
                                count,
                            };
                            if self.projects_tx.try_send(request).is_err() {
                                warn!(language, "refresh queue full, skipping background refresh");
                            }
                        }

                        let mut projects = entry.data;
                        projects.truncate(count);
                        return Ok(projects);
                    }
                }
                Err(e) => warn!(language, error = %e, "ignoring undecodable projects entry"),
            }
        }

        let request = ProjectsRefresh {
            language: language.to_string(),
            count,
        };
        match self.projects_tx.try_send(request) {
            Ok(()) => Err(Error::ScheduledForLater(
                "projects refresh scheduled".to_string(),
            )),
            Err(_) => Err(Error::Overloaded(
                "refresh queue has no free slots".to_string(),
            )),
        }
    }

    async fn stats_by_project(
        &self,
        _cancel: &CancellationToken,
        name: &str,
        owner: &str,
    ) -> Result<Vec<ContributorStats>, Error> {
        let key = entry::stats_key(name, owner);
        if let Some(data) = self.store.read(&key)? {
            match serde_json::from_slice::<StatsEntry>(&data) {
                Ok(entry) => {
                    let now = entry::unix_now();
                    if entry.created + self.ttl.as_secs() as i64 > now {
                        if entry.created + self.refresh_ttl.as_secs() as i64 <= now {
                            let request = StatsRefresh {
                                name: name.to_string(),
                                owner: owner.to_string(),
                            };
                            if self.stats_tx.try_send(request).is_err() {
                                warn!(owner, name, "refresh queue full, skipping background refresh");
                            }
                        }

                        return Ok(entry.data);
                    }
                }
                Err(e) => warn!(owner, name, error = %e, "ignoring undecodable stats entry"),
            }
        }

        let request = StatsRefresh {
            name: name.to_string(),
            owner: owner.to_string(),
        };
        match self.stats_tx.try_send(request) {
            Ok(()) => Err(Error::ScheduledForLater(
                "stats refresh scheduled".to_string(),
            )),
            Err(_) => Err(Error::Overloaded(
                "refresh queue has no free slots".to_string(),
            )),
        }
    }
}
