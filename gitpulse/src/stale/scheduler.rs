//! Refresh scheduler: a single dispatch loop with per-key worker tasks.
//!
//! The loop owns the in-flight key sets, so coalescing needs no locking: a
//! request whose key is already being refreshed is dropped, requests for
//! different keys refresh concurrently, and workers report back over
//! completion channels so the loop can clear the in-flight marker.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::GithubClient;
use crate::error::Error;
use crate::stale::entry::{projects_key, stats_key, unix_now, ProjectsEntry, StatsEntry};
use crate::store::KVStore;

/// Queued request to re-fetch the top projects for one language.
#[derive(Debug)]
pub(crate) struct ProjectsRefresh {
    pub language: String,
    pub count: usize,
}

/// Queued request to re-fetch contributor statistics for one project.
#[derive(Debug)]
pub(crate) struct StatsRefresh {
    pub name: String,
    pub owner: String,
}

pub(crate) struct Scheduler {
    pub client: Arc<dyn GithubClient>,
    pub store: Arc<dyn KVStore>,
    pub projects_rx: mpsc::Receiver<ProjectsRefresh>,
    pub stats_rx: mpsc::Receiver<StatsRefresh>,
    /// When set, the loop publishes the in-flight count at the top of every
    /// iteration and blocks until it is consumed. Lets white-box tests step
    /// the scheduler one transition at a time; `None` outside tests.
    pub pending_probe: Option<mpsc::Sender<usize>>,
}

impl Scheduler {
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        // Capacity 1 keeps a finishing worker parked until the loop takes
        // its completion, like a rendezvous handoff.
        let (projects_done_tx, mut projects_done_rx) = mpsc::channel::<String>(1);
        let (stats_done_tx, mut stats_done_rx) = mpsc::channel::<String>(1);

        let mut pending_projects: HashSet<String> = HashSet::new();
        let mut pending_stats: HashSet<String> = HashSet::new();

        loop {
            if let Some(probe) = &self.pending_probe {
                let _ = probe
                    .send(pending_projects.len() + pending_stats.len())
                    .await;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(key) = projects_done_rx.recv() => {
                    pending_projects.remove(&key);
                }

                Some(key) = stats_done_rx.recv() => {
                    pending_stats.remove(&key);
                }

                Some(request) = self.projects_rx.recv() => {
                    if !pending_projects.insert(request.language.clone()) {
                        continue; // already being refreshed
                    }
                    self.spawn_projects_worker(request, projects_done_tx.clone());
                }

                Some(request) = self.stats_rx.recv() => {
                    let key = format!("{}/{}", request.owner, request.name);
                    if !pending_stats.insert(key.clone()) {
                        continue;
                    }
                    self.spawn_stats_worker(request, key, stats_done_tx.clone());
                }
            }
        }
    }

    fn spawn_projects_worker(&self, request: ProjectsRefresh, done: mpsc::Sender<String>) {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            info!(language = %request.language, "projects refresh started");
            match refresh_projects(client.as_ref(), store.as_ref(), &request).await {
                Ok(()) => info!(language = %request.language, "projects refresh done"),
                Err(e) => {
                    error!(language = %request.language, error = %e, "projects refresh failed");
                }
            }
            // The loop may already be gone after shutdown.
            let _ = done.send(request.language).await;
        });
    }

    fn spawn_stats_worker(&self, request: StatsRefresh, key: String, done: mpsc::Sender<String>) {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            info!(owner = %request.owner, name = %request.name, "stats refresh started");
            match refresh_stats(client.as_ref(), store.as_ref(), &request).await {
                Ok(()) => info!(owner = %request.owner, name = %request.name, "stats refresh done"),
                Err(e) => {
                    error!(
                        owner = %request.owner,
                        name = %request.name,
                        error = %e,
                        "stats refresh failed"
                    );
                }
            }
            let _ = done.send(key).await;
        });
    }
}

async fn refresh_projects(
    client: &dyn GithubClient,
    store: &dyn KVStore,
    request: &ProjectsRefresh,
) -> Result<(), Error> {
    // Detached token: serving later requests depends on this fill finishing,
    // so the refresh must not die with the caller that triggered it.
    let cancel = CancellationToken::new();
    let data = client
        .projects_by_language(&cancel, &request.language, request.count)
        .await?;

    let entry = ProjectsEntry {
        created: unix_now(),
        count: request.count,
        data,
    };
    let encoded = serde_json::to_vec(&entry)
        .map_err(|e| Error::Internal(format!("serializing projects entry: {e}")))?;
    store.write(&projects_key(&request.language), &encoded)
}

async fn refresh_stats(
    client: &dyn GithubClient,
    store: &dyn KVStore,
    request: &StatsRefresh,
) -> Result<(), Error> {
    let cancel = CancellationToken::new();
    let data = client
        .stats_by_project(&cancel, &request.name, &request.owner)
        .await?;

    let entry = StatsEntry {
        created: unix_now(),
        data,
    };
    let encoded = serde_json::to_vec(&entry)
        .map_err(|e| Error::Internal(format!("serializing stats entry: {e}")))?;
    store.write(&stats_key(&request.name, &request.owner), &encoded)
}
