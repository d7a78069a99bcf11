//! Aggregation service.
//!
//! Answers the one query this system exists for: the most active commit
//! authors across the top starred projects of a language. Statistics are
//! fetched for every project in parallel through the cache stack and merged
//! by contributor identity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::client::GithubClient;
use crate::error::Error;
use crate::model::{ContributorStats, Project};

/// The application service on top of the cache stack.
pub struct Service {
    client: Arc<dyn GithubClient>,
    request_timeout: Duration,
}

impl Service {
    /// Creates a service; every query is bounded by `request_timeout`.
    pub fn new(client: Arc<dyn GithubClient>, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// Returns the top `count` contributors by commits, summed across the
    /// top `projects_count` starred projects for `language`.
    ///
    /// Ties are broken by contributor id ascending. The whole operation
    /// runs under a child cancellation scope that fires on `cancel`, on the
    /// configured timeout, and when this method returns, so abandoned
    /// fan-out work aborts promptly.
    pub async fn most_active_contributors(
        &self,
        cancel: &CancellationToken,
        language: &str,
        projects_count: usize,
        count: usize,
    ) -> Result<Vec<ContributorStats>, Error> {
        if count == 0 {
            return Err(Error::InvalidRequest(
                "count must be greater than zero".to_string(),
            ));
        }

        let scoped = cancel.child_token();
        let _guard = scoped.clone().drop_guard();
        let deadline = {
            let scoped = scoped.clone();
            let timeout = self.request_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                scoped.cancel();
            })
        };

        let result = self
            .ranked_contributors(&scoped, language, projects_count, count)
            .await;
        deadline.abort();
        result
    }

    async fn ranked_contributors(
        &self,
        cancel: &CancellationToken,
        language: &str,
        projects_count: usize,
        count: usize,
    ) -> Result<Vec<ContributorStats>, Error> {
        let projects = self
            .client
            .projects_by_language(cancel, language, projects_count)
            .await?;

        let mut stats = self.gather_stats(cancel, projects).await?;

        stats.sort_by(|a, b| {
            b.commits
                .cmp(&a.commits)
                .then(a.contributor.id.cmp(&b.contributor.id))
        });
        stats.truncate(count);

        Ok(stats)
    }

    /// Fetches stats for every project in parallel and merges them by
    /// contributor id. The first failure wins and is returned as-is.
    async fn gather_stats(
        &self,
        cancel: &CancellationToken,
        projects: Vec<Project>,
    ) -> Result<Vec<ContributorStats>, Error> {
        if projects.is_empty() {
            return Ok(Vec::new());
        }

        let (tx, mut rx) = mpsc::channel(projects.len());
        for project in projects {
            let client = Arc::clone(&self.client);
            let tx = tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result = client
                    .stats_by_project(&cancel, &project.name, &project.owner_login)
                    .await;
                let _ = tx.send((project, result)).await;
            });
        }
        drop(tx);

        let mut merged: HashMap<i64, ContributorStats> = HashMap::new();
        while let Some((project, result)) = rx.recv().await {
            let stats = match result {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(
                        owner = %project.owner_login,
                        name = %project.name,
                        error = %e,
                        "retrieving project stats failed"
                    );
                    return Err(e);
                }
            };

            for stat in stats {
                merged
                    .entry(stat.contributor.id)
                    .or_insert_with(|| ContributorStats {
                        contributor: stat.contributor.clone(),
                        commits: 0,
                    })
                    .commits += stat.commits;
            }
        }

        Ok(merged.into_values().collect())
    }
}
