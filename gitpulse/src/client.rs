//! The client seam shared by every cache layer.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::model::{ContributorStats, Project};

/// Anything that can answer the two GitHub queries this service needs.
///
/// The upstream client implements this trait against the real API; the
/// stale-data layer and the LRU cache wrap another implementation and add
/// their own caching semantics, so the layers stack as `Arc<dyn GithubClient>`.
///
/// `cancel` plays the role the request context plays in the upstream API:
/// implementations abort at their next suspension point once it fires.
#[async_trait]
pub trait GithubClient: Send + Sync {
    /// Returns up to `count` projects for `language`, most-starred first.
    async fn projects_by_language(
        &self,
        cancel: &CancellationToken,
        language: &str,
        count: usize,
    ) -> Result<Vec<Project>, Error>;

    /// Returns per-contributor commit totals for one project.
    async fn stats_by_project(
        &self,
        cancel: &CancellationToken,
        name: &str,
        owner: &str,
    ) -> Result<Vec<ContributorStats>, Error>;
}
