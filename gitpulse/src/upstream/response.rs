//! Wire-format types for the two GitHub endpoints.
//!
//! Only the fields this service projects out are declared; everything else
//! in the responses is ignored.

use serde::Deserialize;

use crate::model::{Contributor, ContributorStats, Project};

/// `GET /search/repositories` response.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchResponseItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResponseItem {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    owner: SearchResponseItemOwner,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponseItemOwner {
    #[serde(default)]
    login: String,
}

impl SearchResponse {
    pub(crate) fn into_projects(self) -> Vec<Project> {
        self.items
            .into_iter()
            .map(|item| Project {
                id: item.id,
                name: item.name,
                owner_login: item.owner.login,
            })
            .collect()
    }
}

/// `GET /repos/{owner}/{name}/stats/contributors` response.
pub(crate) type StatsResponse = Vec<StatsResponseItem>;

#[derive(Debug, Deserialize)]
pub(crate) struct StatsResponseItem {
    #[serde(default)]
    total: u64,
    // GitHub reports anonymous authors as `"author": null`.
    #[serde(default)]
    author: Option<StatsResponseAuthor>,
}

#[derive(Debug, Default, Deserialize)]
struct StatsResponseAuthor {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    login: String,
}

pub(crate) fn into_stats(response: StatsResponse) -> Vec<ContributorStats> {
    response
        .into_iter()
        .map(|item| {
            let author = item.author.unwrap_or_default();
            ContributorStats {
                contributor: Contributor {
                    id: author.id,
                    login: author.login,
                },
                commits: item.total,
            }
        })
        .collect()
}
