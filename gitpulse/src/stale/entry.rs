//! Persisted entry formats and key derivation.
//!
//! Entries are self-describing JSON. Field names (`Created`, `Count`,
//! `Data`) and key shapes (`pr/<language>`, `st/<owner>/<name>`) match the
//! original deployment so existing databases remain readable. Decoding
//! tolerates missing and unknown fields.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::model::{ContributorStats, Project};

/// Persisted top-projects result for one language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ProjectsEntry {
    /// Unix seconds at which the refresh worker produced this entry.
    #[serde(default)]
    pub created: i64,
    /// The `per_page` argument that produced `data`; `data.len() <= count`.
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub data: Vec<Project>,
}

/// Persisted contributor statistics for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StatsEntry {
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub data: Vec<ContributorStats>,
}

pub(crate) fn projects_key(language: &str) -> Vec<u8> {
    format!("pr/{language}").into_bytes()
}

pub(crate) fn stats_key(name: &str, owner: &str) -> Vec<u8> {
    format!("st/{owner}/{name}").into_bytes()
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
