//! Domain entities.
//!
//! The serde renames reproduce the JSON field names used by the original
//! deployment's databases (`ID`, `Name`, `OwnerLogin`, ...), so persisted
//! entries written by either implementation stay readable by both.

use serde::{Deserialize, Serialize};

/// A GitHub repository, identified in URLs by `(owner_login, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
    #[serde(rename = "ID", default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_login: String,
}

/// A commit author, unique by `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contributor {
    #[serde(rename = "ID", default)]
    pub id: i64,
    #[serde(default)]
    pub login: String,
}

/// Commit count for one contributor, within one project or aggregated
/// across several.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContributorStats {
    #[serde(default)]
    pub contributor: Contributor,
    #[serde(default)]
    pub commits: u64,
}
