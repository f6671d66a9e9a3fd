//! Wire shapes of the GitHub REST responses we consume, and the
//! domain-level results built from them.

use chrono::{DateTime, TimeZone, Utc};
use repo_intake_core::models::{FileNode, RepositoryMetadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============ Wire types ============

#[derive(Debug, Deserialize)]
pub(crate) struct ApiOwner {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiLicense {
    #[serde(default)]
    pub spdx_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRepository {
    pub name: String,
    pub full_name: String,
    pub owner: ApiOwner,
    #[serde(default)]
    pub description: Option<String>,
    pub default_branch: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub license: Option<ApiLicense>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl From<ApiRepository> for RepositoryMetadata {
    fn from(r: ApiRepository) -> Self {
        let license = r.license.and_then(|l| {
            l.spdx_id
                .filter(|id| id != "NOASSERTION")
                .or(l.name)
        });
        Self {
            owner: r.owner.login,
            name: r.name,
            full_name: r.full_name,
            description: r.description,
            default_branch: r.default_branch,
            language: r.language,
            stars: r.stargazers_count,
            forks: r.forks_count,
            open_issues: r.open_issues_count,
            topics: r.topics,
            license,
            html_url: r.html_url,
            updated_at: r.updated_at,
            size_kb: r.size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTree {
    pub tree: Vec<ApiTreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCommitAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCommitBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<ApiCommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCommit {
    pub sha: String,
    pub commit: ApiCommitBody,
    #[serde(default)]
    pub files: Vec<ApiCommitFile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCommitFile {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiContributor {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub contributions: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRateResource {
    pub limit: u64,
    pub remaining: u64,
    #[serde(default)]
    pub used: u64,
    pub reset: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRateResources {
    pub core: ApiRateResource,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRateLimit {
    pub resources: ApiRateResources,
}

// ============ Domain results ============

/// Filtered listing of one repository snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoStructure {
    pub files: Vec<FileNode>,
    pub directories: Vec<FileNode>,
    /// Sum of file sizes after filtering.
    pub total_size: u64,
    /// Bytes per inferred language tag after filtering.
    pub language_bytes: BTreeMap<String, u64>,
    /// GitHub returned a partial tree.
    pub truncated: bool,
}

/// A commit summary from the commit listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub sha: String,
    /// First line of the commit message.
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl From<ApiCommit> for CommitSummary {
    fn from(c: ApiCommit) -> Self {
        let (author, date) = match c.commit.author {
            Some(a) => (a.name, a.date),
            None => (None, None),
        };
        Self {
            sha: c.sha,
            message: c.commit.message.lines().next().unwrap_or("").to_string(),
            author,
            date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub contributions: u64,
}

/// Quota snapshot from `GET /rate_limit` or response headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitState {
    pub limit: u64,
    pub remaining: u64,
    pub used: u64,
    pub reset_at: DateTime<Utc>,
    /// Remaining quota is at or above the configured buffer.
    pub can_proceed: bool,
}

impl RateLimitState {
    pub fn new(limit: u64, remaining: u64, used: u64, reset_epoch: i64, buffer_pct: f64) -> Self {
        let reset_at = Utc
            .timestamp_opt(reset_epoch, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let floor = limit as f64 * buffer_pct / 100.0;
        Self {
            limit,
            remaining,
            used,
            reset_at,
            can_proceed: remaining as f64 >= floor,
        }
    }

    pub(crate) fn from_api(api: ApiRateLimit, buffer_pct: f64) -> Self {
        let core = api.resources.core;
        Self::new(core.limit, core.remaining, core.used, core.reset, buffer_pct)
    }
}
