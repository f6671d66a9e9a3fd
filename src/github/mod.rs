//! GitHub REST client.
//!
//! [`GitHubClient`] wraps `reqwest` with the three behaviours every call
//! shares:
//!
//! - **Cache**: responses are cached per logical resource for a fixed TTL
//!   ([`cache::TtlCache`]). A fresh hit never touches the network.
//! - **Rate-limit gate**: before an uncached call the quota is refreshed
//!   and the call fails fast with `RateLimited` when the remaining budget
//!   is below the configured buffer ([`rate_limit::RateLimitTracker`]).
//! - **Retry**: transient failures are retried with exponential backoff
//!   ([`retry::with_retry`]).
//!
//! Clients are constructed explicitly and shared by `Arc`; tests point
//! them at a mock server with [`GitHubClient::with_base_url`].

pub mod cache;
pub mod rate_limit;
pub mod retry;
pub mod types;

use anyhow::{bail, Context};
use async_trait::async_trait;
use base64::Engine;
use repo_intake_core::models::{FileNode, RepositoryMetadata};
use repo_intake_core::rules::PathRules;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use crate::config::GitHubConfig;
use crate::error::{IntakeError, Result};
use crate::fetcher::ContentSource;
use cache::TtlCache;
use rate_limit::RateLimitTracker;
use retry::{with_retry, RetryPolicy};
use types::{
    ApiCommit, ApiContent, ApiContributor, ApiRateLimit, ApiRepository, ApiTree, CommitSummary,
    Contributor, RateLimitState, RepoStructure,
};

/// An `owner/name` pair with an optional git ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub git_ref: Option<String>,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            git_ref: None,
        }
    }

    pub fn with_ref(mut self, git_ref: Option<String>) -> Self {
        self.git_ref = git_ref.filter(|r| !r.is_empty());
        self
    }

    /// Parse `owner/name`, `owner/name@ref`, or a `github.com` URL.
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let trimmed = input.trim().trim_end_matches('/').trim_end_matches(".git");
        let path = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("github.com/"))
            .unwrap_or(trimmed);
        let (path, git_ref) = match path.split_once('@') {
            Some((p, r)) => (p, Some(r.to_string())),
            None => (path, None),
        };
        let mut parts = path.split('/');
        let (Some(owner), Some(name)) = (parts.next(), parts.next()) else {
            bail!("Expected owner/repo, got '{}'", input);
        };
        if owner.is_empty() || name.is_empty() {
            bail!("Expected owner/repo, got '{}'", input);
        }
        Ok(Self::new(owner, name).with_ref(git_ref))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.git_ref {
            Some(r) => write!(f, "{}/{}@{}", self.owner, self.name, r),
            None => write!(f, "{}/{}", self.owner, self.name),
        }
    }
}

pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    cache: TtlCache,
    rate_limit: RateLimitTracker,
    retry: RetryPolicy,
    max_file_bytes: u64,
    rules: PathRules,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let rules = config
            .filters
            .path_rules()
            .context("Invalid github.filters glob")?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token(),
            cache: TtlCache::new(config.cache_ttl()),
            rate_limit: RateLimitTracker::new(config.rate_limit_buffer_pct),
            retry: RetryPolicy::from(&config.retry),
            max_file_bytes: config.max_file_bytes,
            rules,
        })
    }

    /// Point the client at another API root (GitHub Enterprise, mock servers).
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Replace the cache with an empty one using `ttl`.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = TtlCache::new(ttl);
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: PathRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Last known quota, without a network call.
    pub fn last_rate_limit(&self) -> Option<RateLimitState> {
        self.rate_limit.current()
    }

    // ============ Operations ============

    pub async fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryMetadata> {
        self.cached(cache::repo_key(owner, name), async {
            let api: ApiRepository = self.get_json(&["repos", owner, name], &[]).await?;
            Ok(RepositoryMetadata::from(api))
        })
        .await
    }

    /// Recursive listing of a ref, filtered by the path rules.
    ///
    /// `git_ref = None` resolves the default branch first.
    pub async fn get_structure(
        &self,
        owner: &str,
        name: &str,
        git_ref: Option<&str>,
    ) -> Result<RepoStructure> {
        let git_ref = match git_ref {
            Some(r) => r.to_string(),
            None => self.get_repository(owner, name).await?.default_branch,
        };
        self.cached(cache::tree_key(owner, name, &git_ref), async {
            let tree: ApiTree = self
                .get_json(
                    &["repos", owner, name, "git", "trees", git_ref.as_str()],
                    &[("recursive", "1")],
                )
                .await?;
            if tree.truncated {
                tracing::warn!(repo = %format!("{owner}/{name}"), git_ref = %git_ref, "tree listing truncated by GitHub");
            }
            Ok(self.filter_tree(tree))
        })
        .await
    }

    fn filter_tree(&self, tree: ApiTree) -> RepoStructure {
        let mut structure = RepoStructure {
            truncated: tree.truncated,
            ..Default::default()
        };
        for entry in tree.tree {
            match entry.kind.as_str() {
                "blob" if self.rules.allows_file(&entry.path) => {
                    let mut node = FileNode::file(entry.path, entry.size.unwrap_or(0));
                    node.sha = entry.sha;
                    structure.total_size += node.size.unwrap_or(0);
                    if let Some(lang) = &node.language {
                        *structure.language_bytes.entry(lang.clone()).or_insert(0) +=
                            node.size.unwrap_or(0);
                    }
                    structure.files.push(node);
                }
                "tree" if self.rules.allows_dir(&entry.path) => {
                    structure.directories.push(FileNode::directory(entry.path));
                }
                _ => {}
            }
        }
        structure
    }

    /// Decoded UTF-8 body of one file.
    pub async fn get_file_content(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<String> {
        self.cached(cache::content_key(owner, name, git_ref, path), async {
            let mut segments = vec!["repos", owner, name, "contents"];
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            let value: serde_json::Value = self.get_json(&segments, &[("ref", git_ref)]).await?;
            if value.is_array() {
                return Err(IntakeError::NotAFile(path.to_string()));
            }
            let content: ApiContent = serde_json::from_value(value)?;
            self.decode_content(path, content)
        })
        .await
    }

    fn decode_content(&self, path: &str, content: ApiContent) -> Result<String> {
        if content.kind != "file" {
            return Err(IntakeError::NotAFile(path.to_string()));
        }
        if content.size > self.max_file_bytes {
            return Err(IntakeError::TooLarge {
                path: path.to_string(),
                size: content.size,
                limit: self.max_file_bytes,
            });
        }
        let raw = content.content.unwrap_or_default();
        match content.encoding.as_deref() {
            Some("base64") => {
                let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| IntakeError::Decode(format!("{path}: {e}")))?;
                String::from_utf8(bytes)
                    .map_err(|_| IntakeError::Decode(format!("{path}: not valid UTF-8")))
            }
            Some("none") if content.size > 0 && raw.is_empty() => Err(IntakeError::TooLarge {
                path: path.to_string(),
                size: content.size,
                limit: self.max_file_bytes,
            }),
            _ => Ok(raw),
        }
    }

    pub async fn get_recent_commits(
        &self,
        owner: &str,
        name: &str,
        limit: usize,
    ) -> Result<Vec<CommitSummary>> {
        let per_page = limit.clamp(1, 100).to_string();
        self.cached(format!("commits:{owner}/{name}:{per_page}"), async {
            let commits: Vec<ApiCommit> = self
                .get_json(&["repos", owner, name, "commits"], &[("per_page", per_page.as_str())])
                .await?;
            Ok(commits.into_iter().map(CommitSummary::from).collect())
        })
        .await
    }

    /// Paths touched by one commit.
    pub async fn get_commit_files(&self, owner: &str, name: &str, sha: &str) -> Result<Vec<String>> {
        self.cached(format!("commit:{owner}/{name}@{sha}"), async {
            let commit: ApiCommit = self.get_json(&["repos", owner, name, "commits", sha], &[]).await?;
            Ok(commit.files.into_iter().map(|f| f.filename).collect())
        })
        .await
    }

    /// Bytes per language as reported by GitHub linguist.
    pub async fn get_languages(&self, owner: &str, name: &str) -> Result<BTreeMap<String, u64>> {
        self.cached(format!("languages:{owner}/{name}"), async {
            self.get_json(&["repos", owner, name, "languages"], &[]).await
        })
        .await
    }

    pub async fn get_contributors(
        &self,
        owner: &str,
        name: &str,
        limit: usize,
    ) -> Result<Vec<Contributor>> {
        let per_page = limit.clamp(1, 100).to_string();
        self.cached(format!("contributors:{owner}/{name}:{per_page}"), async {
            let list: Vec<ApiContributor> = self
                .get_json(&["repos", owner, name, "contributors"], &[("per_page", per_page.as_str())])
                .await?;
            Ok(list
                .into_iter()
                .filter_map(|c| {
                    c.login.map(|login| Contributor {
                        login,
                        contributions: c.contributions,
                    })
                })
                .collect())
        })
        .await
    }

    /// Current quota via `GET /rate_limit`. Never cached or gated.
    pub async fn rate_limit_status(&self) -> Result<RateLimitState> {
        let url = self.endpoint(&["rate_limit"], &[])?;
        let response = self.send(url).await?;
        let api: ApiRateLimit = response.json().await?;
        let state = RateLimitState::from_api(api, self.rate_limit.buffer_pct());
        self.rate_limit.set(state.clone());
        Ok(state)
    }

    // ============ Plumbing ============

    async fn cached<T, Fut>(&self, key: String, fetch: Fut) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.cache.get::<T>(&key) {
            tracing::debug!(key = %key, "GitHub cache hit");
            return Ok(hit);
        }
        let value = fetch.await?;
        self.cache.insert(key, &value);
        Ok(value)
    }

    /// Refresh the quota and fail fast if it is under the buffer.
    async fn gate(&self) -> Result<()> {
        if let Err(e) = self.rate_limit_status().await {
            tracing::debug!(error = %e, "rate limit refresh failed; using last known state");
        }
        self.rate_limit.check()
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(segments, query)?;
        let operation = url.path().to_string();
        with_retry(&self.retry, &operation, || {
            let url = url.clone();
            async move {
                self.gate().await?;
                let response = self.send(url).await?;
                Ok(response.json::<T>().await?)
            }
        })
        .await
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| IntakeError::Api {
            status: 0,
            message: format!("invalid API base URL '{}': {}", self.base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| IntakeError::Api {
                status: 0,
                message: format!("API base URL '{}' cannot take a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        self.rate_limit.observe_headers(response.headers());
        check_status(response).await
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let headers = response.headers().clone();
    let path = response.url().path().to_string();
    let quota_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    Err(match status {
        StatusCode::NOT_FOUND => IntakeError::NotFound(path),
        StatusCode::UNAUTHORIZED => IntakeError::AccessDenied(message),
        StatusCode::TOO_MANY_REQUESTS => rate_limit::rate_limited_error(&headers),
        StatusCode::FORBIDDEN if quota_exhausted => rate_limit::rate_limited_error(&headers),
        StatusCode::FORBIDDEN => IntakeError::AccessDenied(message),
        s if s.is_server_error() => IntakeError::Transient(format!("HTTP {}: {}", s.as_u16(), message)),
        s => IntakeError::Api {
            status: s.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl ContentSource for GitHubClient {
    async fn fetch_content(&self, repo: &RepoRef, path: &str) -> Result<String> {
        let git_ref = repo.git_ref.as_deref().unwrap_or("HEAD");
        self.get_file_content(&repo.owner, &repo.name, path, git_ref).await
    }
}
