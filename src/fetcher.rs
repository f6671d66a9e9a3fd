//! Batched content fetching with per-file isolation.
//!
//! [`ContentFetcher`] realizes a selection into [`FetchedFile`]s. Files are
//! fetched in fixed-size batches; a batch runs concurrently and the next
//! one starts only after it has settled. Each fetch is individually time
//! bounded, and a failure only removes that file from the output.

use async_trait::async_trait;
use futures::future::join_all;
use repo_intake_core::analysis::{analyze_content, apply_analysis};
use repo_intake_core::models::{FetchedFile, ScoredFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::FetchConfig;
use crate::error::{IntakeError, Result};
use crate::github::RepoRef;

/// Anything that can produce the text of a repository file.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_content(&self, repo: &RepoRef, path: &str) -> Result<String>;
}

/// One file that could not be realized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchError {
    pub path: String,
    pub code: String,
    pub message: String,
}

impl FetchError {
    fn new(path: &str, err: &IntakeError) -> Self {
        Self {
            path: path.to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchStatistics {
    pub requested_files: usize,
    pub analyzed_files: usize,
    pub total_bytes: u64,
    /// Realized files per lowercased extension (`""` for none).
    pub by_extension: BTreeMap<String, usize>,
    pub elapsed_ms: u64,
    pub errors: Vec<FetchError>,
    /// The deadline cut the run short.
    pub partial: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub files: Vec<FetchedFile>,
    pub statistics: FetchStatistics,
}

pub struct ContentFetcher {
    batch_size: usize,
    per_file_timeout: Duration,
}

impl Default for ContentFetcher {
    fn default() -> Self {
        Self::new(&FetchConfig::default())
    }
}

impl ContentFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            per_file_timeout: Duration::from_secs(config.per_file_timeout_secs),
        }
    }

    #[must_use]
    pub fn with_per_file_timeout(mut self, timeout: Duration) -> Self {
        self.per_file_timeout = timeout;
        self
    }

    /// Fetch and analyze `files` in selection order.
    ///
    /// `on_batch` is called after each settled batch with the number of
    /// files attempted so far. When `deadline` passes, no new batch starts,
    /// the in-flight batch is abandoned, and the statistics are `partial`.
    pub async fn fetch_all<S, F>(
        &self,
        source: &S,
        repo: &RepoRef,
        files: &[ScoredFile],
        deadline: Option<Instant>,
        mut on_batch: F,
    ) -> FetchOutcome
    where
        S: ContentSource + ?Sized,
        F: FnMut(usize, usize),
    {
        let started = Instant::now();
        let mut outcome = FetchOutcome {
            files: Vec::with_capacity(files.len()),
            statistics: FetchStatistics {
                requested_files: files.len(),
                ..Default::default()
            },
        };

        let mut attempted = 0usize;
        for batch in files.chunks(self.batch_size) {
            let fetches = join_all(batch.iter().map(|file| self.fetch_one(source, repo, file)));

            let settled = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        outcome.statistics.partial = true;
                        break;
                    }
                    match tokio::time::timeout(remaining, fetches).await {
                        Ok(results) => results,
                        Err(_) => {
                            tracing::warn!(attempted, "fetch deadline reached; abandoning batch");
                            outcome.statistics.partial = true;
                            break;
                        }
                    }
                }
                None => fetches.await,
            };

            for (file, result) in batch.iter().zip(settled) {
                match result {
                    Ok(fetched) => outcome.files.push(fetched),
                    Err(err) => {
                        tracing::warn!(path = file.path(), error = %err, "file fetch failed");
                        outcome.statistics.errors.push(FetchError::new(file.path(), &err));
                    }
                }
            }
            attempted += batch.len();
            tracing::debug!(attempted, total = files.len(), "fetch batch settled");
            on_batch(attempted, files.len());
        }

        let stats = &mut outcome.statistics;
        stats.analyzed_files = outcome.files.len();
        for file in &outcome.files {
            stats.total_bytes += file.content.len() as u64;
            let ext = file.file.node.extension().unwrap_or_default();
            *stats.by_extension.entry(ext).or_insert(0) += 1;
        }
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    async fn fetch_one<S>(&self, source: &S, repo: &RepoRef, file: &ScoredFile) -> Result<FetchedFile>
    where
        S: ContentSource + ?Sized,
    {
        let content = tokio::time::timeout(self.per_file_timeout, source.fetch_content(repo, file.path()))
            .await
            .map_err(|_| IntakeError::Timeout(file.path().to_string()))??;

        let analysis = analyze_content(&content);
        let mut file = file.clone();
        apply_analysis(&mut file, &analysis);
        Ok(FetchedFile {
            file,
            content,
            analysis,
        })
    }
}
