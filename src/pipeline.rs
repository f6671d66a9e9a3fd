//! End-to-end analysis of one repository.
//!
//! ```text
//! metadata ─▶ listing ─▶ selection ─▶ batched fetch ─▶ chunks ─▶ index
//!    5%         15%         25%          30–70%          80%      90%
//! ```
//!
//! Every run ends in an [`AnalysisReport`] with a terminal status: a
//! failure becomes status `failed` with a short message, and a deadline
//! overrun becomes status `partial` carrying whatever was gathered.
//! Progress is reported as partial updates through a [`ProgressSink`].

use repo_intake_core::chunk::ChunkExtractor;
use repo_intake_core::digest::{build_context_document, fit_chunks_to_budget};
use repo_intake_core::models::{
    ChunkType, CodeChunk, RepositoryMetadata, ScoredFile, SelectionResult, SelectionSummary,
};
use repo_intake_core::select::RepoStats;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::IntakeError;
use crate::fetcher::{ContentFetcher, FetchStatistics};
use crate::github::types::{CommitSummary, Contributor};
use crate::github::{GitHubClient, RepoRef};
use crate::index::{IndexReport, VectorIndex};
use crate::progress::{ProgressSink, ProgressUpdate, RunStatus};

/// One recorded problem. Best-effort degradations, per-file fetch
/// failures and the terminal failure all land here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportError {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub code: String,
    pub message: String,
}

impl ReportError {
    fn new(stage: &str, err: &IntakeError) -> Self {
        Self {
            stage: stage.to_string(),
            path: None,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub run_id: String,
    pub repository: String,
    #[serde(default)]
    pub git_ref: Option<String>,
    pub status: RunStatus,
    pub progress: u8,
    pub message: String,
    pub partial: bool,
    #[serde(default)]
    pub metadata: Option<RepositoryMetadata>,
    #[serde(default)]
    pub selection: Option<SelectionSummary>,
    #[serde(default)]
    pub selected_files: Vec<ScoredFile>,
    #[serde(default)]
    pub statistics: Option<FetchStatistics>,
    #[serde(default)]
    pub chunk_counts: BTreeMap<ChunkType, usize>,
    #[serde(default)]
    pub chunks: Vec<CodeChunk>,
    #[serde(default)]
    pub index: Option<IndexReport>,
    #[serde(default)]
    pub recent_commits: Vec<CommitSummary>,
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    #[serde(default)]
    pub errors: Vec<ReportError>,
    #[serde(default)]
    pub context_document: Option<String>,
    pub elapsed_ms: u64,
}

impl AnalysisReport {
    fn new(run_id: String, repo: &RepoRef) -> Self {
        Self {
            run_id,
            repository: repo.full_name(),
            git_ref: repo.git_ref.clone(),
            status: RunStatus::InProgress,
            progress: 0,
            message: String::new(),
            partial: false,
            metadata: None,
            selection: None,
            selected_files: Vec::new(),
            statistics: None,
            chunk_counts: BTreeMap::new(),
            chunks: Vec::new(),
            index: None,
            recent_commits: Vec::new(),
            contributors: Vec::new(),
            errors: Vec::new(),
            context_document: None,
            elapsed_ms: 0,
        }
    }
}

/// Output of the discovery stages: everything up to and including selection.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub metadata: RepositoryMetadata,
    pub git_ref: String,
    pub selection: SelectionResult,
    pub stats: RepoStats,
    pub recent_commits: Vec<CommitSummary>,
    pub contributors: Vec<Contributor>,
}

/// Why a run stopped early.
enum Halt {
    Failed(IntakeError),
    Deadline,
}

impl From<IntakeError> for Halt {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::PipelineDeadlineExceeded => Halt::Deadline,
            other => Halt::Failed(other),
        }
    }
}

pub struct AnalysisPipeline {
    client: Arc<GitHubClient>,
    config: Config,
    extractor: ChunkExtractor,
    fetcher: ContentFetcher,
    index: Option<VectorIndex>,
}

impl AnalysisPipeline {
    pub fn new(client: Arc<GitHubClient>, config: Config) -> Self {
        let extractor = ChunkExtractor::new(config.chunking.clone());
        let fetcher = ContentFetcher::new(&config.fetch);
        Self {
            client,
            config,
            extractor,
            fetcher,
            index: None,
        }
    }

    /// Index extracted chunks into `index` at the end of each run.
    #[must_use]
    pub fn with_index(mut self, index: VectorIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Analyze `repo`. Never returns an error: failures are reflected in
    /// the report status.
    pub async fn run(&self, repo: &RepoRef, progress: &dyn ProgressSink) -> AnalysisReport {
        self.run_with_id(uuid::Uuid::new_v4().to_string(), repo, progress)
            .await
    }

    /// Like [`run`](Self::run) with a caller-chosen run id, so progress
    /// events and the report share it.
    pub async fn run_with_id(
        &self,
        run_id: String,
        repo: &RepoRef,
        progress: &dyn ProgressSink,
    ) -> AnalysisReport {
        let started = Instant::now();
        let deadline = self.config.pipeline.deadline().map(|d| started + d);
        let mut report = AnalysisReport::new(run_id.clone(), repo);

        tracing::info!(run_id = %run_id, repo = %repo, "analysis started");
        progress.update(
            ProgressUpdate::at(0, format!("Analyzing {}", repo))
                .status(RunStatus::InProgress)
                .field("runId", &run_id)
                .field("repository", &report.repository),
        );

        let outcome = self.execute(repo, deadline, progress, &mut report).await;

        let (status, message) = match outcome {
            Ok(()) => {
                report.progress = 100;
                (RunStatus::Completed, "Analysis complete".to_string())
            }
            Err(Halt::Deadline) => {
                report.partial = true;
                report.errors.push(ReportError::new(
                    "pipeline",
                    &IntakeError::PipelineDeadlineExceeded,
                ));
                (
                    RunStatus::Partial,
                    IntakeError::PipelineDeadlineExceeded.user_message(),
                )
            }
            Err(Halt::Failed(err)) => {
                tracing::warn!(run_id = %run_id, error = %err, "analysis failed");
                report.errors.push(ReportError::new("pipeline", &err));
                (RunStatus::Failed, err.user_message())
            }
        };

        report.status = status;
        report.message = message.clone();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        let mut last = ProgressUpdate::new().status(status).field("elapsedMs", &report.elapsed_ms);
        last.progress = Some(report.progress);
        last.message = Some(message);
        if !report.errors.is_empty() {
            last = last.field("errors", &report.errors);
        }
        progress.update(last);

        tracing::info!(
            run_id = %run_id,
            status = status.as_str(),
            elapsed_ms = report.elapsed_ms,
            "analysis finished"
        );
        report
    }

    async fn execute(
        &self,
        repo: &RepoRef,
        deadline: Option<Instant>,
        progress: &dyn ProgressSink,
        report: &mut AnalysisReport,
    ) -> Result<(), Halt> {
        let stage = |report: &mut AnalysisReport, pct: u8, message: String| {
            report.progress = pct;
            progress.update(ProgressUpdate::at(pct, message));
        };

        // ============ Discovery ============

        let last_pct = AtomicU8::new(report.progress);
        let discovery = self
            .discover_inner(repo, deadline, &mut report.errors, |pct, msg| {
                last_pct.store(pct, Ordering::Relaxed);
                progress.update(ProgressUpdate::at(pct, msg));
            })
            .await;
        report.progress = last_pct.load(Ordering::Relaxed);
        let discovery = discovery?;
        report.progress = 25;
        report.metadata = Some(discovery.metadata.clone());
        report.git_ref = Some(discovery.git_ref.clone());
        report.selection = Some(discovery.selection.summary.clone());
        report.selected_files = discovery.selection.files.clone();
        report.recent_commits = discovery.recent_commits.clone();
        report.contributors = discovery.contributors.clone();
        progress.update(
            ProgressUpdate::at(
                25,
                format!("Selected {} files", discovery.selection.summary.selected_count),
            )
            .field("selection", &discovery.selection.summary),
        );

        // ============ Fetch ============

        let target = RepoRef::new(&repo.owner, &repo.name).with_ref(Some(discovery.git_ref.clone()));
        stage(report, 30, "Fetching file contents".to_string());
        let outcome = self
            .fetcher
            .fetch_all(
                self.client.as_ref(),
                &target,
                &discovery.selection.files,
                deadline,
                |done, total| {
                    let pct = 30 + (40 * done / total.max(1)) as u8;
                    progress.update(ProgressUpdate::at(pct, format!("Fetched {} / {} files", done, total)));
                },
            )
            .await;
        report.progress = 70;
        for e in &outcome.statistics.errors {
            report.errors.push(ReportError {
                stage: "fetch".to_string(),
                path: Some(e.path.clone()),
                code: e.code.clone(),
                message: e.message.clone(),
            });
        }
        progress.update(ProgressUpdate::new().field("statistics", &outcome.statistics));
        report.partial = outcome.statistics.partial;
        report.statistics = Some(outcome.statistics);

        // ============ Chunks ============

        let chunks = self.extractor.extract_files(&outcome.files);
        for chunk in &chunks {
            *report.chunk_counts.entry(chunk.chunk_type).or_insert(0) += 1;
        }
        stage(report, 80, format!("Extracted {} chunks", chunks.len()));
        progress.update(ProgressUpdate::new().field("chunkCounts", &report.chunk_counts));

        report.context_document = Some(build_context_document(
            &discovery.metadata,
            &outcome.files,
            self.config.output.document,
        ));

        // Set before indexing; a deadline overrun there returns early
        report.chunks = match self.config.output.max_chunk_tokens {
            0 => chunks.clone(),
            budget => fit_chunks_to_budget(&chunks, budget),
        };
        if report.partial {
            return Err(Halt::Deadline);
        }

        // ============ Index ============

        if let Some(index) = &self.index {
            check_deadline(deadline)?;
            stage(report, 90, format!("Indexing {} chunks", chunks.len()));
            let namespace = discovery.metadata.full_name.clone();
            let indexed = within(deadline, index.index(&chunks, &namespace)).await?;
            for message in &indexed.errors {
                report.errors.push(ReportError {
                    stage: "index".to_string(),
                    path: None,
                    code: "index".to_string(),
                    message: message.clone(),
                });
            }
            progress.update(ProgressUpdate::new().field("index", &indexed));
            report.index = Some(indexed);
        }
        Ok(())
    }

    /// Run the discovery stages only: metadata, listing and selection.
    pub async fn discover(&self, repo: &RepoRef) -> crate::error::Result<(Discovery, Vec<ReportError>)> {
        let deadline = self.config.pipeline.deadline().map(|d| Instant::now() + d);
        let mut errors = Vec::new();
        match self.discover_inner(repo, deadline, &mut errors, |_, _| {}).await {
            Ok(d) => Ok((d, errors)),
            Err(Halt::Failed(e)) => Err(e),
            Err(Halt::Deadline) => Err(IntakeError::PipelineDeadlineExceeded),
        }
    }

    async fn discover_inner<F>(
        &self,
        repo: &RepoRef,
        deadline: Option<Instant>,
        errors: &mut Vec<ReportError>,
        mut on_stage: F,
    ) -> Result<Discovery, Halt>
    where
        F: FnMut(u8, String),
    {
        let (owner, name) = (repo.owner.as_str(), repo.name.as_str());

        on_stage(5, "Fetching repository metadata".to_string());
        let metadata = within(deadline, self.client.get_repository(owner, name)).await??;
        let git_ref = repo
            .git_ref
            .clone()
            .unwrap_or_else(|| metadata.default_branch.clone());

        on_stage(15, "Listing repository files".to_string());
        let structure = within(deadline, self.client.get_structure(owner, name, Some(&git_ref))).await??;
        tracing::debug!(files = structure.files.len(), truncated = structure.truncated, "listing received");

        let mut stats = RepoStats::from_listing(&structure.files);

        // Linguist names only stand in when no listed file has a known language
        let languages = self
            .best_effort(deadline, errors, "languages", self.client.get_languages(owner, name))
            .await?;
        if stats.language_bytes.is_empty() {
            stats.language_bytes = languages;
        }

        let recent_commits = self
            .best_effort(
                deadline,
                errors,
                "commits",
                self.client
                    .get_recent_commits(owner, name, self.config.selection.recent_commits),
            )
            .await?;
        let mut recent_paths = HashSet::new();
        for commit in recent_commits
            .iter()
            .take(self.config.selection.recent_commit_details)
        {
            let files = self
                .best_effort(
                    deadline,
                    errors,
                    "commit-files",
                    self.client.get_commit_files(owner, name, &commit.sha),
                )
                .await?;
            recent_paths.extend(files);
        }
        stats.recent_paths = recent_paths;

        let contributors = self
            .best_effort(deadline, errors, "contributors", self.client.get_contributors(owner, name, 10))
            .await?;

        let rules = self
            .config
            .github
            .filters
            .path_rules()
            .map_err(|e| Halt::Failed(IntakeError::Api { status: 0, message: e.to_string() }))?;
        let selection = self.config.selection.selector(rules).select(&structure.files, &stats);

        Ok(Discovery {
            metadata,
            git_ref,
            selection,
            stats,
            recent_commits,
            contributors,
        })
    }

    /// Await an auxiliary call, degrading failure to the default value.
    async fn best_effort<T, Fut>(
        &self,
        deadline: Option<Instant>,
        errors: &mut Vec<ReportError>,
        stage: &str,
        fut: Fut,
    ) -> Result<T, Halt>
    where
        T: Default,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        match within(deadline, fut).await? {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(stage, error = %err, "best-effort call failed; using default");
                errors.push(ReportError::new(stage, &err));
                Ok(T::default())
            }
        }
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<(), Halt> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(Halt::Deadline),
        _ => Ok(()),
    }
}

/// Await `fut` unless the deadline passes first.
async fn within<T, Fut>(deadline: Option<Instant>, fut: Fut) -> Result<T, Halt>
where
    Fut: Future<Output = T>,
{
    match deadline {
        None => Ok(fut.await),
        Some(d) => {
            let remaining = d.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Halt::Deadline);
            }
            tokio::time::timeout(remaining, fut)
                .await
                .map_err(|_| Halt::Deadline)
        }
    }
}
