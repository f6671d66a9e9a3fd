//! `intake analyze`, `intake select` and `intake rate-limit`.
//!
//! Thin command wrappers over [`AnalysisPipeline`] and [`GitHubClient`]:
//! build the client from config, run, print a summary to stdout.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::github::{GitHubClient, RepoRef};
use crate::index::open_sqlite_index;
use crate::pipeline::{AnalysisPipeline, AnalysisReport};
use crate::progress::{ProgressMode, RunStatus};

/// Options for `intake analyze`.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeArgs {
    pub repo: String,
    pub git_ref: Option<String>,
    /// Persist chunks into the SQLite vector index.
    pub index: bool,
    /// Write the full JSON report here.
    pub output: Option<std::path::PathBuf>,
    /// Print the full JSON report on stdout instead of a summary.
    pub json: bool,
    /// Also write the context document here.
    pub document: Option<std::path::PathBuf>,
}

pub async fn run_analyze(config: &Config, args: AnalyzeArgs, progress: ProgressMode) -> Result<()> {
    let repo = RepoRef::parse(&args.repo)?.with_ref(args.git_ref.clone());
    let client = Arc::new(GitHubClient::new(&config.github)?);

    let mut pipeline = AnalysisPipeline::new(client, config.clone());
    if args.index {
        if !config.embedding.is_enabled() {
            bail!("--index requires embeddings. Set [embedding] provider in config.");
        }
        pipeline = pipeline.with_index(open_sqlite_index(config).await?);
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let sink = progress.sink(&run_id, &repo.full_name());
    let report = pipeline.run_with_id(run_id, &repo, sink.as_ref()).await;

    if let Some(path) = &args.output {
        write_json(path, &report)?;
    }
    if let (Some(path), Some(doc)) = (&args.document, &report.context_document) {
        std::fs::write(path, doc).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if report.status == RunStatus::Failed {
        bail!("{}", report.message);
    }
    Ok(())
}

fn write_json(path: &Path, report: &AnalysisReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    println!("{} [{}] {}", report.repository, report.status.as_str(), report.message);
    if let Some(selection) = &report.selection {
        println!(
            "  selected: {} of {} eligible files ({} bytes)",
            selection.selected_count, selection.total_eligible, selection.total_size
        );
    }
    if let Some(stats) = &report.statistics {
        println!(
            "  fetched:  {}/{} files, {} bytes, {} errors",
            stats.analyzed_files,
            stats.requested_files,
            stats.total_bytes,
            stats.errors.len()
        );
    }
    if !report.chunk_counts.is_empty() {
        let counts: Vec<String> = report
            .chunk_counts
            .iter()
            .map(|(t, n)| format!("{}={}", t, n))
            .collect();
        println!("  chunks:   {}", counts.join(" "));
    }
    if let Some(index) = &report.index {
        println!("  indexed:  {} ({} errors)", index.indexed_count, index.errors.len());
    }
    for err in report.errors.iter().take(10) {
        match &err.path {
            Some(path) => println!("  ! {} {}: {}", err.stage, path, err.message),
            None => println!("  ! {}: {}", err.stage, err.message),
        }
    }
    if report.errors.len() > 10 {
        println!("  ! ... {} more", report.errors.len() - 10);
    }
    println!("  elapsed:  {}ms", report.elapsed_ms);
}

/// Print the ranked selection without fetching any file contents.
pub async fn run_select(config: &Config, repo: &str, git_ref: Option<String>, json: bool) -> Result<()> {
    let repo = RepoRef::parse(repo)?.with_ref(git_ref);
    let client = Arc::new(GitHubClient::new(&config.github)?);
    let pipeline = AnalysisPipeline::new(client, config.clone());

    let (discovery, errors) = pipeline
        .discover(&repo)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;

    if json {
        let out = serde_json::json!({
            "repository": discovery.metadata.full_name,
            "ref": discovery.git_ref,
            "summary": discovery.selection.summary,
            "files": discovery.selection.files,
            "errors": errors,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let summary = &discovery.selection.summary;
    println!(
        "{}@{}: {} of {} eligible files selected",
        discovery.metadata.full_name, discovery.git_ref, summary.selected_count, summary.total_eligible
    );
    for (i, file) in discovery.selection.files.iter().enumerate() {
        println!(
            "{:>3}. [{:>6.1}] {:<16} {}",
            i + 1,
            file.score,
            file.category.to_string(),
            file.path()
        );
    }
    for err in &errors {
        println!("  ! {}: {}", err.stage, err.message);
    }
    Ok(())
}

pub async fn run_rate_limit(config: &Config) -> Result<()> {
    let client = GitHubClient::new(&config.github)?;
    let state = client
        .rate_limit_status()
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;

    println!("limit:     {}", state.limit);
    println!("remaining: {}", state.remaining);
    println!("used:      {}", state.used);
    println!("resets at: {}", state.reset_at.to_rfc3339());
    println!(
        "status:    {}",
        if state.can_proceed { "ok" } else { "below buffer" }
    );
    Ok(())
}
