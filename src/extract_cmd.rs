//! `intake chunks`: offline chunk extraction for local files.

use anyhow::{Context, Result};
use repo_intake_core::chunk::ChunkExtractor;
use repo_intake_core::language::detect_language;
use repo_intake_core::models::CodeChunk;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Extract chunks from files on disk. Paths in the output are relative to
/// `root` when given, otherwise as passed.
pub fn extract_local_files(config: &Config, files: &[PathBuf], root: Option<&Path>) -> Result<Vec<CodeChunk>> {
    let extractor = ChunkExtractor::new(config.chunking.clone());
    let mut chunks = Vec::new();

    for file in files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let display = root
            .and_then(|r| file.strip_prefix(r).ok())
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        let language = detect_language(&display);
        chunks.extend(extractor.extract(&display, language, &content));
    }

    Ok(chunks)
}

pub fn run_chunks(config: &Config, files: &[PathBuf], root: Option<&Path>, max_tokens: Option<usize>) -> Result<()> {
    let mut chunks = extract_local_files(config, files, root)?;
    if let Some(budget) = max_tokens {
        chunks = repo_intake_core::digest::fit_chunks_to_budget(&chunks, budget);
    }
    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}
