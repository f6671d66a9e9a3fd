//! `intake search`: query the persistent index from the command line.

use anyhow::{bail, Result};
use repo_intake_core::models::ChunkType;
use repo_intake_core::search::SearchOptions;

use crate::config::Config;
use crate::index::open_sqlite_index;

#[allow(clippy::too_many_arguments)]
pub async fn run_search(
    config: &Config,
    query: &str,
    repo: Option<String>,
    limit: Option<usize>,
    chunk_type: Option<String>,
    language: Option<String>,
    min_score: Option<f32>,
    json: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let chunk_type = chunk_type
        .map(|t| t.parse::<ChunkType>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let defaults = SearchOptions::default();
    let options = SearchOptions {
        namespace: repo,
        limit: limit.unwrap_or(defaults.limit),
        chunk_type,
        language,
        min_score: min_score.unwrap_or(defaults.min_score),
    };

    let index = open_sqlite_index(config).await?;
    let results = index.search(query, &options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let name = result.name.as_deref().unwrap_or("(anonymous)");
        println!(
            "{}. [{:.2}] {} {} ({}:{}-{})",
            i + 1,
            result.score,
            result.chunk_type,
            name,
            result.path,
            result.start_line,
            result.end_line
        );
        let excerpt: String = result
            .content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(120)
            .collect();
        println!("    excerpt: \"{}\"", excerpt.trim());
        println!();
    }

    Ok(())
}
