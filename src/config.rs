//! TOML configuration.
//!
//! Every section carries serde defaults, so a missing or empty file yields
//! a working configuration. [`load_config`] parses and validates a file;
//! [`load_or_default`] falls back to [`Config::default`] when the file
//! does not exist.
//!
//! ```toml
//! [github]
//! token_env = "GITHUB_TOKEN"
//! cache_ttl_secs = 300
//!
//! [selection]
//! max_files = 50
//!
//! [selection.weights]
//! entry_point = 80.0
//!
//! [embedding]
//! provider = "hash"
//! dims = 256
//! ```

use anyhow::{bail, Context, Result};
use repo_intake_core::chunk::ChunkerConfig;
use repo_intake_core::digest::DocumentLimits;
use repo_intake_core::rules::PathRules;
use repo_intake_core::select::{FileSelector, ScoringWeights, SelectionBudget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub selection: SelectionConfig,
    pub fetch: FetchConfig,
    pub chunking: ChunkerConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

// ============ GitHub ============

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    /// Environment variable holding the access token.
    pub token_env: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// Calls fail fast once remaining quota drops below this share of the limit.
    pub rate_limit_buffer_pct: f64,
    /// Content larger than this is rejected before decoding.
    pub max_file_bytes: u64,
    pub retry: RetryConfig,
    pub filters: FilterConfig,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            user_agent: format!("repo-intake/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            cache_ttl_secs: 300,
            rate_limit_buffer_pct: 10.0,
            max_file_bytes: 1024 * 1024,
            retry: RetryConfig::default(),
            filters: FilterConfig::default(),
        }
    }
}

impl GitHubConfig {
    /// Token from the configured environment variable, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Longest rate-limit reset wait worth sleeping through.
    pub max_rate_limit_wait_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_rate_limit_wait_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl FilterConfig {
    pub fn path_rules(&self) -> Result<PathRules> {
        PathRules::new(&self.include_globs, &self.exclude_globs)
    }
}

// ============ Selection ============

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SelectionConfig {
    pub max_files: usize,
    pub max_total_bytes: u64,
    pub max_file_bytes: u64,
    pub top_languages: usize,
    pub high_complexity_bytes: u64,
    /// Recent commits listed for the recently-modified signal.
    pub recent_commits: usize,
    /// How many of those commits have their file lists fetched.
    pub recent_commit_details: usize,
    pub weights: ScoringWeights,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let budget = SelectionBudget::default();
        Self {
            max_files: budget.max_files,
            max_total_bytes: budget.max_total_bytes,
            max_file_bytes: budget.max_file_bytes,
            top_languages: 3,
            high_complexity_bytes: 20_000,
            recent_commits: 20,
            recent_commit_details: 5,
            weights: ScoringWeights::default(),
        }
    }
}

impl SelectionConfig {
    pub fn budget(&self) -> SelectionBudget {
        SelectionBudget {
            max_files: self.max_files,
            max_total_bytes: self.max_total_bytes,
            max_file_bytes: self.max_file_bytes,
        }
    }

    pub fn selector(&self, rules: PathRules) -> FileSelector {
        FileSelector::new(self.weights.clone(), self.budget())
            .with_rules(rules)
            .with_top_languages(self.top_languages)
            .with_high_complexity_bytes(self.high_complexity_bytes)
    }
}

// ============ Fetch ============

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub batch_size: usize,
    pub per_file_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            per_file_timeout_secs: 15,
        }
    }
}

// ============ Embedding ============

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama server, OpenAI-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: Some(DEFAULT_HASH_DIMS),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Dimensionality of the hash embedder when `dims` is unset.
pub const DEFAULT_HASH_DIMS: usize = 256;

fn default_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

// ============ Index / pipeline / output / server ============

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// SQLite file for the persistent vector store.
    pub db_path: PathBuf,
    /// Chunks embedded per provider call.
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/intake.sqlite"),
            batch_size: 32,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hard cutoff for a whole analysis run. `0` disables it.
    pub deadline_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { deadline_secs: 300 }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub document: DocumentLimits,
    /// Token budget for the chunk list included in reports. `0` keeps all.
    pub max_chunk_tokens: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7341".to_string(),
        }
    }
}

/// Parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

/// Reject configurations that cannot produce a meaningful run.
pub fn validate(config: &Config) -> Result<()> {
    if config.selection.max_files == 0 {
        bail!("selection.max_files must be > 0");
    }
    if config.selection.max_total_bytes == 0 || config.selection.max_file_bytes == 0 {
        bail!("selection byte budgets must be > 0");
    }

    if config.fetch.batch_size == 0 {
        bail!("fetch.batch_size must be > 0");
    }
    if config.fetch.per_file_timeout_secs == 0 {
        bail!("fetch.per_file_timeout_secs must be > 0");
    }

    if !(0.0..100.0).contains(&config.github.rate_limit_buffer_pct) {
        bail!("github.rate_limit_buffer_pct must be in [0, 100)");
    }
    if config.github.retry.max_attempts == 0 {
        bail!("github.retry.max_attempts must be >= 1");
    }
    if config.github.retry.initial_delay_ms > config.github.retry.max_delay_ms {
        bail!("github.retry.initial_delay_ms must not exceed max_delay_ms");
    }
    config
        .github
        .filters
        .path_rules()
        .context("Invalid github.filters glob")?;

    if config.chunking.max_chunk_lines == 0 {
        bail!("chunking.max_chunk_lines must be > 0");
    }
    if config.index.batch_size == 0 {
        bail!("index.batch_size must be > 0");
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.selection.max_files, 50);
        assert_eq!(config.fetch.batch_size, 5);
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.chunking.min_chunk_chars, 10);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let file = write_config(
            "[selection]\nmax_files = 10\n\n[selection.weights]\nentry_point = 5.0\n\n[github.retry]\nmax_attempts = 7\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.selection.max_files, 10);
        assert_eq!(config.selection.max_total_bytes, 1024 * 1024);
        assert_eq!(config.selection.weights.entry_point, 5.0);
        assert_eq!(config.selection.weights.priority_file, 100.0);
        assert_eq!(config.github.retry.max_attempts, 7);
        assert_eq!(config.github.retry.initial_delay_ms, 1_000);
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let file = write_config("[fetch]\nbatch_size = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("fetch.batch_size"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let file = write_config("[embedding]\nprovider = \"magic\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_openai_requires_model() {
        let file = write_config("[embedding]\nprovider = \"openai\"\ndims = 1536\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_rejects_invalid_filter_glob() {
        let file = write_config("[github.filters]\ninclude_globs = [\"src/[\"]\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_or_default(Path::new("/nonexistent/intake.toml")).unwrap();
        assert_eq!(config.pipeline.deadline(), Some(Duration::from_secs(300)));
    }
}
