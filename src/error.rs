//! Typed failure taxonomy for the intake pipeline.
//!
//! Every fallible GitHub call and pipeline stage returns [`IntakeError`].
//! Retry policy keys off [`IntakeError::is_retryable`]; end-user surfaces
//! show [`IntakeError::user_message`].

use chrono::{DateTime, Utc};

/// Errors that can occur while ingesting a repository.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntakeError {
    /// The repository, ref or path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or insufficient credentials.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Quota exhausted or below the configured buffer.
    #[error("rate limited until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// File exceeds the content size limit.
    #[error("{path} is too large ({size} bytes, limit {limit})")]
    TooLarge { path: String, size: u64, limit: u64 },

    /// Path is a directory, symlink or submodule.
    #[error("not a regular file: {0}")]
    NotAFile(String),

    /// Connection failure or 5xx response.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A single request or fetch exceeded its time bound.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The whole run exceeded its deadline.
    #[error("pipeline deadline exceeded")]
    PipelineDeadlineExceeded,

    /// Response body or file content could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Any other API error response.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Result type alias using `IntakeError`.
pub type Result<T> = std::result::Result<T, IntakeError>;

impl IntakeError {
    /// Whether retrying the same call may succeed.
    ///
    /// `RateLimited` is retryable only when the wait until reset is short;
    /// that decision belongs to the retry policy, which inspects `reset_at`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IntakeError::Transient(_) | IntakeError::Timeout(_) | IntakeError::RateLimited { .. }
        )
    }

    /// Short, human-readable text for end users.
    pub fn user_message(&self) -> String {
        match self {
            IntakeError::NotFound(_) => {
                "Repository not found. Check the owner/name and that it is public, or provide a token."
                    .to_string()
            }
            IntakeError::AccessDenied(_) => {
                "Access denied. Provide a GitHub token with read access to this repository.".to_string()
            }
            IntakeError::RateLimited { reset_at } => format!(
                "GitHub rate limit reached. Try again after {}.",
                reset_at.format("%H:%M UTC")
            ),
            IntakeError::TooLarge { path, .. } => format!("{} is too large to analyze.", path),
            IntakeError::NotAFile(path) => format!("{} is not a regular file.", path),
            IntakeError::Transient(_) => "GitHub is temporarily unavailable. Please retry.".to_string(),
            IntakeError::Timeout(_) => "The request timed out. Please retry.".to_string(),
            IntakeError::PipelineDeadlineExceeded => {
                "Analysis took too long; partial results were kept.".to_string()
            }
            IntakeError::Decode(_) => "Received content that could not be decoded.".to_string(),
            IntakeError::Api { status, .. } => format!("GitHub returned an error (HTTP {}).", status),
        }
    }

    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::NotFound(_) => "not_found",
            IntakeError::AccessDenied(_) => "access_denied",
            IntakeError::RateLimited { .. } => "rate_limited",
            IntakeError::TooLarge { .. } => "too_large",
            IntakeError::NotAFile(_) => "not_a_file",
            IntakeError::Transient(_) => "transient",
            IntakeError::Timeout(_) => "timeout",
            IntakeError::PipelineDeadlineExceeded => "deadline_exceeded",
            IntakeError::Decode(_) => "decode",
            IntakeError::Api { .. } => "api_error",
        }
    }
}

impl From<reqwest::Error> for IntakeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IntakeError::Timeout(e.to_string())
        } else if e.is_decode() {
            IntakeError::Decode(e.to_string())
        } else {
            IntakeError::Transient(e.to_string())
        }
    }
}

impl From<serde_json::Error> for IntakeError {
    fn from(e: serde_json::Error) -> Self {
        IntakeError::Decode(e.to_string())
    }
}
