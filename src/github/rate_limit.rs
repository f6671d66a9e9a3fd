//! Rate-limit bookkeeping.
//!
//! The latest known quota is kept behind a lock and updated from two
//! sources: the `x-ratelimit-*` headers of every response, and an explicit
//! `GET /rate_limit` refresh before each uncached call.

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::header::HeaderMap;
use std::sync::RwLock;

use super::types::RateLimitState;
use crate::error::{IntakeError, Result};

pub struct RateLimitTracker {
    buffer_pct: f64,
    state: RwLock<Option<RateLimitState>>,
}

impl RateLimitTracker {
    pub fn new(buffer_pct: f64) -> Self {
        Self {
            buffer_pct,
            state: RwLock::new(None),
        }
    }

    pub fn buffer_pct(&self) -> f64 {
        self.buffer_pct
    }

    pub fn current(&self) -> Option<RateLimitState> {
        self.state.read().unwrap().clone()
    }

    pub fn set(&self, state: RateLimitState) {
        *self.state.write().unwrap() = Some(state);
    }

    /// Record quota headers from a response, if present.
    pub fn observe_headers(&self, headers: &HeaderMap) {
        if let Some(state) = state_from_headers(headers, self.buffer_pct) {
            self.set(state);
        }
    }

    /// Fail fast when the known quota is below the buffer.
    ///
    /// An unknown state lets the call through. A state whose reset time has
    /// passed is treated as replenished.
    pub fn check(&self) -> Result<()> {
        match self.current() {
            Some(state) if !state.can_proceed && state.reset_at > Utc::now() => {
                Err(IntakeError::RateLimited {
                    reset_at: state.reset_at,
                })
            }
            _ => Ok(()),
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

pub(crate) fn state_from_headers(headers: &HeaderMap, buffer_pct: f64) -> Option<RateLimitState> {
    let limit = header_u64(headers, "x-ratelimit-limit")?;
    let remaining = header_u64(headers, "x-ratelimit-remaining")?;
    let reset = header_u64(headers, "x-ratelimit-reset")?;
    let used = header_u64(headers, "x-ratelimit-used").unwrap_or(limit.saturating_sub(remaining));
    Some(RateLimitState::new(limit, remaining, used, reset as i64, buffer_pct))
}

/// The error for a 403/429 quota response.
pub(crate) fn rate_limited_error(headers: &HeaderMap) -> IntakeError {
    let reset_at = header_u64(headers, "x-ratelimit-reset")
        .and_then(|epoch| chrono::DateTime::from_timestamp(epoch as i64, 0))
        .or_else(|| {
            header_u64(headers, "retry-after").map(|secs| Utc::now() + ChronoDuration::seconds(secs as i64))
        })
        .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(60));
    IntakeError::RateLimited { reset_at }
}
