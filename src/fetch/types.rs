// src/fetch/types.rs
use async_trait::async_trait;
use thiserror::Error;

use crate::record::RawRecord;

/// One external funding source. The coordinator is polymorphic only over
/// this capability, never over adapter internals; adapters own their own
/// parsing and must skip (not raise on) malformed individual listings.
#[async_trait]
pub trait FundingSource: Send + Sync {
    /// Stable source identifier, e.g. "nwo".
    fn id(&self) -> &str;
    /// Human-readable organization name for reports.
    fn name(&self) -> &str;
    /// Fetch the currently listed opportunities.
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError>;
}

/// Source-level fetch failures, split by whether a retry can help.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("server error: http {0}")]
    Server(u16),
    #[error("rate limited: http 429")]
    RateLimited,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("access blocked: http {0}")]
    Blocked(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("run timeout expired before source completed")]
    RunExpired,
}

impl FetchError {
    /// Transient failures are retried with backoff; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout
                | FetchError::Server(_)
                | FetchError::RateLimited
                | FetchError::Transport(_)
        )
    }

    /// Classify an HTTP status that was not a success.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FetchError::RateLimited,
            401 | 403 => FetchError::Blocked(status),
            s if s >= 500 => FetchError::Server(s),
            s => FetchError::Blocked(s),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::from_status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Per-source outcome of one run. Exactly one report is produced per
/// configured source, failures included.
#[derive(Debug)]
pub struct SourceReport {
    pub source: String,
    pub attempts: u32,
    pub result: Result<Vec<RawRecord>, FetchError>,
}

impl SourceReport {
    pub fn record_count(&self) -> usize {
        self.result.as_ref().map(Vec::len).unwrap_or(0)
    }
}
