// src/config.rs
//! Run configuration: keyword list, scoring weights, fetch policy, output.
//!
//! Loaded from TOML (default `config/subsidy_finder.toml`, overridable via
//! `SUBSIDY_CONFIG_PATH`); the minimum-score threshold can additionally be
//! overridden with `SUBSIDY_MIN_SCORE`. Configuration is validated before any
//! fetching begins — an invalid config is the only error that aborts a run.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/subsidy_finder.toml";
pub const ENV_CONFIG_PATH: &str = "SUBSIDY_CONFIG_PATH";
pub const ENV_MIN_SCORE: &str = "SUBSIDY_MIN_SCORE";

/// Whole-word vs substring keyword matching. Either policy is defensible
/// ("AI" inside "container" is the classic false positive), so it is a
/// config choice instead of a hardcoded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Substring,
    WholeWord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub keywords: KeywordsSection,
    pub scoring: ScoringSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordsSection {
    /// Ordered list; order is reflected in matched-keyword reporting.
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSection {
    pub min_score: f64,
    #[serde(default = "default_match_mode")]
    pub match_mode: MatchMode,
    /// Flat bonus applied when a dated deadline falls within the window.
    #[serde(default = "default_deadline_bonus")]
    pub deadline_bonus: f64,
    #[serde(default = "default_deadline_window_days")]
    pub deadline_window_days: i64,
    pub weights: FieldWeights,
}

/// Per-field weights applied to distinct-keyword counts.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FieldWeights {
    pub title: f64,
    pub description: f64,
    #[serde(default)]
    pub research_areas: f64,
    #[serde(default)]
    pub eligibility: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub max_parallel: usize,
    /// Politeness delay between consecutive requests to the same source,
    /// enforced across retries.
    pub request_delay_ms: u64,
    /// Maximum attempts per source; only transient failures are retried.
    pub max_attempts: u32,
    /// Backoff between attempts grows linearly: base, 2*base, ...
    pub backoff_base_ms: u64,
    /// Hard deadline for the whole fetch phase; pending sources are cancelled.
    pub run_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            request_delay_ms: 2_000,
            max_attempts: 3,
            backoff_base_ms: 2_000,
            run_timeout_secs: 120,
            user_agent: concat!(
                "Mozilla/5.0 (compatible; subsidy-finder/",
                env!("CARGO_PKG_VERSION"),
                ")"
            )
            .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

fn default_match_mode() -> MatchMode {
    MatchMode::Substring
}
fn default_deadline_bonus() -> f64 {
    0.5
}
fn default_deadline_window_days() -> i64 {
    90
}

impl FetchSection {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(attempt as u64))
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl Config {
    /// Load from the default path (or `SUBSIDY_CONFIG_PATH`), apply env
    /// overrides, and validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;

        if let Some(t) = parse_min_score_env(std::env::var(ENV_MIN_SCORE).ok()) {
            cfg.scoring.min_score = t;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(toml_str).context("parsing subsidy-finder config")?;
        Ok(cfg)
    }

    /// Startup validation. Errors here are fatal; nothing has been fetched yet.
    pub fn validate(&self) -> Result<()> {
        if self.keywords.terms.is_empty() {
            return Err(anyhow!("keyword list must not be empty"));
        }
        if self.keywords.terms.iter().any(|k| k.trim().is_empty()) {
            return Err(anyhow!("keyword list contains a blank entry"));
        }
        if self.scoring.min_score < 0.0 || !self.scoring.min_score.is_finite() {
            return Err(anyhow!(
                "min_score must be a non-negative finite number, got {}",
                self.scoring.min_score
            ));
        }
        let w = self.scoring.weights;
        for (name, v) in [
            ("title", w.title),
            ("description", w.description),
            ("research_areas", w.research_areas),
            ("eligibility", w.eligibility),
        ] {
            if v < 0.0 || !v.is_finite() {
                return Err(anyhow!("weight `{}` must be non-negative, got {}", name, v));
            }
        }
        if self.scoring.deadline_bonus < 0.0 {
            return Err(anyhow!("deadline_bonus must be non-negative"));
        }
        if self.scoring.deadline_window_days < 0 {
            return Err(anyhow!("deadline_window_days must be non-negative"));
        }
        if self.fetch.max_parallel == 0 {
            return Err(anyhow!("fetch.max_parallel must be at least 1"));
        }
        if self.fetch.max_attempts == 0 {
            return Err(anyhow!("fetch.max_attempts must be at least 1"));
        }
        Ok(())
    }
}

// parse optional float env; negative values are ignored
fn parse_min_score_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}
