// src/pipeline.rs
//! End-to-end run orchestration: fetch → normalize → score → dedup/rank.
//!
//! Everything downstream of the fetch phase is synchronous and pure, so a
//! run is deterministic given identical raw inputs regardless of fetch
//! completion order. Failures below the run level are absorbed into the
//! summary; even all sources failing yields an empty result plus a complete
//! summary, never an error.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::fetch::types::{FundingSource, SourceReport};
use crate::normalize::normalize_record;
use crate::rank::dedup_and_rank;
use crate::record::ScoredRecord;
use crate::score::Scorer;

/// Per-source outcome in user-facing form.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub attempts: u32,
    pub records: usize,
    /// `None` on success, otherwise the failure reason.
    pub failure: Option<String>,
}

/// Run metadata handed to the report exporter alongside the ranked records.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceSummary>,
    pub raw_records: usize,
    pub discarded_unusable: usize,
    pub below_threshold: usize,
    pub duplicates_merged: usize,
    /// How often each configured keyword matched across the final result set.
    pub keyword_hits: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.failure.is_some()).count()
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub ranked: Vec<ScoredRecord>,
    pub summary: RunSummary,
}

/// Execute one full run against the given sources.
///
/// The scorer must have been built from the same `cfg`; it is passed in
/// separately so callers can fail fast on configuration errors before any
/// fetching starts.
pub async fn run(
    cfg: &Config,
    scorer: &Scorer,
    sources: Vec<Arc<dyn FundingSource>>,
) -> RunReport {
    let started_at = Utc::now();
    let today = started_at.date_naive();

    let reports = crate::fetch::fetch_all(sources, &cfg.fetch).await;
    let report = process_reports(reports, scorer, started_at, today);

    info!(
        ranked = report.ranked.len(),
        raw = report.summary.raw_records,
        failed_sources = report.summary.failed_sources(),
        "run complete"
    );
    report
}

/// Synchronous tail of the pipeline, split out for deterministic testing.
pub fn process_reports(
    reports: Vec<SourceReport>,
    scorer: &Scorer,
    started_at: DateTime<Utc>,
    today: chrono::NaiveDate,
) -> RunReport {
    let mut sources = Vec::with_capacity(reports.len());
    let mut raw_records = 0usize;
    let mut discarded_unusable = 0usize;
    let mut below_threshold = 0usize;
    let mut scored: Vec<ScoredRecord> = Vec::new();

    for report in &reports {
        sources.push(SourceSummary {
            source: report.source.clone(),
            attempts: report.attempts,
            records: report.record_count(),
            failure: report.result.as_ref().err().map(|e| e.to_string()),
        });

        let Ok(raws) = &report.result else { continue };
        raw_records += raws.len();

        for raw in raws {
            let Some(canonical) = normalize_record(raw, started_at) else {
                discarded_unusable += 1;
                continue;
            };
            match scorer.score(&canonical, today) {
                Some(s) => scored.push(s),
                None => below_threshold += 1,
            }
        }
    }

    let (ranked, duplicates_merged) = dedup_and_rank(scored);

    let mut keyword_hits: BTreeMap<String, usize> = BTreeMap::new();
    for rec in &ranked {
        for kw in &rec.matched_keywords {
            *keyword_hits.entry(kw.clone()).or_insert(0) += 1;
        }
    }

    RunReport {
        ranked,
        summary: RunSummary {
            started_at,
            sources,
            raw_records,
            discarded_unusable,
            below_threshold,
            duplicates_merged,
            keyword_hits,
        },
    }
}
