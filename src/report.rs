// src/report.rs
//! Report export. The pipeline core only depends on the [`ReportSink`]
//! trait; the bundled implementation writes a timestamped CSV spreadsheet
//! with the same columns the research team used before, plus a console
//! summary of per-source outcomes.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::RunReport;
use crate::record::{Amount, Deadline};

/// Consumer of a finished run. The core has no dependency on the output
/// format behind this seam.
pub trait ReportSink {
    /// Persist the report; returns the path it was written to.
    fn export(&self, report: &RunReport) -> Result<PathBuf>;
}

/// CSV spreadsheet exporter.
pub struct CsvExporter {
    out_dir: PathBuf,
}

const COLUMNS: [&str; 12] = [
    "Subsidy Name",
    "Funding Source",
    "Amount/Budget",
    "Application Deadline",
    "Eligibility Criteria",
    "Research Areas",
    "Description",
    "Contact Information",
    "Website URL",
    "Relevance Score",
    "Keywords Matched",
    "Date Scraped",
];

impl CsvExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    fn format_deadline(d: &Deadline) -> String {
        match d {
            Deadline::Date(date) => date.format("%Y-%m-%d").to_string(),
            Deadline::OpenEnded => "open-ended".to_string(),
        }
    }

    fn format_amount(a: &Amount) -> String {
        match a {
            Amount::Exact(v) => format!("€ {v:.0}"),
            Amount::Range { min, max } => format!("€ {min:.0} – € {max:.0}"),
            Amount::Unspecified => "unspecified".to_string(),
        }
    }
}

impl ReportSink for CsvExporter {
    fn export(&self, report: &RunReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating output dir {}", self.out_dir.display()))?;

        let filename = format!(
            "dutch_subsidies_{}.csv",
            report.summary.started_at.format("%Y%m%d_%H%M%S")
        );
        let path = self.out_dir.join(filename);

        let mut w = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        w.write_record(COLUMNS)?;

        for scored in &report.ranked {
            let rec = &scored.record;
            let areas = rec
                .research_areas
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            let amount = Self::format_amount(&rec.amount);
            let deadline = Self::format_deadline(&rec.deadline);
            let score = format!("{:.2}", scored.score);
            let keywords = scored.matched_keywords.join(", ");
            let scraped = rec.scraped_at.format("%Y-%m-%d %H:%M:%S").to_string();
            w.write_record([
                rec.title.as_str(),
                rec.source_name.as_str(),
                amount.as_str(),
                deadline.as_str(),
                rec.eligibility.as_str(),
                areas.as_str(),
                rec.description.as_str(),
                rec.contact.as_str(),
                rec.url.as_str(),
                score.as_str(),
                keywords.as_str(),
                scraped.as_str(),
            ])?;
        }

        w.flush().context("flushing csv")?;
        Ok(path)
    }
}

/// Render the run summary for the console, mirroring what the exporter sees:
/// per-source outcomes and the discard counts at each stage, so partial
/// failure is observable rather than silent.
pub fn render_summary(report: &RunReport) -> String {
    let s = &report.summary;
    let mut out = String::new();
    let _ = writeln!(out, "==== subsidy-finder run summary ====");
    let _ = writeln!(out, "started:            {}", s.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "relevant subsidies: {}", report.ranked.len());
    let _ = writeln!(
        out,
        "raw records: {} | unusable: {} | below threshold: {} | duplicates merged: {}",
        s.raw_records, s.discarded_unusable, s.below_threshold, s.duplicates_merged
    );

    let _ = writeln!(out, "sources:");
    for src in &s.sources {
        match &src.failure {
            None => {
                let _ = writeln!(
                    out,
                    "  ok   {:<16} {} records ({} attempt(s))",
                    src.source, src.records, src.attempts
                );
            }
            Some(reason) => {
                let _ = writeln!(
                    out,
                    "  FAIL {:<16} {} ({} attempt(s))",
                    src.source, reason, src.attempts
                );
            }
        }
    }

    if !s.keyword_hits.is_empty() {
        let mut hits: Vec<(&String, &usize)> = s.keyword_hits.iter().collect();
        hits.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let _ = writeln!(out, "top keywords:");
        for (kw, n) in hits.into_iter().take(10) {
            let _ = writeln!(out, "  {n:>4}  {kw}");
        }
    }
    out
}

/// Helper for callers that only have an output directory.
pub fn export_csv(report: &RunReport, out_dir: &Path) -> Result<PathBuf> {
    CsvExporter::new(out_dir).export(report)
}

/// Machine-readable sidecar with the run metadata (per-source outcomes,
/// discard counts, keyword histogram), written next to the spreadsheet.
pub fn export_summary_json(report: &RunReport, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output dir {}", out_dir.display()))?;
    let path = out_dir.join(format!(
        "dutch_subsidies_{}_summary.json",
        report.summary.started_at.format("%Y%m%d_%H%M%S")
    ));
    let json = serde_json::to_string_pretty(&report.summary).context("serializing summary")?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
