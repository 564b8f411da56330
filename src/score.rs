// src/score.rs
//! Keyword-weighted relevance scoring.
//!
//! score = Σ over fields of weight[field] × (distinct configured keywords
//! found in that field), plus a flat bonus when a dated deadline falls inside
//! the configured future window. A keyword matching in several fields counts
//! once per field; the multi-field weighting is intentional. Records below
//! the minimum score are excluded entirely.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;

use crate::config::{Config, FieldWeights, MatchMode};
use crate::record::{CanonicalRecord, Deadline, ScoredRecord};

/// Keyword list compiled once per run. Whole-word mode compiles one
/// case-insensitive word-boundary regex per keyword; substring mode matches
/// on lowercased text directly.
pub struct Scorer {
    keywords: Vec<CompiledKeyword>,
    weights: FieldWeights,
    min_score: f64,
    deadline_bonus: f64,
    deadline_window_days: i64,
}

struct CompiledKeyword {
    text: String,
    lowered: String,
    word_re: Option<Regex>,
}

impl Scorer {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut keywords = Vec::with_capacity(cfg.keywords.terms.len());
        for term in &cfg.keywords.terms {
            let word_re = match cfg.scoring.match_mode {
                MatchMode::Substring => None,
                MatchMode::WholeWord => {
                    let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
                    Some(
                        Regex::new(&pattern)
                            .with_context(|| format!("compiling keyword `{term}`"))?,
                    )
                }
            };
            keywords.push(CompiledKeyword {
                text: term.clone(),
                lowered: term.to_lowercase(),
                word_re,
            });
        }
        Ok(Self {
            keywords,
            weights: cfg.scoring.weights,
            min_score: cfg.scoring.min_score,
            deadline_bonus: cfg.scoring.deadline_bonus,
            deadline_window_days: cfg.scoring.deadline_window_days,
        })
    }

    /// Score one record against the configured keywords. `today` is the run's
    /// reference date for the deadline bonus; passing it in keeps scoring
    /// deterministic. Returns `None` when the record falls below the
    /// threshold.
    pub fn score(&self, record: &CanonicalRecord, today: NaiveDate) -> Option<ScoredRecord> {
        let research_areas = record
            .research_areas
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        // Field order fixes the matched-keyword reporting order.
        let fields: [(&str, f64); 4] = [
            (record.title.as_str(), self.weights.title),
            (record.description.as_str(), self.weights.description),
            (research_areas.as_str(), self.weights.research_areas),
            (record.eligibility.as_str(), self.weights.eligibility),
        ];

        let mut score = 0.0;
        let mut matched: Vec<String> = Vec::new();

        for (text, weight) in fields {
            let hits = self.find_keywords(text);
            score += weight * hits.len() as f64;
            for (idx, _) in hits {
                let kw = &self.keywords[idx].text;
                if !matched.contains(kw) {
                    matched.push(kw.clone());
                }
            }
        }

        if let Deadline::Date(d) = record.deadline {
            let days_until = (d - today).num_days();
            if (0..=self.deadline_window_days).contains(&days_until) {
                score += self.deadline_bonus;
            }
        }

        if score < self.min_score {
            return None;
        }

        Some(ScoredRecord {
            record: record.clone(),
            score,
            matched_keywords: matched,
        })
    }

    /// Distinct keyword hits in one field, ordered by first occurrence.
    /// Returns (keyword index, byte position of first match).
    fn find_keywords(&self, text: &str) -> Vec<(usize, usize)> {
        if text.is_empty() {
            return Vec::new();
        }
        let lowered = text.to_lowercase();
        let mut hits: Vec<(usize, usize)> = Vec::new();
        for (idx, kw) in self.keywords.iter().enumerate() {
            let pos = match &kw.word_re {
                Some(re) => re.find(text).map(|m| m.start()),
                None => lowered.find(&kw.lowered),
            };
            if let Some(p) = pos {
                hits.push((idx, p));
            }
        }
        hits.sort_by_key(|&(idx, pos)| (pos, idx));
        hits
    }
}
