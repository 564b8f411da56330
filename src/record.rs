// src/record.rs
//! Record types flowing through the pipeline: raw per-source listings,
//! normalized canonical records, and scored records.
//!
//! Absent data is always an explicit sentinel ([`Deadline::OpenEnded`],
//! [`Amount::Unspecified`]), never an empty-string-as-unknown.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// An unvalidated listing as extracted from one source's native format.
/// Fields may be empty or malformed; the normalizer sorts that out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    pub source: String,
    /// Human-readable organization name; stamped by the fetch coordinator
    /// when the adapter leaves it empty.
    pub source_name: String,
    pub title: String,
    pub description: String,
    pub eligibility: String,
    pub research_areas: String,
    pub deadline: String,
    pub amount: String,
    pub url: String,
    pub contact: String,
}

/// Parsed application deadline. `OpenEnded` means "no parseable deadline",
/// which is distinct from a record missing the field entirely upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deadline {
    Date(NaiveDate),
    OpenEnded,
}

impl Deadline {
    pub fn is_open_ended(&self) -> bool {
        matches!(self, Deadline::OpenEnded)
    }
}

// Ranking order: dated deadlines ascending, open-ended after all dates.
impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Deadline::Date(a), Deadline::Date(b)) => a.cmp(b),
            (Deadline::Date(_), Deadline::OpenEnded) => Ordering::Less,
            (Deadline::OpenEnded, Deadline::Date(_)) => Ordering::Greater,
            (Deadline::OpenEnded, Deadline::OpenEnded) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parsed funding amount in euros.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Amount {
    Exact(f64),
    Range { min: f64, max: f64 },
    Unspecified,
}

impl Amount {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Amount::Unspecified)
    }
}

/// A raw record normalized into the pipeline's common schema.
/// Every canonical record traces to exactly one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub source: String,
    /// Organization name as shown in reports; falls back to the source id.
    pub source_name: String,
    pub title: String,
    pub description: String,
    pub deadline: Deadline,
    pub amount: Amount,
    pub eligibility: String,
    pub research_areas: BTreeSet<String>,
    pub url: String,
    pub contact: String,
    pub scraped_at: DateTime<Utc>,
}

impl CanonicalRecord {
    /// Number of sentinel-valued fields. Used by the deduplicator to prefer
    /// the most complete record among duplicates.
    pub fn sentinel_count(&self) -> usize {
        let mut n = 0;
        if self.deadline.is_open_ended() {
            n += 1;
        }
        if self.amount.is_unspecified() {
            n += 1;
        }
        if self.description.is_empty() {
            n += 1;
        }
        if self.eligibility.is_empty() {
            n += 1;
        }
        if self.research_areas.is_empty() {
            n += 1;
        }
        n
    }

    /// Natural key for deduplication: lowercased whitespace-collapsed title
    /// plus the listing URL.
    pub fn dedup_key(&self) -> (String, String) {
        let title = self
            .title
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        (title, self.url.clone())
    }
}

/// A canonical record that passed the relevance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: CanonicalRecord,
    /// Non-negative weighted keyword score; deterministic for a given record
    /// and configuration.
    pub score: f64,
    /// Every keyword that contributed to the score, in
    /// first-field-then-first-occurrence order.
    pub matched_keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Deadline {
        Deadline::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn open_ended_sorts_after_all_dates() {
        let mut v = vec![Deadline::OpenEnded, date(2026, 1, 1), date(2025, 12, 1)];
        v.sort();
        assert_eq!(v, vec![date(2025, 12, 1), date(2026, 1, 1), Deadline::OpenEnded]);
    }

    #[test]
    fn dedup_key_normalizes_title_case_and_whitespace() {
        let mut rec = CanonicalRecord {
            source: "nwo".into(),
            source_name: "NWO".into(),
            title: "  AI  Health   Grant 2025 ".into(),
            description: String::new(),
            deadline: Deadline::OpenEnded,
            amount: Amount::Unspecified,
            eligibility: String::new(),
            research_areas: BTreeSet::new(),
            url: "https://example.test/a".into(),
            contact: String::new(),
            scraped_at: Utc::now(),
        };
        let a = rec.dedup_key();
        rec.title = "ai health grant 2025".into();
        let b = rec.dedup_key();
        assert_eq!(a, b);
    }

    #[test]
    fn sentinel_count_tracks_missing_fields() {
        let rec = CanonicalRecord {
            source: "nwo".into(),
            source_name: "NWO".into(),
            title: "t".into(),
            description: String::new(),
            deadline: Deadline::OpenEnded,
            amount: Amount::Unspecified,
            eligibility: String::new(),
            research_areas: BTreeSet::new(),
            url: "u".into(),
            contact: String::new(),
            scraped_at: Utc::now(),
        };
        assert_eq!(rec.sentinel_count(), 5);
    }
}
