// src/normalize.rs
//! Normalization of raw listings into canonical records.
//!
//! Pure and deterministic: the same [`RawRecord`] always yields the same
//! [`CanonicalRecord`]. Records missing both title and URL are unusable and
//! yield `None`; every other parsing problem degrades to a sentinel value
//! instead of failing the record.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::BTreeSet;

use crate::record::{Amount, CanonicalRecord, Deadline, RawRecord};

/// Delimiters used to split free-text research-area tags into a set.
const TAG_DELIMITERS: [char; 4] = [',', ';', '/', '|'];

/// Descriptions and eligibility blurbs are capped to keep reports readable.
const MAX_TEXT_LEN: usize = 1000;

/// Normalize one raw record, or discard it when neither a title nor a URL
/// survived extraction.
pub fn normalize_record(raw: &RawRecord, scraped_at: DateTime<Utc>) -> Option<CanonicalRecord> {
    let title = clean_text(&raw.title);
    let url = raw.url.trim().to_string();
    if title.is_empty() && url.is_empty() {
        return None;
    }

    let source_name = clean_text(&raw.source_name);
    Some(CanonicalRecord {
        source: raw.source.clone(),
        source_name: if source_name.is_empty() {
            raw.source.clone()
        } else {
            source_name
        },
        title,
        description: clean_text(&raw.description),
        deadline: parse_deadline(&raw.deadline),
        amount: parse_amount(&raw.amount),
        eligibility: clean_text(&raw.eligibility),
        research_areas: split_research_areas(&raw.research_areas),
        url,
        contact: clean_text(&raw.contact),
        scraped_at,
    })
}

/// Strip markup remnants, decode HTML entities, normalize typographic quotes,
/// and collapse whitespace. Long texts are truncated.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_LEN {
        out = out.chars().take(MAX_TEXT_LEN).collect();
    }
    out
}

/// Split research-area tags on the configured delimiters, trim, lowercase,
/// and collect into a set.
pub fn split_research_areas(s: &str) -> BTreeSet<String> {
    clean_text(s)
        .split(TAG_DELIMITERS)
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Dutch month names, translated before date parsing (sources publish in
/// both languages).
const DUTCH_MONTHS: [(&str, &str); 9] = [
    ("januari", "january"),
    ("februari", "february"),
    ("maart", "march"),
    ("mei", "may"),
    ("juni", "june"),
    ("juli", "july"),
    ("augustus", "august"),
    ("oktober", "october"),
    ("december", "december"),
];

/// Parse a deadline out of free text. Accepted shapes: `YYYY-MM-DD`,
/// `DD-MM-YYYY`, `DD/MM/YYYY`, `15 March 2026` (English or Dutch month
/// names), and `March 15, 2026`. Anything else is open-ended.
pub fn parse_deadline(text: &str) -> Deadline {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return Deadline::OpenEnded;
    }

    let mut lowered = cleaned.to_lowercase();
    for (nl, en) in DUTCH_MONTHS {
        lowered = lowered.replace(nl, en);
    }

    static RE_ISO: OnceCell<Regex> = OnceCell::new();
    let re_iso = RE_ISO.get_or_init(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());
    if let Some(c) = re_iso.captures(&lowered) {
        if let Some(d) = ymd(&c[1], &c[2], &c[3]) {
            return Deadline::Date(d);
        }
    }

    static RE_DMY: OnceCell<Regex> = OnceCell::new();
    let re_dmy = RE_DMY.get_or_init(|| Regex::new(r"(\d{1,2})[-/](\d{1,2})[-/](\d{4})").unwrap());
    if let Some(c) = re_dmy.captures(&lowered) {
        if let Some(d) = ymd(&c[3], &c[2], &c[1]) {
            return Deadline::Date(d);
        }
    }

    static RE_DAY_MONTH: OnceCell<Regex> = OnceCell::new();
    let re_day_month = RE_DAY_MONTH.get_or_init(|| {
        Regex::new(r"(\d{1,2})\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})").unwrap()
    });
    if let Some(c) = re_day_month.captures(&lowered) {
        if let Some(d) = dmy_by_name(&c[1], &c[2], &c[3]) {
            return Deadline::Date(d);
        }
    }

    static RE_MONTH_DAY: OnceCell<Regex> = OnceCell::new();
    let re_month_day = RE_MONTH_DAY.get_or_init(|| {
        Regex::new(r"(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),?\s+(\d{4})").unwrap()
    });
    if let Some(c) = re_month_day.captures(&lowered) {
        if let Some(d) = dmy_by_name(&c[2], &c[1], &c[3]) {
            return Deadline::Date(d);
        }
    }

    Deadline::OpenEnded
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn dmy_by_name(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let month_no = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ]
    .iter()
    .position(|m| *m == month)? as u32
        + 1;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month_no, day.parse().ok()?)
}

/// Parse a funding amount or range out of free text. Understands `€`,
/// Dutch and English separator conventions, `miljoen`/`million` multipliers,
/// `X tot Y` / `X - Y` ranges, and `tot`/`maximaal`/`up to` caps (range from
/// zero). Anything else is unspecified.
pub fn parse_amount(text: &str) -> Amount {
    let cleaned = clean_text(text).to_lowercase();
    if cleaned.is_empty() {
        return Amount::Unspecified;
    }

    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    let re_num = RE_NUM.get_or_init(|| {
        Regex::new(r"€?\s*(\d[\d.,]*)\s*(miljoen|million|mln)?").unwrap()
    });

    let mut values = Vec::new();
    for c in re_num.captures_iter(&cleaned) {
        if let Some(mut v) = parse_number(&c[1]) {
            if c.get(2).is_some() {
                v *= 1_000_000.0;
            }
            values.push(v);
        }
    }

    let capped = cleaned.contains("tot ")
        || cleaned.contains("maximaal")
        || cleaned.contains("up to")
        || cleaned.contains("max.");

    match values.as_slice() {
        [] => Amount::Unspecified,
        [v] if capped => Amount::Range { min: 0.0, max: *v },
        [v] => Amount::Exact(*v),
        [a, b, ..] => Amount::Range {
            min: a.min(*b),
            max: a.max(*b),
        },
    }
}

/// Parse a number that may use either `1.234.567,89` (Dutch) or
/// `1,234,567.89` (English) conventions. With a single separator followed by
/// exactly three digits, treat it as a thousands separator.
fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim_matches(|c: char| c == '.' || c == ',');
    let dots = s.matches('.').count();
    let commas = s.matches(',').count();

    let normalized = if dots > 0 && commas > 0 {
        // The later separator kind is the decimal one.
        if s.rfind('.') > s.rfind(',') {
            s.replace(',', "")
        } else {
            s.replace('.', "").replace(',', ".")
        }
    } else if commas == 1 {
        let frac = &s[s.rfind(',')? + 1..];
        if frac.len() == 3 {
            s.replace(',', "")
        } else {
            s.replace(',', ".")
        }
    } else if dots == 1 {
        let frac = &s[s.rfind('.')? + 1..];
        if frac.len() == 3 {
            s.replace('.', "")
        } else {
            s.to_string()
        }
    } else if dots > 1 {
        s.replace('.', "")
    } else if commas > 1 {
        s.replace(',', "")
    } else {
        s.to_string()
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
