// src/rank.rs
//! Deduplication and ranking of scored records.
//!
//! Records sharing a (normalized title, URL) key are merged down to the
//! single best representative; the survivors are ordered by score (desc),
//! then deadline (asc, open-ended last), then source id, so exact ties never
//! leave the output order unresolved.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::record::ScoredRecord;

/// Merge near-duplicates and order the final result set.
/// Returns the ranked records plus the number of duplicates merged away.
pub fn dedup_and_rank(scored: Vec<ScoredRecord>) -> (Vec<ScoredRecord>, usize) {
    let total = scored.len();
    let mut by_key: HashMap<(String, String), ScoredRecord> = HashMap::new();

    for candidate in scored {
        let key = candidate.record.dedup_key();
        match by_key.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                if prefer(&candidate, slot.get()) {
                    slot.insert(candidate);
                }
            }
        }
    }

    let merged = total - by_key.len();
    let mut ranked: Vec<ScoredRecord> = by_key.into_values().collect();
    ranked.sort_by(rank_order);
    (ranked, merged)
}

/// Within a duplicate group: highest score wins, then the most complete
/// record (fewest sentinel values), then the earliest scrape timestamp.
fn prefer(candidate: &ScoredRecord, current: &ScoredRecord) -> bool {
    match candidate.score.total_cmp(&current.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            let (cs, os) = (
                candidate.record.sentinel_count(),
                current.record.sentinel_count(),
            );
            match cs.cmp(&os) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => candidate.record.scraped_at < current.record.scraped_at,
            }
        }
    }
}

fn rank_order(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    // The dedup key is unique after merging, so this order is total and the
    // output never depends on hash-map iteration order.
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.record.deadline.cmp(&b.record.deadline))
        .then_with(|| a.record.source.cmp(&b.record.source))
        .then_with(|| a.record.dedup_key().cmp(&b.record.dedup_key()))
}
