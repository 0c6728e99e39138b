//! Ranking and merge engine for search candidates.
//!
//! Ordering invariant: similarity score non-increasing, ties broken by
//! importance descending, then creation timestamp descending. Unscored
//! results rank below any scored result. Truncation to `top_k` happens only
//! after the full candidate set is sorted.

use mnemo_rs_memory::{ScoredCandidate, SearchResult};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

/// Merge candidate batches from multiple vector backends, deduplicating by
/// record id and keeping the highest similarity score seen.
pub fn merge_candidates(batches: Vec<Vec<ScoredCandidate>>) -> Vec<ScoredCandidate> {
    let mut best: HashMap<Uuid, ScoredCandidate> = HashMap::new();
    for candidate in batches.into_iter().flatten() {
        match best.entry(candidate.record_id) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if candidate.similarity_score > entry.get().similarity_score {
                    entry.insert(candidate);
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(candidate);
            }
        }
    }
    best.into_values().collect()
}

/// Sort results per the ordering invariant, then truncate to `top_k`.
pub fn rank_and_truncate(results: &mut Vec<SearchResult>, top_k: usize) {
    results.sort_by(compare_results);
    results.truncate(top_k);
}

/// Comparator implementing the ordering invariant.
fn compare_results(a: &SearchResult, b: &SearchResult) -> Ordering {
    let by_score = match (a.similarity_score, b.similarity_score) {
        (Some(left), Some(right)) => right.total_cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score
        .then_with(|| b.metadata.importance.cmp(&a.metadata.importance))
        .then_with(|| b.created_at.cmp(&a.created_at))
}
