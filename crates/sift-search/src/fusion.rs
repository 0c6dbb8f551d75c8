//! Weighted Reciprocal Rank Fusion over any number of ranked lists.
//!
//! Each source contributes `weight / (k + rank)` for every result it
//! returned. Results a source did not return get nothing from it. Raw
//! scores are kept for diagnostics only; they are never compared across
//! sources.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sift_store::ScoredChunk;

pub const DEFAULT_RRF_K: u32 = 60;

/// Source index of the sparse list in a two-source fusion.
pub const SPARSE: usize = 0;
/// Source index of the dense list in a two-source fusion.
pub const DENSE: usize = 1;

const BALANCE_EPSILON: f64 = 0.05;

/// One fused result with per-source diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub chunk_id: String,
    /// 1-based rank in each source list, 0 when absent.
    pub ranks: Vec<usize>,
    /// Source-native raw score per source, 0.0 when absent.
    pub scores: Vec<f32>,
    pub fused_score: f64,
}

impl ScoredResult {
    #[must_use]
    pub fn rank(&self, source: usize) -> usize {
        self.ranks.get(source).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn raw_score(&self, source: usize) -> f32 {
        self.scores.get(source).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn sparse_rank(&self) -> usize {
        self.rank(SPARSE)
    }

    #[must_use]
    pub fn dense_rank(&self) -> usize {
        self.rank(DENSE)
    }

    #[must_use]
    pub fn sparse_score(&self) -> f32 {
        self.raw_score(SPARSE)
    }

    #[must_use]
    pub fn dense_score(&self) -> f32 {
        self.raw_score(DENSE)
    }

    /// Number of sources that returned this result.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.ranks.iter().filter(|&&r| r > 0).count()
    }
}

/// Resolve the weight of each of `sources` lists.
///
/// Missing entries default to `1 / sources`. Negative and non-finite
/// weights are clamped to 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn effective_weights(weights: &[f64], sources: usize) -> Vec<f64> {
    if sources == 0 {
        return Vec::new();
    }
    let equal = 1.0 / sources as f64;
    (0..sources)
        .map(|source| match weights.get(source).copied() {
            None => equal,
            Some(w) if w.is_finite() && w >= 0.0 => w,
            Some(w) => {
                tracing::warn!(source, weight = w, "invalid fusion weight clamped to 0");
                0.0
            }
        })
        .collect()
}

/// Fuse ranked lists into one list ordered by fused score descending,
/// ties broken by ascending chunk ID.
///
/// Ranks are list positions. If an ID repeats within one list only its
/// first occurrence counts. `k == 0` is replaced by [`DEFAULT_RRF_K`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fuse<L: AsRef<[ScoredChunk]>>(lists: &[L], weights: &[f64], k: u32) -> Vec<ScoredResult> {
    if lists.is_empty() {
        return Vec::new();
    }
    let k = if k == 0 {
        tracing::warn!("rrf k of 0 replaced by default");
        DEFAULT_RRF_K
    } else {
        k
    };
    let sources = lists.len();
    let weights = effective_weights(weights, sources);

    let mut acc: HashMap<&str, ScoredResult> = HashMap::new();
    for (source, list) in lists.iter().enumerate() {
        for (pos, hit) in list.as_ref().iter().enumerate() {
            let entry = acc
                .entry(hit.chunk_id.as_str())
                .or_insert_with(|| ScoredResult {
                    chunk_id: hit.chunk_id.clone(),
                    ranks: vec![0; sources],
                    scores: vec![0.0; sources],
                    fused_score: 0.0,
                });
            if entry.ranks[source] != 0 {
                continue;
            }
            let rank = pos + 1;
            entry.ranks[source] = rank;
            entry.scores[source] = hit.score;
            entry.fused_score += weights[source] / (f64::from(k) + rank as f64);
        }
    }

    let mut fused: Vec<ScoredResult> = acc.into_values().collect();
    fused.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    fused
}

/// Two-source fusion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrfConfig {
    pub k: u32,
    pub sparse_weight: f64,
    pub dense_weight: f64,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_RRF_K,
            sparse_weight: 0.5,
            dense_weight: 0.5,
        }
    }
}

impl RrfConfig {
    /// Both weights within 0.05 of 0.5.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        (self.sparse_weight - 0.5).abs() <= BALANCE_EPSILON
            && (self.dense_weight - 0.5).abs() <= BALANCE_EPSILON
    }
}

/// Fuse one sparse and one dense list.
#[must_use]
pub fn fuse_hybrid(sparse: &[ScoredChunk], dense: &[ScoredChunk], config: &RrfConfig) -> Vec<ScoredResult> {
    fuse(
        &[sparse, dense],
        &[config.sparse_weight, config.dense_weight],
        config.k,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[&str]) -> Vec<ScoredChunk> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| ScoredChunk {
                chunk_id: (*id).to_string(),
                score: 10.0 - i as f32,
            })
            .collect()
    }

    fn ids(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk_id.as_str()).collect()
    }

    #[test]
    fn two_source_example() {
        let out = fuse_hybrid(&list(&["A", "B", "C"]), &list(&["B", "A"]), &RrfConfig::default());
        assert_eq!(ids(&out), vec!["A", "B", "C"]);
        assert_eq!(out[0].fused_score, 0.5 / 61.0 + 0.5 / 62.0);
        assert_eq!(out[0].fused_score, out[1].fused_score);
        assert_eq!(out[2].fused_score, 0.5 / 63.0);
        assert_eq!((out[0].sparse_rank(), out[0].dense_rank()), (1, 2));
        assert_eq!((out[2].sparse_rank(), out[2].dense_rank()), (3, 0));
        assert_eq!(out[2].dense_score(), 0.0);
        assert_eq!(out[1].sparse_score(), 9.0);
    }

    #[test]
    fn absence_is_not_penalized() {
        let out = fuse(&[list(&["X"]), list(&["Y"])], &[], DEFAULT_RRF_K);
        assert_eq!(out[0].fused_score, out[1].fused_score);
        assert_eq!(ids(&out), vec!["X", "Y"]);
    }

    #[test]
    fn missing_weights_default_to_equal() {
        assert_eq!(effective_weights(&[], 4), vec![0.25; 4]);
        assert_eq!(effective_weights(&[0.7], 2), vec![0.7, 0.5]);
        assert!(effective_weights(&[], 0).is_empty());
    }

    #[test]
    fn invalid_weights_clamped_to_zero() {
        assert_eq!(
            effective_weights(&[-1.0, f64::NAN, f64::INFINITY, 0.3], 4),
            vec![0.0, 0.0, 0.0, 0.3]
        );
        let out = fuse(&[list(&["neg"]), list(&["pos"])], &[-2.0, 1.0], 60);
        assert_eq!(ids(&out), vec!["pos", "neg"]);
        assert_eq!(out[1].fused_score, 0.0);
    }

    #[test]
    fn zero_k_uses_default() {
        let a = fuse(&[list(&["a", "b"])], &[1.0], 0);
        let b = fuse(&[list(&["a", "b"])], &[1.0], DEFAULT_RRF_K);
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_in_one_list_counts_once() {
        let out = fuse(&[list(&["a", "b", "a"])], &[1.0], 60);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].rank(0), 1);
        assert_eq!(out[0].fused_score, 1.0 / 61.0);
        assert_eq!(out[1].rank(0), 2);
    }

    #[test]
    fn three_sources_merge_by_identity() {
        let out = fuse(&[list(&["a", "b"]), list(&["b"]), list(&["c", "b"])], &[], 60);
        assert_eq!(out[0].chunk_id, "b");
        assert_eq!(out[0].ranks, vec![2, 1, 2]);
        assert_eq!(out[0].source_count(), 3);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn empty_inputs() {
        let none: [Vec<ScoredChunk>; 0] = [];
        assert!(fuse(&none, &[], 60).is_empty());
        assert!(fuse(&[Vec::<ScoredChunk>::new(), Vec::new()], &[], 60).is_empty());
    }

    #[test]
    fn heavier_weight_wins_disagreement() {
        let config = RrfConfig {
            sparse_weight: 0.8,
            dense_weight: 0.2,
            ..RrfConfig::default()
        };
        let out = fuse_hybrid(&list(&["s", "d"]), &list(&["d", "s"]), &config);
        assert_eq!(out[0].chunk_id, "s");
        assert!(!config.is_balanced());
    }

    #[test]
    fn balance_tolerance() {
        assert!(RrfConfig::default().is_balanced());
        let near = RrfConfig {
            sparse_weight: 0.54,
            dense_weight: 0.46,
            ..RrfConfig::default()
        };
        assert!(near.is_balanced());
    }

    #[test]
    fn scored_result_serializes() {
        let out = fuse_hybrid(&list(&["a"]), &list(&["a"]), &RrfConfig::default());
        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(json["ranks"], serde_json::json!([1, 1]));
    }

    mod proptest_fusion {
        use super::*;
        use proptest::prelude::*;

        fn arb_list() -> impl Strategy<Value = Vec<ScoredChunk>> {
            proptest::collection::vec("[a-h]", 0..12).prop_map(|ids| {
                ids.into_iter()
                    .map(|chunk_id| ScoredChunk { chunk_id, score: 1.0 })
                    .collect()
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(300))]

            #[test]
            fn output_sorted_and_unique(
                lists in proptest::collection::vec(arb_list(), 1..4),
                k in 0u32..100,
            ) {
                let out = fuse(&lists, &[], k);
                for pair in out.windows(2) {
                    prop_assert!(
                        pair[0].fused_score > pair[1].fused_score
                            || (pair[0].fused_score == pair[1].fused_score
                                && pair[0].chunk_id < pair[1].chunk_id)
                    );
                }
                let mut seen: Vec<&str> = ids(&out);
                seen.sort_unstable();
                seen.dedup();
                prop_assert_eq!(seen.len(), out.len());
            }

            #[test]
            fn covers_union_of_inputs(lists in proptest::collection::vec(arb_list(), 1..4)) {
                let out = fuse(&lists, &[], 60);
                let mut expected: Vec<&str> = lists
                    .iter()
                    .flatten()
                    .map(|h| h.chunk_id.as_str())
                    .collect();
                expected.sort_unstable();
                expected.dedup();
                let mut got = ids(&out);
                got.sort_unstable();
                prop_assert_eq!(got, expected);
            }

            #[test]
            fn deterministic(lists in proptest::collection::vec(arb_list(), 1..4)) {
                prop_assert_eq!(fuse(&lists, &[], 60), fuse(&lists, &[], 60));
            }

            #[test]
            fn scores_non_negative(
                lists in proptest::collection::vec(arb_list(), 1..4),
                weights in proptest::collection::vec(-1.0f64..1.0, 0..4),
            ) {
                for r in fuse(&lists, &weights, 60) {
                    prop_assert!(r.fused_score >= 0.0);
                }
            }
        }
    }
}
