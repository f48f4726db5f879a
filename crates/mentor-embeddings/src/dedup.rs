//! Near-duplicate detection over lesson embeddings.
//!
//! Applied at three points in delivery: evaluating a cache hit, evaluating a
//! pending-queue lesson, and evaluating a freshly generated lesson. The
//! policy for each point lives with the caller — this module only answers
//! "how similar, and is that too similar?".
//!
//! A missing embedding (service down, older rows) always scores as
//! "similarity unknown — accept".

use crate::normalize::cosine_similarity;

/// Default cosine-similarity threshold above which a lesson is a repeat.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

/// Near-duplicate detector with a fixed threshold.
#[derive(Clone, Debug)]
pub struct Deduplicator {
    threshold: f32,
}

impl Deduplicator {
    /// Create a detector with the given threshold.
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// The configured threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Maximum cosine similarity between a candidate and recent embeddings.
    ///
    /// Returns 0.0 for an empty recent set. Dimension-mismatched entries
    /// (e.g. after an embedding model change) are skipped rather than
    /// panicking.
    #[must_use]
    pub fn max_similarity(&self, candidate: &[f32], recent: &[Vec<f32>]) -> f32 {
        recent
            .iter()
            .filter(|r| r.len() == candidate.len())
            .map(|r| cosine_similarity(candidate, r))
            .fold(0.0_f32, f32::max)
    }

    /// Whether a similarity score crosses the near-duplicate threshold.
    #[must_use]
    pub fn is_near_duplicate(&self, score: f32) -> bool {
        score > self.threshold
    }

    /// Evaluate a candidate embedding against recent embeddings.
    ///
    /// `None` candidate means the embedding service was unavailable:
    /// similarity unknown, accept.
    #[must_use]
    pub fn check(&self, candidate: Option<&[f32]>, recent: &[Vec<f32>]) -> DedupVerdict {
        match candidate {
            None => DedupVerdict::Unknown,
            Some(embedding) => {
                let score = self.max_similarity(embedding, recent);
                if self.is_near_duplicate(score) {
                    DedupVerdict::NearDuplicate { score }
                } else {
                    DedupVerdict::Distinct { score }
                }
            }
        }
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

/// Outcome of a near-duplicate check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DedupVerdict {
    /// Similar below threshold.
    Distinct {
        /// Max similarity observed.
        score: f32,
    },
    /// Above threshold — a repeat of recently delivered content.
    NearDuplicate {
        /// Max similarity observed.
        score: f32,
    },
    /// No embedding available — similarity unknown, accept.
    Unknown,
}

impl DedupVerdict {
    /// Whether the candidate is acceptable to serve from cache or queue.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Self::NearDuplicate { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_similarity_is_one() {
        let dedup = Deduplicator::default();
        let v = vec![0.6, 0.8];
        let score = dedup.max_similarity(&v, &[v.clone()]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn threshold_boundaries() {
        let dedup = Deduplicator::new(0.85);
        assert!(dedup.is_near_duplicate(0.86));
        assert!(!dedup.is_near_duplicate(0.84));
        // Exactly at threshold: not a duplicate.
        assert!(!dedup.is_near_duplicate(0.85));
    }

    #[test]
    fn empty_recent_scores_zero() {
        let dedup = Deduplicator::default();
        assert_eq!(dedup.max_similarity(&[1.0, 0.0], &[]), 0.0);
    }

    #[test]
    fn max_over_multiple_recent() {
        let dedup = Deduplicator::default();
        let candidate = vec![1.0, 0.0];
        let recent = vec![vec![0.0, 1.0], vec![0.7, 0.714], vec![1.0, 0.0]];
        let score = dedup.max_similarity(&candidate, &recent);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dimension_mismatch_skipped() {
        let dedup = Deduplicator::default();
        let candidate = vec![1.0, 0.0];
        let recent = vec![vec![1.0, 0.0, 0.0]];
        assert_eq!(dedup.max_similarity(&candidate, &recent), 0.0);
    }

    #[test]
    fn check_missing_embedding_is_unknown_and_acceptable() {
        let dedup = Deduplicator::default();
        let verdict = dedup.check(None, &[vec![1.0, 0.0]]);
        assert_eq!(verdict, DedupVerdict::Unknown);
        assert!(verdict.is_acceptable());
    }

    #[test]
    fn check_flags_near_duplicate() {
        let dedup = Deduplicator::default();
        let v = vec![0.6, 0.8];
        let verdict = dedup.check(Some(&v), &[v.clone()]);
        assert!(matches!(verdict, DedupVerdict::NearDuplicate { .. }));
        assert!(!verdict.is_acceptable());
    }

    #[test]
    fn check_accepts_distinct() {
        let dedup = Deduplicator::default();
        let verdict = dedup.check(Some(&[1.0, 0.0]), &[vec![0.0, 1.0]]);
        assert!(matches!(verdict, DedupVerdict::Distinct { .. }));
        assert!(verdict.is_acceptable());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn max_similarity_bounded(
                candidate in proptest::collection::vec(-10.0f32..10.0, 4),
                recent in proptest::collection::vec(
                    proptest::collection::vec(-10.0f32..10.0, 4), 0..8),
            ) {
                let dedup = Deduplicator::default();
                let score = dedup.max_similarity(&candidate, &recent);
                prop_assert!((-1.0..=1.0001).contains(&score) || score == 0.0);
            }
        }
    }
}
