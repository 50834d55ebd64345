//! Ranking of catalogue candidates against a query embedding.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use jewel_embeddings::{EmbeddingVector, similarity};

use crate::error::Result;
use crate::index::CatalogueSnapshot;
use crate::metal::MetalLabel;

/// Fraction of the best score a candidate must reach to be returned.
pub const DEFAULT_THRESHOLD_RATIO: f32 = 0.8;

/// Maximum number of results per query.
pub const DEFAULT_RESULT_CAP: usize = 8;

/// A ranked catalogue image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    /// Web path of the image.
    pub path: String,

    /// Similarity to the query.
    pub score: f32,

    /// Metal the image is filed under.
    pub metal: MetalLabel,
}

/// Orders candidates for a query.
///
/// Implementations must return matches best-first and be deterministic for
/// a fixed query and candidate set.
pub trait Ranker: Send + Sync {
    fn rank(
        &self,
        query: &EmbeddingVector,
        candidates: &CatalogueSnapshot,
    ) -> Result<Vec<RankedMatch>>;
}

/// Exhaustive top-k with a threshold relative to the best candidate.
///
/// Every candidate is scored; scores are sorted descending with ties kept in
/// candidate order; candidates below `best * ratio` are dropped and at most
/// `cap` are returned. The threshold is applied literally: when the best
/// score is negative, `best * ratio` is above the best score and nothing is
/// returned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeThresholdRanker {
    ratio: f32,
    cap: usize,
}

impl RelativeThresholdRanker {
    pub fn new(ratio: f32, cap: usize) -> Self {
        Self { ratio, cap }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for RelativeThresholdRanker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_RATIO, DEFAULT_RESULT_CAP)
    }
}

impl Ranker for RelativeThresholdRanker {
    fn rank(
        &self,
        query: &EmbeddingVector,
        candidates: &CatalogueSnapshot,
    ) -> Result<Vec<RankedMatch>> {
        let mut scored: Vec<(OrderedFloat<f32>, usize)> = Vec::with_capacity(candidates.len());
        for (position, entry) in candidates.iter().enumerate() {
            let score = similarity(query, &entry.embedding)?;
            scored.push((OrderedFloat(score), position));
        }

        // Best first; equal scores keep candidate order.
        scored.sort_by_key(|&(score, position)| (Reverse(score), position));

        let Some(&(best, _)) = scored.first() else {
            return Ok(Vec::new());
        };
        let threshold = best.0 * self.ratio;

        let entries = candidates.entries();
        let results: Vec<RankedMatch> = scored
            .into_iter()
            .filter(|(score, _)| score.0 >= threshold)
            .take(self.cap)
            .map(|(score, position)| {
                let entry = &entries[position];
                RankedMatch {
                    path: entry.path.clone(),
                    score: score.0,
                    metal: entry.metal,
                }
            })
            .collect();

        debug!(
            "Ranked {} candidates: best {:.4}, threshold {threshold:.4}, kept {}",
            candidates.len(),
            best.0,
            results.len()
        );
        Ok(results)
    }
}
