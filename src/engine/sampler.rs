//! Greedy token selection.
//!
//! ```text
//! Logits [vocab_size]
//!     │
//!     ▼ argmax (ties → lowest id, NaN skipped)
//! (token_id, score)
//! ```
//!
//! Selection runs on host memory rather than through `Tensor::argmax`, so the
//! tie-break does not depend on the backend's reduction order.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Dense per-vocabulary scores for the position after the current sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct NextTokenDistribution {
    scores: Vec<f32>,
}

impl NextTokenDistribution {
    /// Wraps raw scores indexed by token id.
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }

    /// Score assigned to `token_id`, if it is in range.
    pub fn score(&self, token_id: u32) -> Option<f32> {
        self.scores.get(token_id as usize).copied()
    }

    /// Number of vocabulary entries.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the distribution has no entries.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// All scores, indexed by token id.
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Highest-scoring token and its score.
    ///
    /// On equal maximum scores the lowest token id wins. NaN entries are never
    /// selected; `None` when the distribution is empty or all NaN.
    pub fn argmax(&self) -> Option<(u32, f32)> {
        self.scores
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_nan())
            .fold(None, |best: Option<(usize, f32)>, (id, &score)| match best {
                Some((_, best_score))
                    if score.partial_cmp(&best_score) != Some(Ordering::Greater) =>
                {
                    best
                }
                _ => Some((id, score)),
            })
            .map(|(id, score)| (id as u32, score))
    }
}

/// A token picked by greedy selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// Selected token id.
    pub token_id: u32,
    /// Score the distribution assigned to it.
    pub score: f32,
}

/// Greedy (argmax) selection policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySampler;

impl GreedySampler {
    /// Selects the highest-scoring token.
    ///
    /// Fails with [`Error::Inference`] when the model produced no usable
    /// score.
    pub fn select(&self, distribution: &NextTokenDistribution) -> Result<Selection> {
        distribution
            .argmax()
            .map(|(token_id, score)| Selection { token_id, score })
            .ok_or_else(|| {
                Error::Inference(format!(
                    "distribution over {} entries has no selectable score",
                    distribution.len()
                ))
            })
    }
}
