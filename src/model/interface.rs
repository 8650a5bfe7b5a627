//! The model contract consumed by the decoding engine.
//!
//! ```text
//!   full sequence ──┐                 ┌──► NextTokenDistribution
//!                   ├─► ModelInterface┤
//!   prior cache? ───┘                 └──► extended Cache
//! ```
//!
//! With no prior cache the input is the whole sequence. With a prior cache the
//! input is only the tokens appended since that cache was produced, and the
//! returned distribution must match what a from-scratch pass over the full
//! sequence would give.

use crate::engine::sampler::NextTokenDistribution;
use crate::error::Result;

/// Saved per-position model state for one generation run.
///
/// Implementors are owned values moved in and out of
/// [`ModelInterface::next_distribution`]; they should not be `Clone`.
pub trait CacheState {
    /// Number of token positions already processed into this cache.
    fn positions(&self) -> usize;
}

/// Single point of contact with the sequence model and its tokenizer.
pub trait ModelInterface {
    /// Opaque cache produced and consumed by this model.
    type Cache: CacheState;

    /// Encodes text into token ids.
    ///
    /// Fails with [`Error::Encoding`](crate::Error::Encoding) if the text cannot
    /// be tokenized.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decodes a single token id into its text fragment.
    ///
    /// Fails with [`Error::Decoding`](crate::Error::Decoding) for ids outside
    /// the vocabulary.
    fn decode(&self, token_id: u32) -> Result<String>;

    /// Runs one model evaluation over `input`.
    ///
    /// Cost is proportional to `input.len()`, not to the total sequence
    /// length. Any failure is reported as
    /// [`Error::Inference`](crate::Error::Inference).
    fn next_distribution(
        &mut self,
        input: &[u32],
        prior: Option<Self::Cache>,
    ) -> Result<(NextTokenDistribution, Self::Cache)>;
}
