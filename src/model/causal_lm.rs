//! [`ModelInterface`] over a candle Qwen3 model and a token codec.

use candle_core::{DType, Tensor};

use super::codec::TokenCodec;
use super::interface::ModelInterface;
use super::qwen3::Qwen3ForCausalLM;
use crate::core::kv_cache::KvCache;
use crate::engine::sampler::NextTokenDistribution;
use crate::error::{Error, Result};

/// Qwen3 causal LM paired with its tokenizer.
///
/// Every tensor failure inside a forward pass surfaces as
/// [`Error::Inference`].
pub struct CausalLmInterface<T> {
    model: Qwen3ForCausalLM,
    codec: T,
}

impl<T: TokenCodec> CausalLmInterface<T> {
    /// Pairs a model with its codec.
    pub fn new(model: Qwen3ForCausalLM, codec: T) -> Self {
        Self { model, codec }
    }

    /// Returns the wrapped model.
    pub fn model(&self) -> &Qwen3ForCausalLM {
        &self.model
    }

    /// Returns the wrapped codec.
    pub fn codec(&self) -> &T {
        &self.codec
    }

    fn logits(&self, input: &[u32], prior: Option<KvCache>) -> candle_core::Result<(Vec<f32>, KvCache)> {
        let input_ids = Tensor::new(input, self.model.device())?.unsqueeze(0)?;
        let (logits, cache) = self.model.forward(&input_ids, prior)?;
        let scores = logits.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
        Ok((scores, cache))
    }
}

impl<T: TokenCodec> ModelInterface for CausalLmInterface<T> {
    type Cache = KvCache;

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        self.codec.encode(text)
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        let vocab_size = self.model.vocab_size().min(self.codec.vocab_size());
        if token_id as usize >= vocab_size {
            return Err(Error::Decoding {
                token_id,
                vocab_size,
            });
        }
        self.codec.decode(token_id)
    }

    fn next_distribution(
        &mut self,
        input: &[u32],
        prior: Option<KvCache>,
    ) -> Result<(NextTokenDistribution, KvCache)> {
        if input.is_empty() {
            return Err(Error::Inference("no input tokens".into()));
        }
        let (scores, cache) = self.logits(input, prior).map_err(Error::inference)?;
        Ok((NextTokenDistribution::new(scores), cache))
    }
}
