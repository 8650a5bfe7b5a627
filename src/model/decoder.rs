//! Qwen3 Decoder Layer.
//!
//! Pre-norm residual block: attention then MLP.

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::VarBuilder;

use super::attention::{AttentionShape, Qwen3Attention};
use super::mlp::Qwen3Mlp;
use super::norm::RmsNorm;
use super::rope::RotaryEmbedding;
use crate::core::kv_cache::LayerKvCache;

/// Qwen3 Decoder Layer.
///
/// ```text
/// x ─┬─ input_layernorm ─ self_attn ─(+)─┬─ post_attention_layernorm ─ mlp ─(+)─► out
///    └───────────────────────────────────┘└───────────────────────────────────┘
/// ```
#[derive(Debug, Clone)]
pub struct Qwen3DecoderLayer {
    input_layernorm: RmsNorm,
    self_attn: Qwen3Attention,
    post_attention_layernorm: RmsNorm,
    mlp: Qwen3Mlp,
}

impl Qwen3DecoderLayer {
    /// Loads a decoder layer from a VarBuilder.
    pub fn new(
        shape: AttentionShape,
        intermediate_size: usize,
        rms_norm_eps: f64,
        rotary_emb: RotaryEmbedding,
        vb: VarBuilder,
    ) -> Result<Self> {
        let hidden_size = shape.hidden_size;
        Ok(Self {
            input_layernorm: RmsNorm::new(
                vb.get((hidden_size,), "input_layernorm.weight")?,
                rms_norm_eps,
            ),
            self_attn: Qwen3Attention::new(shape, rms_norm_eps, rotary_emb, vb.pp("self_attn"))?,
            post_attention_layernorm: RmsNorm::new(
                vb.get((hidden_size,), "post_attention_layernorm.weight")?,
                rms_norm_eps,
            ),
            mlp: Qwen3Mlp::new(hidden_size, intermediate_size, vb.pp("mlp"))?,
        })
    }

    /// Creates a decoder layer with random weights for testing.
    pub fn new_random(
        shape: AttentionShape,
        intermediate_size: usize,
        rms_norm_eps: f64,
        rotary_emb: RotaryEmbedding,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let hidden_size = shape.hidden_size;
        Ok(Self {
            input_layernorm: RmsNorm::ones(hidden_size, rms_norm_eps, dtype, device)?,
            self_attn: Qwen3Attention::new_random(shape, rms_norm_eps, rotary_emb, dtype, device)?,
            post_attention_layernorm: RmsNorm::ones(hidden_size, rms_norm_eps, dtype, device)?,
            mlp: Qwen3Mlp::new_random(hidden_size, intermediate_size, dtype, device)?,
        })
    }

    /// Returns a reference to the attention module.
    pub fn self_attn(&self) -> &Qwen3Attention {
        &self.self_attn
    }

    /// Forward pass over the new positions, extending `cache`.
    ///
    /// # Arguments
    ///
    /// * `hidden_states` - [batch, seq_len, hidden_size]
    /// * `cache` - This layer's KV cache
    pub fn forward(&self, hidden_states: &Tensor, cache: &mut LayerKvCache) -> Result<Tensor> {
        let residual = hidden_states;
        let h = self.input_layernorm.forward(hidden_states)?;
        let h = (residual + self.self_attn.forward(&h, cache)?)?;

        let residual = &h;
        let out = self.mlp.forward(&self.post_attention_layernorm.forward(&h)?)?;
        residual + out
    }
}
