//! Qwen3 causal language model with an explicit KV cache.
//!
//! ## Architecture
//!
//! ```text
//! Input Token IDs (new tokens only when a cache is supplied)
//!       │
//!       ▼
//! ┌───────────────┐
//! │  Embedding    │  vocab_size → hidden_size
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐      ┌──────────────┐
//! │ DecoderLayer  │ ◄──► │ LayerKvCache │  × num_hidden_layers
//! └───────────────┘      └──────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │   RMSNorm     │
//! └───────────────┘
//!       │
//!       ▼
//! ┌───────────────┐
//! │   LM Head     │  last position only → vocab_size
//! └───────────────┘
//! ```
//!
//! The cache is passed in by value and handed back extended, so the caller
//! decides whether to keep it (incremental decoding) or drop it (full
//! recomputation).

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{embedding, linear_no_bias, Embedding, Linear, VarBuilder};

use super::decoder::Qwen3DecoderLayer;
use super::loader::Qwen3Config;
use super::norm::RmsNorm;
use super::rope::RotaryEmbedding;
use crate::core::kv_cache::KvCache;

/// Qwen3 transformer body (no LM head).
#[derive(Debug, Clone)]
pub struct Qwen3Model {
    embed_tokens: Embedding,
    layers: Vec<Qwen3DecoderLayer>,
    norm: RmsNorm,
    device: Device,
    dtype: DType,
}

impl Qwen3Model {
    /// Loads the transformer body from a VarBuilder.
    pub fn new(config: &Qwen3Config, vb: VarBuilder) -> Result<Self> {
        let embed_tokens = embedding(
            config.vocab_size,
            config.hidden_size,
            vb.pp("model.embed_tokens"),
        )?;
        let rope = RotaryEmbedding::new(
            config.head_dim,
            config.max_position_embeddings,
            config.rope_theta,
            vb.dtype(),
            vb.device(),
        )?;

        let layers = (0..config.num_hidden_layers)
            .map(|i| {
                Qwen3DecoderLayer::new(
                    config.attention_shape(),
                    config.intermediate_size,
                    config.rms_norm_eps,
                    rope.clone(),
                    vb.pp(format!("model.layers.{i}")),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let norm = RmsNorm::new(
            vb.get((config.hidden_size,), "model.norm.weight")?,
            config.rms_norm_eps,
        );

        Ok(Self {
            embed_tokens,
            layers,
            norm,
            device: vb.device().clone(),
            dtype: vb.dtype(),
        })
    }

    /// Creates a transformer body with random weights for testing.
    pub fn new_random(config: &Qwen3Config, dtype: DType, device: &Device) -> Result<Self> {
        let embeddings =
            Tensor::randn(0.0f32, 1.0, (config.vocab_size, config.hidden_size), device)?
                .to_dtype(dtype)?;
        let rope = RotaryEmbedding::new(
            config.head_dim,
            config.max_position_embeddings,
            config.rope_theta,
            dtype,
            device,
        )?;

        let layers = (0..config.num_hidden_layers)
            .map(|_| {
                Qwen3DecoderLayer::new_random(
                    config.attention_shape(),
                    config.intermediate_size,
                    config.rms_norm_eps,
                    rope.clone(),
                    dtype,
                    device,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            embed_tokens: Embedding::new(embeddings, config.hidden_size),
            layers,
            norm: RmsNorm::ones(config.hidden_size, config.rms_norm_eps, dtype, device)?,
            device: device.clone(),
            dtype,
        })
    }

    /// Runs the new tokens through every layer, extending `cache`.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - New token IDs [batch, seq_len]
    /// * `cache` - Cache covering all earlier positions
    ///
    /// # Returns
    ///
    /// Hidden states for the new positions [batch, seq_len, hidden_size]
    pub fn forward(&self, input_ids: &Tensor, cache: &mut KvCache) -> Result<Tensor> {
        if cache.num_layers() != self.layers.len() {
            candle_core::bail!(
                "cache has {} layers, model has {}",
                cache.num_layers(),
                self.layers.len()
            );
        }
        let (_, seq_len) = input_ids.dims2()?;

        let mut hidden_states = self.embed_tokens.forward(input_ids)?;
        for (layer, layer_cache) in self.layers.iter().zip(cache.layers_mut()) {
            hidden_states = layer.forward(&hidden_states, layer_cache)?;
        }
        cache.commit(seq_len)?;

        self.norm.forward(&hidden_states)
    }

    /// Returns the device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Returns the data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

/// Qwen3 model for causal language modeling.
#[derive(Debug, Clone)]
pub struct Qwen3ForCausalLM {
    model: Qwen3Model,
    lm_head: Linear,
    vocab_size: usize,
}

impl Qwen3ForCausalLM {
    /// Loads the full model from a VarBuilder.
    pub fn new(config: &Qwen3Config, vb: VarBuilder) -> Result<Self> {
        let model = Qwen3Model::new(config, vb.clone())?;
        let lm_head = if config.tie_word_embeddings {
            Linear::new(model.embed_tokens.embeddings().clone(), None)
        } else {
            linear_no_bias(config.hidden_size, config.vocab_size, vb.pp("lm_head"))?
        };

        Ok(Self {
            model,
            lm_head,
            vocab_size: config.vocab_size,
        })
    }

    /// Creates a random-weight model with tied embeddings for testing.
    pub fn new_random(config: &Qwen3Config, dtype: DType, device: &Device) -> Result<Self> {
        let model = Qwen3Model::new_random(config, dtype, device)?;
        let lm_head = Linear::new(model.embed_tokens.embeddings().clone(), None);

        Ok(Self {
            model,
            lm_head,
            vocab_size: config.vocab_size,
        })
    }

    /// Creates an empty cache sized for this model.
    pub fn new_cache(&self) -> KvCache {
        KvCache::new(self.model.num_layers())
    }

    /// Forward pass returning last-position logits and the extended cache.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Token IDs [batch, seq_len]; the full sequence when
    ///   `cache` is `None`, otherwise only the tokens after the cached ones
    /// * `cache` - Cache from the previous call of the same run
    ///
    /// # Returns
    ///
    /// `(logits [batch, vocab_size], cache)` where the cache now covers every
    /// position fed so far.
    pub fn forward(&self, input_ids: &Tensor, cache: Option<KvCache>) -> Result<(Tensor, KvCache)> {
        let mut cache = cache.unwrap_or_else(|| self.new_cache());
        let hidden_states = self.model.forward(input_ids, &mut cache)?;

        let seq_len = hidden_states.dim(1)?;
        let last_hidden = hidden_states.narrow(1, seq_len - 1, 1)?.squeeze(1)?;
        let logits = self.lm_head.forward(&last_hidden)?;

        Ok((logits, cache))
    }

    /// Returns reference to the base model.
    pub fn model(&self) -> &Qwen3Model {
        &self.model
    }

    /// Vocabulary size of the LM head.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Returns the device.
    pub fn device(&self) -> &Device {
        self.model.device()
    }

    /// Returns the data type.
    pub fn dtype(&self) -> DType {
        self.model.dtype()
    }
}
