//! Qwen3 Attention.
//!
//! Grouped Query Attention with per-head Q/K RMSNorm and RoPE. Keys and
//! values are written into the layer's [`LayerKvCache`] before attending, so
//! the same code path serves a from-scratch pass (empty cache, all tokens) and
//! an incremental pass (filled cache, new tokens only).

use candle_core::{DType, Device, Module, Result, Tensor, D};
use candle_nn::{linear_no_bias, Linear, VarBuilder};

use super::mlp::random_linear;
use super::norm::RmsNorm;
use super::rope::RotaryEmbedding;
use crate::core::kv_cache::LayerKvCache;

/// Head layout of an attention layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttentionShape {
    /// Hidden dimension.
    pub hidden_size: usize,
    /// Number of query heads.
    pub num_heads: usize,
    /// Number of key-value heads.
    pub num_kv_heads: usize,
    /// Dimension per head.
    pub head_dim: usize,
}

impl AttentionShape {
    /// Query heads per KV head.
    pub fn num_kv_groups(&self) -> usize {
        self.num_heads / self.num_kv_heads
    }
}

/// Qwen3 Attention with Grouped Query Attention (GQA).
#[derive(Debug, Clone)]
pub struct Qwen3Attention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    o_proj: Linear,
    /// Per-head Q normalization.
    q_norm: RmsNorm,
    /// Per-head K normalization.
    k_norm: RmsNorm,
    /// Rotary tables shared with the other layers.
    rotary_emb: RotaryEmbedding,
    shape: AttentionShape,
    /// 1 / sqrt(head_dim).
    scale: f64,
}

impl Qwen3Attention {
    /// Loads attention weights from a VarBuilder.
    pub fn new(
        shape: AttentionShape,
        rms_norm_eps: f64,
        rotary_emb: RotaryEmbedding,
        vb: VarBuilder,
    ) -> Result<Self> {
        let AttentionShape {
            hidden_size,
            num_heads,
            num_kv_heads,
            head_dim,
        } = shape;

        let q_proj = linear_no_bias(hidden_size, num_heads * head_dim, vb.pp("q_proj"))?;
        let k_proj = linear_no_bias(hidden_size, num_kv_heads * head_dim, vb.pp("k_proj"))?;
        let v_proj = linear_no_bias(hidden_size, num_kv_heads * head_dim, vb.pp("v_proj"))?;
        let o_proj = linear_no_bias(num_heads * head_dim, hidden_size, vb.pp("o_proj"))?;

        let q_norm = RmsNorm::new(vb.get((head_dim,), "q_norm.weight")?, rms_norm_eps);
        let k_norm = RmsNorm::new(vb.get((head_dim,), "k_norm.weight")?, rms_norm_eps);

        Self::from_parts(shape, [q_proj, k_proj, v_proj, o_proj], q_norm, k_norm, rotary_emb)
    }

    /// Creates an attention layer with random weights for testing.
    pub fn new_random(
        shape: AttentionShape,
        rms_norm_eps: f64,
        rotary_emb: RotaryEmbedding,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let AttentionShape {
            hidden_size,
            num_heads,
            num_kv_heads,
            head_dim,
        } = shape;

        let projections = [
            random_linear(hidden_size, num_heads * head_dim, dtype, device)?,
            random_linear(hidden_size, num_kv_heads * head_dim, dtype, device)?,
            random_linear(hidden_size, num_kv_heads * head_dim, dtype, device)?,
            random_linear(num_heads * head_dim, hidden_size, dtype, device)?,
        ];
        let q_norm = RmsNorm::ones(head_dim, rms_norm_eps, dtype, device)?;
        let k_norm = RmsNorm::ones(head_dim, rms_norm_eps, dtype, device)?;

        Self::from_parts(shape, projections, q_norm, k_norm, rotary_emb)
    }

    fn from_parts(
        shape: AttentionShape,
        [q_proj, k_proj, v_proj, o_proj]: [Linear; 4],
        q_norm: RmsNorm,
        k_norm: RmsNorm,
        rotary_emb: RotaryEmbedding,
    ) -> Result<Self> {
        if shape.num_kv_heads == 0 || shape.num_heads % shape.num_kv_heads != 0 {
            candle_core::bail!(
                "num_heads ({}) must be a multiple of num_kv_heads ({})",
                shape.num_heads,
                shape.num_kv_heads
            );
        }
        if rotary_emb.dim() != shape.head_dim {
            candle_core::bail!(
                "rotary dim {} does not match head_dim {}",
                rotary_emb.dim(),
                shape.head_dim
            );
        }

        Ok(Self {
            q_proj,
            k_proj,
            v_proj,
            o_proj,
            q_norm,
            k_norm,
            rotary_emb,
            shape,
            scale: 1.0 / (shape.head_dim as f64).sqrt(),
        })
    }

    /// Returns the head layout.
    pub fn shape(&self) -> AttentionShape {
        self.shape
    }

    /// Forward pass over the new tokens.
    ///
    /// # Arguments
    ///
    /// * `hidden_states` - New positions [batch, seq_len, hidden_size]
    /// * `cache` - This layer's cache; its length is the rotary offset and it
    ///   is extended by `seq_len` positions
    ///
    /// # Returns
    ///
    /// Output tensor [batch, seq_len, hidden_size]
    pub fn forward(&self, hidden_states: &Tensor, cache: &mut LayerKvCache) -> Result<Tensor> {
        let (batch_size, seq_len, _) = hidden_states.dims3()?;
        let AttentionShape {
            num_heads,
            num_kv_heads,
            head_dim,
            ..
        } = self.shape;
        let offset = cache.positions();

        // [batch, seq_len, heads, head_dim]
        let q = self
            .q_proj
            .forward(hidden_states)?
            .reshape((batch_size, seq_len, num_heads, head_dim))?;
        let k = self
            .k_proj
            .forward(hidden_states)?
            .reshape((batch_size, seq_len, num_kv_heads, head_dim))?;
        let v = self
            .v_proj
            .forward(hidden_states)?
            .reshape((batch_size, seq_len, num_kv_heads, head_dim))?;

        let q = self.q_norm.forward(&q)?;
        let k = self.k_norm.forward(&k)?;
        let (q, k) = self.rotary_emb.apply(&q, &k, offset)?;

        let (k, v) = cache.append(&k, &v)?;
        let kv_len = offset + seq_len;

        // [batch, heads, len, head_dim]
        let q = q.transpose(1, 2)?.contiguous()?;
        let k = self.repeat_kv(&k)?.transpose(1, 2)?.contiguous()?;
        let v = self.repeat_kv(&v)?.transpose(1, 2)?.contiguous()?;

        // [batch, heads, seq_len, kv_len]
        let scores = (q.matmul(&k.transpose(D::Minus2, D::Minus1)?)? * self.scale)?;
        let scores = if seq_len > 1 {
            let mask = causal_mask(seq_len, kv_len, offset, q.device())?.to_dtype(scores.dtype())?;
            scores.broadcast_add(&mask)?
        } else {
            // A single new query may see every cached position.
            scores
        };
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;

        let out = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch_size, seq_len, num_heads * head_dim))?;
        self.o_proj.forward(&out)
    }

    /// `[b, s, kv_heads, d] -> [b, s, heads, d]`
    fn repeat_kv(&self, x: &Tensor) -> Result<Tensor> {
        let n_rep = self.shape.num_kv_groups();
        if n_rep == 1 {
            return Ok(x.clone());
        }
        let (batch, seq_len, num_kv_heads, head_dim) = x.dims4()?;
        x.unsqueeze(3)?
            .expand((batch, seq_len, num_kv_heads, n_rep, head_dim))?
            .reshape((batch, seq_len, self.shape.num_heads, head_dim))
    }
}

/// Causal mask `[1, 1, seq_len, kv_len]` for queries starting at `offset`.
///
/// Query `i` sits at absolute position `offset + i` and may attend to keys at
/// positions `<= offset + i`.
pub fn causal_mask(seq_len: usize, kv_len: usize, offset: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<f32> = (0..seq_len)
        .flat_map(|i| {
            (0..kv_len).map(move |j| if j > offset + i { f32::NEG_INFINITY } else { 0.0 })
        })
        .collect();
    Tensor::from_vec(mask, (1, 1, seq_len, kv_len), device)
}
