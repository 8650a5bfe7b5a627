//! Rotary Position Embeddings (RoPE).
//!
//! Positions are encoded by rotating pairs of query/key channels. Because the
//! rotation depends only on the absolute position, keys rotated during an
//! earlier forward pass stay valid in the KV cache: a decode step only needs
//! to rotate its new tokens at offset `cache.positions()`.
//!
//! Reference: <https://arxiv.org/abs/2104.09864>

use candle_core::{DType, Device, Result, Tensor};

/// Precomputed rotary tables shared by every attention layer of a model.
///
/// Cloning is cheap: the tables are reference-counted tensors.
#[derive(Debug, Clone)]
pub struct RotaryEmbedding {
    /// Cosine table [max_positions, head_dim].
    cos: Tensor,
    /// Sine table [max_positions, head_dim].
    sin: Tensor,
    /// Head dimension (even).
    dim: usize,
    /// Number of positions covered by the tables.
    max_positions: usize,
}

impl RotaryEmbedding {
    /// Builds the cos/sin tables.
    ///
    /// # Arguments
    ///
    /// * `dim` - Head dimension, must be even
    /// * `max_positions` - Positions to precompute
    /// * `theta` - Base frequency (1e6 for Qwen3)
    /// * `dtype` - Data type of the tables
    /// * `device` - Device holding the tables
    pub fn new(
        dim: usize,
        max_positions: usize,
        theta: f64,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        if dim % 2 != 0 {
            candle_core::bail!("RoPE dimension must be even, got {dim}");
        }

        // inv_freq[i] = theta^(-2i/dim)
        let inv_freq: Vec<f32> = (0..dim / 2)
            .map(|i| 1.0 / theta.powf(2.0 * i as f64 / dim as f64) as f32)
            .collect();
        let inv_freq = Tensor::new(inv_freq.as_slice(), device)?;

        let positions: Vec<f32> = (0..max_positions).map(|p| p as f32).collect();
        let positions = Tensor::new(positions.as_slice(), device)?.reshape((max_positions, 1))?;

        // [max_positions, dim/2] -> [max_positions, dim]
        let freqs = positions.broadcast_mul(&inv_freq)?;
        let freqs = Tensor::cat(&[&freqs, &freqs], 1)?;

        Ok(Self {
            cos: freqs.cos()?.to_dtype(dtype)?,
            sin: freqs.sin()?.to_dtype(dtype)?,
            dim,
            max_positions,
        })
    }

    /// Returns the head dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns how many positions the tables cover.
    pub fn max_positions(&self) -> usize {
        self.max_positions
    }

    /// Rotates query and key tensors starting at absolute position `offset`.
    ///
    /// # Arguments
    ///
    /// * `q` - Queries [batch, seq_len, num_heads, head_dim]
    /// * `k` - Keys [batch, seq_len, num_kv_heads, head_dim]
    /// * `offset` - Absolute position of the first token (cached positions)
    pub fn apply(&self, q: &Tensor, k: &Tensor, offset: usize) -> Result<(Tensor, Tensor)> {
        let (_, seq_len, _, _) = q.dims4()?;
        if offset + seq_len > self.max_positions {
            candle_core::bail!(
                "position {} exceeds rotary table of {} positions",
                offset + seq_len,
                self.max_positions
            );
        }

        // [seq_len, dim] -> [1, seq_len, 1, dim]
        let cos = self.cos.narrow(0, offset, seq_len)?.unsqueeze(0)?.unsqueeze(2)?;
        let sin = self.sin.narrow(0, offset, seq_len)?.unsqueeze(0)?.unsqueeze(2)?;

        Ok((rotate(q, &cos, &sin)?, rotate(k, &cos, &sin)?))
    }
}

/// `x * cos + rotate_half(x) * sin`
fn rotate(x: &Tensor, cos: &Tensor, sin: &Tensor) -> Result<Tensor> {
    x.broadcast_mul(cos)?.add(&rotate_half(x)?.broadcast_mul(sin)?)
}

/// `[x1, x2] -> [-x2, x1]` over the last dimension.
fn rotate_half(x: &Tensor) -> Result<Tensor> {
    let last = x.rank() - 1;
    let half = x.dim(last)? / 2;
    let x1 = x.narrow(last, 0, half)?;
    let x2 = x.narrow(last, half, half)?;
    Tensor::cat(&[&x2.neg()?, &x1], last)
}
