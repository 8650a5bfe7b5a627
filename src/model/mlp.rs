//! Qwen3 SwiGLU feed-forward block.
//!
//! `down_proj(silu(gate_proj(x)) * up_proj(x))`
//!
//! Reference: <https://arxiv.org/abs/2002.05202>

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{linear_no_bias, Linear, VarBuilder};

/// Random linear layer `[out, in]` with small weights.
pub(crate) fn random_linear(
    in_dim: usize,
    out_dim: usize,
    dtype: DType,
    device: &Device,
) -> Result<Linear> {
    let weight = Tensor::randn(0.0f32, 0.02, (out_dim, in_dim), device)?.to_dtype(dtype)?;
    Ok(Linear::new(weight, None))
}

/// Qwen3 MLP with SwiGLU activation.
#[derive(Debug, Clone)]
pub struct Qwen3Mlp {
    gate_proj: Linear,
    up_proj: Linear,
    down_proj: Linear,
}

impl Qwen3Mlp {
    /// Loads the MLP weights from a VarBuilder.
    pub fn new(hidden_size: usize, intermediate_size: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            gate_proj: linear_no_bias(hidden_size, intermediate_size, vb.pp("gate_proj"))?,
            up_proj: linear_no_bias(hidden_size, intermediate_size, vb.pp("up_proj"))?,
            down_proj: linear_no_bias(intermediate_size, hidden_size, vb.pp("down_proj"))?,
        })
    }

    /// Creates an MLP with random weights for testing.
    pub fn new_random(
        hidden_size: usize,
        intermediate_size: usize,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        Ok(Self {
            gate_proj: random_linear(hidden_size, intermediate_size, dtype, device)?,
            up_proj: random_linear(hidden_size, intermediate_size, dtype, device)?,
            down_proj: random_linear(intermediate_size, hidden_size, dtype, device)?,
        })
    }
}

impl Module for Qwen3Mlp {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let gate = self.gate_proj.forward(x)?.silu()?;
        let up = self.up_proj.forward(x)?;
        self.down_proj.forward(&(gate * up)?)
    }
}
