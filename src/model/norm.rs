//! RMS Normalization.
//!
//! Reference: <https://arxiv.org/abs/1910.07467>

use candle_core::{DType, Device, Module, Result, Tensor, D};

/// RMS Normalization layer: `x / sqrt(mean(x^2) + eps) * weight`.
///
/// Normalizes over the last dimension, so the same layer serves both the
/// hidden-state norms and Qwen3's per-head Q/K norms.
#[derive(Debug, Clone)]
pub struct RmsNorm {
    /// Learnable scale [dim].
    weight: Tensor,
    eps: f64,
}

impl RmsNorm {
    /// Creates a new RmsNorm layer from a loaded weight.
    pub fn new(weight: Tensor, eps: f64) -> Self {
        Self { weight, eps }
    }

    /// Creates a unit-weight RmsNorm, used for random test models.
    pub fn ones(dim: usize, eps: f64, dtype: DType, device: &Device) -> Result<Self> {
        Ok(Self::new(Tensor::ones(dim, dtype, device)?, eps))
    }

    /// Returns a reference to the weight tensor.
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }
}

impl Module for RmsNorm {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let rms = (x.sqr()?.mean_keepdim(D::Minus1)? + self.eps)?.sqrt()?;
        x.broadcast_div(&rms)?.broadcast_mul(&self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmsnorm_values() {
        let device = Device::Cpu;
        let norm = RmsNorm::ones(4, 1e-6, DType::F32, &device).unwrap();
        let x = Tensor::new(&[[1.0f32, 2.0, 3.0, 4.0]], &device).unwrap();

        let out: Vec<f32> = norm.forward(&x).unwrap().flatten_all().unwrap().to_vec1().unwrap();

        // rms = sqrt(30 / 4)
        let rms = (7.5f32 + 1e-6).sqrt();
        for (i, v) in out.iter().enumerate() {
            assert!((v - (i as f32 + 1.0) / rms).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rmsnorm_scales_by_weight() {
        let device = Device::Cpu;
        let norm = RmsNorm::new(Tensor::new(&[2.0f32, 2.0], &device).unwrap(), 1e-6);
        let x = Tensor::new(&[[3.0f32, 3.0]], &device).unwrap();

        let out: Vec<f32> = norm.forward(&x).unwrap().flatten_all().unwrap().to_vec1().unwrap();
        assert!((out[0] - 2.0).abs() < 1e-4);
        assert!((out[1] - 2.0).abs() < 1e-4);
    }
}
