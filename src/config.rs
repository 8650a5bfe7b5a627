//! Configuration types for kv-cache-bench.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where to fetch model weights, config and tokenizer from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSource {
    /// HuggingFace model ID.
    pub model_id: String,
    /// Git revision (branch, tag, or commit hash).
    pub revision: String,
}

impl Default for ModelSource {
    fn default() -> Self {
        Self {
            model_id: "Qwen/Qwen3-0.6B".to_string(),
            revision: "main".to_string(),
        }
    }
}

/// Tensor precision used when loading weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F32,
    F16,
    Bf16,
}

impl Precision {
    /// Converts to the candle dtype.
    pub fn dtype(self) -> candle_core::DType {
        match self {
            Self::F32 => candle_core::DType::F32,
            Self::F16 => candle_core::DType::F16,
            Self::Bf16 => candle_core::DType::BF16,
        }
    }
}

/// Benchmark run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Model to benchmark.
    pub model: ModelSource,
    /// Prompt shared by both strategies.
    pub prompt: String,
    /// Number of greedy generation steps per strategy.
    pub max_new_tokens: usize,
    /// Weight precision.
    pub precision: Precision,
    /// Run on CPU even when an accelerator is available.
    pub force_cpu: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            model: ModelSource::default(),
            prompt: "The quick brown fox".to_string(),
            max_new_tokens: 20,
            precision: Precision::F32,
            force_cpu: false,
        }
    }
}

impl BenchConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.model.model_id.trim().is_empty() {
            return Err(Error::Config("model_id cannot be empty".into()));
        }
        if self.prompt.is_empty() {
            return Err(Error::Config("prompt cannot be empty".into()));
        }
        Ok(())
    }
}
