//! Fetching and opening Qwen3 checkpoints.
//!
//! - Downloading config, weights and tokenizer from HuggingFace Hub
//! - Parsing `config.json`
//! - Memory-mapping SafeTensors into a VarBuilder

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::attention::AttentionShape;
use crate::config::ModelSource;
use crate::error::{Error, Result};

/// Local paths of everything needed to build a model and its tokenizer.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    /// SafeTensors shards, sorted by file name.
    pub weights: Vec<PathBuf>,
    pub tokenizer: PathBuf,
}

/// Downloads (or finds in the local hub cache) every file a model needs.
pub fn download_model(source: &ModelSource) -> Result<ModelFiles> {
    let api = Api::new().map_err(|e| Error::ModelLoad(format!("failed to create HF API: {e}")))?;
    let repo = api.repo(Repo::with_revision(
        source.model_id.clone(),
        RepoType::Model,
        source.revision.clone(),
    ));
    info!(model = %source.model_id, revision = %source.revision, "fetching model files");

    let config = fetch(&repo, "config.json")?;
    let weights = download_weights(&repo)?;
    let tokenizer = fetch(&repo, "tokenizer.json")?;
    debug!(shards = weights.len(), "model files ready");

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

fn fetch(repo: &ApiRepo, filename: &str) -> Result<PathBuf> {
    repo.get(filename)
        .map_err(|e| Error::ModelLoad(format!("failed to download {filename}: {e}")))
}

/// Single `model.safetensors`, or every shard named by the index file.
fn download_weights(repo: &ApiRepo) -> Result<Vec<PathBuf>> {
    if let Ok(single) = repo.get("model.safetensors") {
        return Ok(vec![single]);
    }

    let index_path = repo.get("model.safetensors.index.json").map_err(|_| {
        Error::ModelLoad("no SafeTensors weights found; only SafeTensors is supported".into())
    })?;
    let index: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&index_path)?)?;
    let weight_map = index["weight_map"]
        .as_object()
        .ok_or_else(|| Error::ModelLoad("invalid safetensors index: missing weight_map".into()))?;

    let mut shards: Vec<&str> = weight_map.values().filter_map(|v| v.as_str()).collect();
    shards.sort_unstable();
    shards.dedup();

    shards.into_iter().map(|name| fetch(repo, name)).collect()
}

/// Creates a VarBuilder over memory-mapped SafeTensors files.
///
/// # Safety
///
/// The files are memory-mapped; they must not be modified while the returned
/// VarBuilder (or any tensor loaded from it) is alive.
#[allow(unsafe_code)]
pub fn load_safetensors(
    paths: &[PathBuf],
    dtype: DType,
    device: &Device,
) -> Result<VarBuilder<'static>> {
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(paths, dtype, device)? };
    Ok(vb)
}

/// Parses and validates a checkpoint's `config.json`.
pub fn load_config(path: &Path) -> Result<Qwen3Config> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::ModelLoad(format!("failed to read {}: {e}", path.display())))?;
    let config: Qwen3Config = serde_json::from_str(&raw)
        .map_err(|e| Error::ModelLoad(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Loads a tokenizer from tokenizer.json.
pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| Error::ModelLoad(format!("failed to load tokenizer: {e}")))
}

/// Architecture hyperparameters read from a checkpoint's `config.json`.
///
/// Field names follow the HuggingFace schema; optional keys fall back to the
/// Qwen3-0.6B values.
#[derive(Debug, Clone, Deserialize)]
pub struct Qwen3Config {
    pub vocab_size: usize,
    pub hidden_size: usize,
    /// SwiGLU inner width.
    pub intermediate_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    /// KV heads shared by groups of query heads.
    pub num_key_value_heads: usize,
    #[serde(default = "Qwen3Config::default_head_dim")]
    pub head_dim: usize,
    #[serde(default = "Qwen3Config::default_rms_norm_eps")]
    pub rms_norm_eps: f64,
    #[serde(default = "Qwen3Config::default_rope_theta")]
    pub rope_theta: f64,
    /// Longest sequence the rotary table covers; bounds prompt + generated
    /// tokens in a cached run.
    #[serde(default = "Qwen3Config::default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    /// Reuse the embedding matrix as the LM head.
    #[serde(default = "Qwen3Config::default_tie_word_embeddings")]
    pub tie_word_embeddings: bool,
}

impl Qwen3Config {
    fn default_head_dim() -> usize {
        128
    }

    fn default_rms_norm_eps() -> f64 {
        1e-6
    }

    fn default_rope_theta() -> f64 {
        1_000_000.0
    }

    fn default_max_position_embeddings() -> usize {
        40960
    }

    fn default_tie_word_embeddings() -> bool {
        true
    }

    /// Head layout shared by every attention layer.
    pub fn attention_shape(&self) -> AttentionShape {
        AttentionShape {
            hidden_size: self.hidden_size,
            num_heads: self.num_attention_heads,
            num_kv_heads: self.num_key_value_heads,
            head_dim: self.head_dim,
        }
    }

    /// Rejects layouts the attention and rotary code cannot build.
    pub fn validate(&self) -> Result<()> {
        if self.num_key_value_heads == 0 || self.num_attention_heads % self.num_key_value_heads != 0 {
            return Err(Error::ModelLoad(format!(
                "{} attention heads cannot be grouped over {} kv heads",
                self.num_attention_heads, self.num_key_value_heads
            )));
        }
        if self.head_dim % 2 != 0 {
            return Err(Error::ModelLoad(format!(
                "head_dim must be even for rotary embeddings, got {}",
                self.head_dim
            )));
        }
        Ok(())
    }
}
