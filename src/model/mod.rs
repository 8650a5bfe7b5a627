//! Model side of the benchmark.
//!
//! This module contains:
//! - The `ModelInterface` contract the decoding engine consumes
//! - Token codec adapter over `tokenizers`
//! - Qwen3 architecture (RMSNorm, RoPE, GQA, SwiGLU) with an explicit KV cache
//! - Model loading from HuggingFace

pub mod attention;
pub mod causal_lm;
pub mod codec;
pub mod decoder;
pub mod interface;
pub mod loader;
pub mod mlp;
pub mod norm;
pub mod qwen3;
pub mod rope;

pub use attention::{AttentionShape, Qwen3Attention};
pub use causal_lm::CausalLmInterface;
pub use codec::TokenCodec;
pub use decoder::Qwen3DecoderLayer;
pub use interface::{CacheState, ModelInterface};
pub use loader::{download_model, load_config, load_safetensors, load_tokenizer, ModelFiles, Qwen3Config};
pub use mlp::Qwen3Mlp;
pub use norm::RmsNorm;
pub use qwen3::{Qwen3ForCausalLM, Qwen3Model};
pub use rope::RotaryEmbedding;
