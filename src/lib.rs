//! kv-cache-bench: stateless vs. KV-cached greedy decoding, measured.
//!
//! The crate runs the same greedy generation twice over one model:
//! - Stateless: every step re-encodes and recomputes the whole sequence
//! - Cached: the prompt is prefilled once and each step feeds a single token
//!   against a reusable per-layer KV cache
//!
//! Each step is timed and its resident memory sampled, and the two traces are
//! rendered side by side.

pub mod config;
pub mod error;

pub mod core;
pub mod engine;
pub mod model;
pub mod report;

pub use crate::core::{KvCache, LayerKvCache};
pub use config::{BenchConfig, ModelSource, Precision};
pub use engine::{
    Clock, DecodeObserver, GenerationEngine, GenerationResult, GreedySampler, MemorySampler,
    NextTokenDistribution, ProcessMemory, Selection, SilentObserver, StepEvent, StepRecord,
    Strategy, SystemClock, TelemetryTrace, TracingObserver,
};
pub use error::{Error, ErrorKind, Result};
pub use model::{
    download_model, load_config, load_safetensors, load_tokenizer, CacheState, CausalLmInterface,
    ModelFiles, ModelInterface, Qwen3Config, Qwen3ForCausalLM, TokenCodec,
};
pub use report::{ComparisonRow, ComparisonSummary, TelemetryComparison};
