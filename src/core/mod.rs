//! Core infrastructure for kv-cache-bench.
//!
//! This module contains:
//! - KvCache, the growable per-layer key/value store threaded through
//!   incremental decoding

pub mod kv_cache;

pub use kv_cache::{KvCache, LayerKvCache};
