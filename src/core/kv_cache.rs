//! Growable KV cache for incremental decoding.
//!
//! The cache stores the key and value projections of every position already
//! fed through the model, one slot per transformer layer. A decode step
//! appends the new positions and attends over the whole cache, so only the
//! new tokens have to be projected.
//!
//! ## Memory Layout
//!
//! Each layer holds a key tensor and a value tensor of shape
//! `[batch, positions, num_kv_heads, head_dim]`, concatenated along dim 1:
//!
//! ```text
//! step 0 (prefill "The quick brown fox", 4 tokens)
//!   K: [1, 4, kv, d]   V: [1, 4, kv, d]
//! step 1 (1 new token)
//!   K: [1, 5, kv, d]   V: [1, 5, kv, d]
//! step 2
//!   K: [1, 6, kv, d]   V: [1, 6, kv, d]
//! ```
//!
//! A [`KvCache`] is deliberately not `Clone`: it belongs to one generation run
//! and is moved into and out of each forward pass.

use candle_core::{Result, Tensor};

use crate::model::interface::CacheState;

/// Sequence axis of cached key/value tensors.
const SEQ_DIM: usize = 1;

/// KV cache for a single transformer layer.
#[derive(Debug, Default)]
pub struct LayerKvCache {
    /// Keys: [batch, positions, num_kv_heads, head_dim]
    keys: Option<Tensor>,
    /// Values: [batch, positions, num_kv_heads, head_dim]
    values: Option<Tensor>,
}

impl LayerKvCache {
    /// Creates an empty layer cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends new key/value states and returns the full cached tensors.
    ///
    /// # Arguments
    ///
    /// * `key` - New keys `[batch, new_positions, num_kv_heads, head_dim]`
    /// * `value` - New values, same shape as `key`
    ///
    /// # Returns
    ///
    /// `(keys, values)` covering every cached position including the new ones.
    pub fn append(&mut self, key: &Tensor, value: &Tensor) -> Result<(Tensor, Tensor)> {
        if key.dims() != value.dims() {
            candle_core::bail!(
                "key/value shape mismatch: {:?} vs {:?}",
                key.dims(),
                value.dims()
            );
        }

        let (keys, values) = match (&self.keys, &self.values) {
            (Some(k_cache), Some(v_cache)) => (
                Tensor::cat(&[k_cache, key], SEQ_DIM)?,
                Tensor::cat(&[v_cache, value], SEQ_DIM)?,
            ),
            _ => (key.clone(), value.clone()),
        };

        self.keys = Some(keys.clone());
        self.values = Some(values.clone());
        Ok((keys, values))
    }

    /// Number of cached positions.
    pub fn positions(&self) -> usize {
        self.keys
            .as_ref()
            .and_then(|k| k.dim(SEQ_DIM).ok())
            .unwrap_or(0)
    }

    /// Get the key cache tensor, if any position has been cached.
    pub fn keys(&self) -> Option<&Tensor> {
        self.keys.as_ref()
    }

    /// Get the value cache tensor, if any position has been cached.
    pub fn values(&self) -> Option<&Tensor> {
        self.values.as_ref()
    }

    /// Bytes held by keys and values.
    pub fn size_in_bytes(&self) -> usize {
        [&self.keys, &self.values]
            .into_iter()
            .flatten()
            .map(|t| t.elem_count() * t.dtype().size_in_bytes())
            .sum()
    }
}

/// KV cache for all transformer layers of one generation run.
#[derive(Debug)]
pub struct KvCache {
    /// Per-layer caches.
    layers: Vec<LayerKvCache>,
    /// Positions committed after the last completed forward pass.
    positions: usize,
}

impl KvCache {
    /// Creates an empty cache for `num_layers` layers.
    pub fn new(num_layers: usize) -> Self {
        let layers = (0..num_layers).map(|_| LayerKvCache::new()).collect();
        Self {
            layers,
            positions: 0,
        }
    }

    /// Get the cache for a specific layer.
    pub fn layer(&self, layer_idx: usize) -> Option<&LayerKvCache> {
        self.layers.get(layer_idx)
    }

    /// Mutable access to every layer, in layer order.
    pub fn layers_mut(&mut self) -> impl Iterator<Item = &mut LayerKvCache> {
        self.layers.iter_mut()
    }

    /// Get the number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Number of positions every layer holds.
    pub fn positions(&self) -> usize {
        self.positions
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.positions == 0
    }

    /// Total bytes held across all layers.
    pub fn size_in_bytes(&self) -> usize {
        self.layers.iter().map(LayerKvCache::size_in_bytes).sum()
    }

    /// Records that a forward pass appended `new_positions` to every layer.
    ///
    /// Fails if any layer disagrees, which would mean a layer was skipped or
    /// written twice.
    pub fn commit(&mut self, new_positions: usize) -> Result<()> {
        let expected = self.positions + new_positions;
        for (idx, layer) in self.layers.iter().enumerate() {
            let actual = layer.positions();
            if actual != expected {
                candle_core::bail!(
                    "layer {idx} cache holds {actual} positions, expected {expected}"
                );
            }
        }
        self.positions = expected;
        Ok(())
    }
}

impl CacheState for KvCache {
    fn positions(&self) -> usize {
        self.positions
    }
}
