//! Integration tests for KvCache.

use candle_core::{DType, Device, Tensor};
use kv_cache_bench::{CacheState, KvCache, LayerKvCache};

fn kv(positions: usize, fill: f64) -> (Tensor, Tensor) {
    let device = Device::Cpu;
    let k = (Tensor::ones((1, positions, 2, 4), DType::F32, &device).unwrap() * fill).unwrap();
    let v = (Tensor::ones((1, positions, 2, 4), DType::F32, &device).unwrap() * -fill).unwrap();
    (k, v)
}

#[test]
fn test_prefill_then_single_steps() {
    let mut layer = LayerKvCache::new();

    let (k, v) = kv(4, 1.0);
    layer.append(&k, &v).unwrap();
    assert_eq!(layer.positions(), 4);

    for step in 1..=3 {
        let (k, v) = kv(1, 2.0);
        let (keys, values) = layer.append(&k, &v).unwrap();
        assert_eq!(keys.dims(), &[1, 4 + step, 2, 4]);
        assert_eq!(values.dims(), &[1, 4 + step, 2, 4]);
    }
    assert_eq!(layer.positions(), 7);
}

#[test]
fn test_append_preserves_order() {
    let mut layer = LayerKvCache::new();
    let (k0, v0) = kv(2, 1.0);
    let (k1, v1) = kv(1, 5.0);
    layer.append(&k0, &v0).unwrap();
    let (keys, values) = layer.append(&k1, &v1).unwrap();

    let firsts: Vec<f32> = keys
        .narrow(2, 0, 1)
        .unwrap()
        .narrow(3, 0, 1)
        .unwrap()
        .flatten_all()
        .unwrap()
        .to_vec1()
        .unwrap();
    assert_eq!(firsts, vec![1.0, 1.0, 5.0]);

    let last_value: Vec<f32> = values.narrow(1, 2, 1).unwrap().flatten_all().unwrap().to_vec1().unwrap();
    assert!(last_value.iter().all(|&x| x == -5.0));
}

#[test]
fn test_mismatched_key_value_rejected() {
    let mut layer = LayerKvCache::new();
    let (k, _) = kv(2, 1.0);
    let (_, v) = kv(3, 1.0);

    assert!(layer.append(&k, &v).is_err());
    assert_eq!(layer.positions(), 0);
}

#[test]
fn test_commit_tracks_positions() {
    let mut cache = KvCache::new(2);
    assert!(cache.is_empty());

    let (k, v) = kv(3, 1.0);
    for layer in cache.layers_mut() {
        layer.append(&k, &v).unwrap();
    }
    cache.commit(3).unwrap();
    assert_eq!(CacheState::positions(&cache), 3);
    assert_eq!(cache.size_in_bytes(), 2 * 2 * 3 * 2 * 4 * 4);

    let (k, v) = kv(1, 1.0);
    for layer in cache.layers_mut() {
        layer.append(&k, &v).unwrap();
    }
    cache.commit(1).unwrap();
    assert_eq!(cache.positions(), 4);
}

#[test]
fn test_commit_detects_skipped_layer() {
    let mut cache = KvCache::new(2);
    let (k, v) = kv(2, 1.0);
    if let Some(first) = cache.layers_mut().next() {
        first.append(&k, &v).unwrap();
    }

    assert!(cache.commit(2).is_err());
    assert_eq!(cache.positions(), 0);
}
