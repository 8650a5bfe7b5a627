//! Deterministic stub models and capabilities shared by integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use kv_cache_bench::{
    CacheState, Clock, DecodeObserver, Error, MemorySampler, ModelInterface,
    NextTokenDistribution, Result, StepEvent, Strategy,
};

/// ASCII vocabulary size of the byte-level stubs.
pub const VOCAB: usize = 128;

/// Encodes ASCII text one byte per token.
pub fn encode_ascii(text: &str) -> Result<Vec<u32>> {
    if !text.is_ascii() {
        return Err(Error::Encoding(format!("non-ascii input: {text:?}")));
    }
    Ok(text.bytes().map(u32::from).collect())
}

/// Decodes one ASCII byte token.
pub fn decode_ascii(token_id: u32) -> Result<String> {
    if token_id as usize >= VOCAB {
        return Err(Error::Decoding {
            token_id,
            vocab_size: VOCAB,
        });
    }
    Ok(char::from(token_id as u8).to_string())
}

/// Cache that remembers every token fed so far.
#[derive(Debug, Default)]
pub struct HistoryCache {
    pub tokens: Vec<u32>,
}

impl CacheState for HistoryCache {
    fn positions(&self) -> usize {
        self.tokens.len()
    }
}

/// Shared synthetic time, advanced by the models in proportion to their input.
#[derive(Debug, Clone, Default)]
pub struct SyntheticClock {
    now: Rc<Cell<Duration>>,
}

impl SyntheticClock {
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for SyntheticClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Memory sampler reporting a constant.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub f64);

impl MemorySampler for FixedMemory {
    fn resident_memory_mb(&self) -> f64 {
        self.0
    }
}

/// Byte-level model whose scores depend on the whole history.
///
/// Only lowercase letters get non-zero scores, so generated text stays
/// printable. Every call costs one synthetic millisecond per input token.
#[derive(Debug, Default)]
pub struct HistoryModel {
    pub clock: SyntheticClock,
    /// Input length of every `next_distribution` call.
    pub input_lens: Vec<usize>,
}

impl HistoryModel {
    pub fn with_clock(clock: SyntheticClock) -> Self {
        Self {
            clock,
            input_lens: Vec::new(),
        }
    }

    fn scores(history: &[u32]) -> Vec<f32> {
        let seed = history
            .iter()
            .enumerate()
            .fold(17u64, |acc, (i, &t)| {
                acc.wrapping_mul(31).wrapping_add(u64::from(t) * (i as u64 + 1))
            });
        (0..VOCAB as u64)
            .map(|id| {
                if (u64::from(b'a')..=u64::from(b'z')).contains(&id) {
                    (seed.wrapping_add(id * 7919) % 1000) as f32 / 10.0 + 1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

impl ModelInterface for HistoryModel {
    type Cache = HistoryCache;

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        encode_ascii(text)
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        decode_ascii(token_id)
    }

    fn next_distribution(
        &mut self,
        input: &[u32],
        prior: Option<HistoryCache>,
    ) -> Result<(NextTokenDistribution, HistoryCache)> {
        self.input_lens.push(input.len());
        self.clock.advance(Duration::from_millis(input.len() as u64));

        let mut cache = prior.unwrap_or_default();
        cache.tokens.extend_from_slice(input);
        Ok((NextTokenDistribution::new(Self::scores(&cache.tokens)), cache))
    }
}

/// Always selects token 7, which decodes to `"!"`.
#[derive(Debug, Default)]
pub struct BangModel;

impl ModelInterface for BangModel {
    type Cache = HistoryCache;

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        encode_ascii(text)
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        match token_id {
            7 => Ok("!".to_string()),
            other => decode_ascii(other),
        }
    }

    fn next_distribution(
        &mut self,
        input: &[u32],
        prior: Option<HistoryCache>,
    ) -> Result<(NextTokenDistribution, HistoryCache)> {
        let mut cache = prior.unwrap_or_default();
        cache.tokens.extend_from_slice(input);
        let mut scores = vec![0.0; VOCAB];
        scores[7] = 5.0;
        Ok((NextTokenDistribution::new(scores), cache))
    }
}

/// Wraps a model and fails its `fail_on`-th call (1-based).
pub struct FailOnCall<M> {
    pub inner: M,
    pub fail_on: usize,
    pub calls: usize,
}

impl<M> FailOnCall<M> {
    pub fn new(inner: M, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            calls: 0,
        }
    }
}

impl<M: ModelInterface> ModelInterface for FailOnCall<M> {
    type Cache = M::Cache;

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        self.inner.encode(text)
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        self.inner.decode(token_id)
    }

    fn next_distribution(
        &mut self,
        input: &[u32],
        prior: Option<M::Cache>,
    ) -> Result<(NextTokenDistribution, M::Cache)> {
        self.calls += 1;
        if self.calls == self.fail_on {
            return Err(Error::Inference(format!("injected failure on call {}", self.calls)));
        }
        self.inner.next_distribution(input, prior)
    }
}

/// Returns fixed scores and a cache holding only the latest input.
pub struct ForgetfulModel {
    pub scores: Vec<f32>,
}

impl ModelInterface for ForgetfulModel {
    type Cache = HistoryCache;

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        encode_ascii(text)
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        decode_ascii(token_id)
    }

    fn next_distribution(
        &mut self,
        input: &[u32],
        _prior: Option<HistoryCache>,
    ) -> Result<(NextTokenDistribution, HistoryCache)> {
        let cache = HistoryCache {
            tokens: input.to_vec(),
        };
        Ok((NextTokenDistribution::new(self.scores.clone()), cache))
    }
}

/// One observed step.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedStep {
    pub strategy: Strategy,
    pub step_index: usize,
    pub fragment: String,
    pub input_tokens: usize,
    pub cache_positions: Option<usize>,
}

/// Observer that records every callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub starts: Vec<(Strategy, usize)>,
    pub steps: Vec<ObservedStep>,
}

impl DecodeObserver for RecordingObserver {
    fn on_start(&mut self, strategy: Strategy, prompt_tokens: usize) {
        self.starts.push((strategy, prompt_tokens));
    }

    fn on_step(&mut self, event: &StepEvent<'_>) {
        self.steps.push(ObservedStep {
            strategy: event.strategy,
            step_index: event.record.step_index,
            fragment: event.fragment.to_string(),
            input_tokens: event.input_tokens,
            cache_positions: event.cache_positions,
        });
    }
}
