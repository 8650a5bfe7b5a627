//! Cached strategy: feed one new token per step and reuse the KV cache.
//!
//! The prompt is encoded once and prefilled on step 0. Every later step
//! passes only the previously selected token together with the cache, so a
//! step costs a constant number of input tokens and the run is linear in the
//! step budget.
//!
//! Cache lifecycle within one run:
//!
//! ```text
//! None ──step 0──► cache[n] ──step 1──► cache[n+1] ── … ──► cache[n+N-1] ──► dropped
//! ```

use super::generator::GenerationEngine;
use super::observer::DecodeObserver;
use super::telemetry::{Clock, MemorySampler, TelemetryTrace};
use super::{GenerationResult, Strategy};
use crate::error::{Error, Result};
use crate::model::interface::{CacheState, ModelInterface};

impl<M, C, R> GenerationEngine<M, C, R>
where
    M: ModelInterface,
    C: Clock,
    R: MemorySampler,
{
    pub(super) fn run_cached(
        &mut self,
        prompt: &str,
        step_budget: usize,
        observer: &mut dyn DecodeObserver,
    ) -> Result<GenerationResult> {
        let mut text = prompt.to_string();
        let mut trace = TelemetryTrace::with_capacity(step_budget);

        let mut pending = self.encode_nonempty(prompt)?;
        let prompt_len = pending.len();
        observer.on_start(Strategy::Cached, prompt_len);

        let mut cache: Option<M::Cache> = None;

        for step in 0..step_budget {
            let start = self.clock.now();

            let (distribution, next_cache) = self.model.next_distribution(&pending, cache.take())?;
            let positions = next_cache.positions();
            if positions != prompt_len + step {
                return Err(Error::Inference(format!(
                    "cache holds {positions} positions after step {step}, expected {}",
                    prompt_len + step
                )));
            }
            cache = Some(next_cache);

            let selection = self.sampler.select(&distribution)?;
            let input_tokens = pending.len();
            pending.clear();
            pending.push(selection.token_id);

            self.finish_step(
                Strategy::Cached,
                start,
                selection,
                input_tokens,
                Some(positions),
                &mut text,
                &mut trace,
                observer,
            )?;
        }

        Ok(GenerationResult { text, trace })
    }
}
