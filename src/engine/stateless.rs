//! Stateless strategy: recompute the full sequence every step.
//!
//! Each step re-encodes the whole text generated so far and evaluates the
//! model from scratch, so step `i` costs `O(prompt + i)` tokens and the run
//! is quadratic in the step budget.

use super::generator::GenerationEngine;
use super::observer::DecodeObserver;
use super::telemetry::{Clock, MemorySampler, TelemetryTrace};
use super::{GenerationResult, Strategy};
use crate::error::Result;
use crate::model::interface::ModelInterface;

impl<M, C, R> GenerationEngine<M, C, R>
where
    M: ModelInterface,
    C: Clock,
    R: MemorySampler,
{
    pub(super) fn run_stateless(
        &mut self,
        prompt: &str,
        step_budget: usize,
        observer: &mut dyn DecodeObserver,
    ) -> Result<GenerationResult> {
        let mut text = prompt.to_string();
        let mut trace = TelemetryTrace::with_capacity(step_budget);

        for step in 0..step_budget {
            let start = self.clock.now();

            let tokens = self.encode_nonempty(&text)?;
            if step == 0 {
                observer.on_start(Strategy::Stateless, tokens.len());
            }

            // Any cache the model builds is dropped here.
            let (distribution, _) = self.model.next_distribution(&tokens, None)?;
            let selection = self.sampler.select(&distribution)?;

            self.finish_step(
                Strategy::Stateless,
                start,
                selection,
                tokens.len(),
                None,
                &mut text,
                &mut trace,
                observer,
            )?;
        }

        Ok(GenerationResult { text, trace })
    }
}
