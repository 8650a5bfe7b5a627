//! Generation engine.
//!
//! Owns the model and the telemetry capabilities and runs one strategy per
//! call. A failed step aborts the run: the error is returned unchanged and
//! the partial text and trace are dropped.

use std::time::Duration;

use tracing::info;

use super::observer::{DecodeObserver, SilentObserver, StepEvent};
use super::sampler::{GreedySampler, Selection};
use super::telemetry::{Clock, MemorySampler, ProcessMemory, SystemClock, TelemetryTrace};
use super::{GenerationResult, Strategy};
use crate::error::{Error, Result};
use crate::model::interface::ModelInterface;

/// Runs greedy generation with either strategy over one model.
pub struct GenerationEngine<M, C = SystemClock, R = ProcessMemory> {
    pub(super) model: M,
    pub(super) clock: C,
    pub(super) memory: R,
    pub(super) sampler: GreedySampler,
}

impl<M: ModelInterface> GenerationEngine<M> {
    /// Creates an engine reading the wall clock and process memory.
    pub fn new(model: M) -> Self {
        Self::with_capabilities(model, SystemClock::new(), ProcessMemory)
    }
}

impl<M, C, R> GenerationEngine<M, C, R>
where
    M: ModelInterface,
    C: Clock,
    R: MemorySampler,
{
    /// Creates an engine with explicit time and memory sources.
    pub fn with_capabilities(model: M, clock: C, memory: R) -> Self {
        Self {
            model,
            clock,
            memory,
            sampler: GreedySampler,
        }
    }

    /// Generates `step_budget` tokens after `prompt`.
    ///
    /// A zero budget returns the prompt unchanged with an empty trace, without
    /// touching the model.
    pub fn generate(
        &mut self,
        prompt: &str,
        step_budget: usize,
        strategy: Strategy,
    ) -> Result<GenerationResult> {
        self.generate_with_observer(prompt, step_budget, strategy, &mut SilentObserver)
    }

    /// Like [`generate`](Self::generate), reporting each step to `observer`.
    pub fn generate_with_observer(
        &mut self,
        prompt: &str,
        step_budget: usize,
        strategy: Strategy,
        observer: &mut dyn DecodeObserver,
    ) -> Result<GenerationResult> {
        if step_budget == 0 {
            return Ok(GenerationResult {
                text: prompt.to_string(),
                trace: TelemetryTrace::default(),
            });
        }

        let result = match strategy {
            Strategy::Stateless => self.run_stateless(prompt, step_budget, observer)?,
            Strategy::Cached => self.run_cached(prompt, step_budget, observer)?,
        };

        info!(
            %strategy,
            steps = result.trace.len(),
            total_ms = result.trace.total_seconds() * 1e3,
            "generation finished"
        );
        Ok(result)
    }

    /// Returns the wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consumes the engine, returning the model.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Encodes `text`, rejecting empty encodings.
    pub(super) fn encode_nonempty(&self, text: &str) -> Result<Vec<u32>> {
        let tokens = self.model.encode(text)?;
        if tokens.is_empty() {
            return Err(Error::Encoding(format!("'{text}' encodes to zero tokens")));
        }
        Ok(tokens)
    }

    /// Time since `start`, clamped at zero for clocks that step backwards.
    pub(super) fn elapsed_since(&self, start: Duration) -> Duration {
        self.clock.now().saturating_sub(start)
    }

    /// Decodes the selection, appends it to `text`, samples memory and
    /// records the step.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn finish_step(
        &self,
        strategy: Strategy,
        start: Duration,
        selection: Selection,
        input_tokens: usize,
        cache_positions: Option<usize>,
        text: &mut String,
        trace: &mut TelemetryTrace,
        observer: &mut dyn DecodeObserver,
    ) -> Result<()> {
        let fragment = self.model.decode(selection.token_id)?;
        text.push_str(&fragment);

        let elapsed = self.elapsed_since(start);
        let memory_mb = self.memory.resident_memory_mb();
        let record = trace.push(elapsed, memory_mb, selection.score, selection.token_id);

        observer.on_step(&StepEvent {
            strategy,
            record,
            fragment: &fragment,
            input_tokens,
            cache_positions,
        });
        Ok(())
    }
}
