//! Hooks for watching a generation run step by step.

use tracing::{debug, info};

use super::telemetry::StepRecord;
use super::Strategy;

/// What the engine knows after finishing one step.
#[derive(Debug, Clone, Copy)]
pub struct StepEvent<'a> {
    /// Strategy driving the run.
    pub strategy: Strategy,
    /// Telemetry just recorded for the step.
    pub record: &'a StepRecord,
    /// Text fragment appended this step.
    pub fragment: &'a str,
    /// Tokens fed to the model this step.
    pub input_tokens: usize,
    /// Positions held by the cache after the step; `None` when the strategy
    /// keeps no cache.
    pub cache_positions: Option<usize>,
}

/// Receives callbacks during generation. All methods default to no-ops.
pub trait DecodeObserver {
    /// Called once the prompt is known to be non-empty after encoding.
    fn on_start(&mut self, _strategy: Strategy, _prompt_tokens: usize) {}

    /// Called after each completed step, in step order.
    fn on_step(&mut self, _event: &StepEvent<'_>) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl DecodeObserver for SilentObserver {}

/// Observer that logs the run start and a `tracing` debug event per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn on_start(&mut self, strategy: Strategy, prompt_tokens: usize) {
        info!(strategy = %strategy, prompt_tokens, "generation started");
    }

    fn on_step(&mut self, event: &StepEvent<'_>) {
        debug!(
            strategy = %event.strategy,
            step = event.record.step_index,
            token = event.record.token_id,
            fragment = ?event.fragment,
            input_tokens = event.input_tokens,
            cache_positions = ?event.cache_positions,
            elapsed_ms = event.record.elapsed_seconds * 1e3,
            "step"
        );
    }
}
