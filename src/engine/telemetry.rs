//! Per-step timing and memory telemetry.
//!
//! Time and memory are read through the [`Clock`] and [`MemorySampler`]
//! capabilities so tests can substitute deterministic stubs.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Snapshot of process resident memory.
pub trait MemorySampler {
    /// Current resident set size in megabytes.
    fn resident_memory_mb(&self) -> f64;
}

/// Samples this process's physical memory via the `memory-stats` crate.
///
/// Reports 0.0 on platforms where the OS query is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

impl MemorySampler for ProcessMemory {
    fn resident_memory_mb(&self) -> f64 {
        memory_stats::memory_stats()
            .map(|stats| stats.physical_mem as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0)
    }
}

/// Telemetry for one generation step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 0-based step index.
    pub step_index: usize,
    /// Wall time spent on the step, in seconds.
    pub elapsed_seconds: f64,
    /// Resident memory sampled after token selection, in MB.
    pub resident_memory_mb: f64,
    /// Score the model assigned to the selected token.
    pub selected_score: f32,
    /// Selected token id.
    pub token_id: u32,
}

/// Ordered per-step records of one generation run.
///
/// Only the engine can append; once handed out inside a
/// [`GenerationResult`](super::GenerationResult) the trace is read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryTrace {
    records: Vec<StepRecord>,
}

impl TelemetryTrace {
    pub(crate) fn with_capacity(steps: usize) -> Self {
        Self {
            records: Vec::with_capacity(steps),
        }
    }

    /// Appends the record for the next step, assigning its index.
    pub(crate) fn push(
        &mut self,
        elapsed: Duration,
        resident_memory_mb: f64,
        selected_score: f32,
        token_id: u32,
    ) -> &StepRecord {
        let step_index = self.records.len();
        self.records.push(StepRecord {
            step_index,
            elapsed_seconds: elapsed.as_secs_f64(),
            resident_memory_mb: resident_memory_mb.max(0.0),
            selected_score,
            token_id,
        });
        &self.records[step_index]
    }

    /// All records in step order.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, step_index: usize) -> Option<&StepRecord> {
        self.records.get(step_index)
    }

    /// Running total of step times.
    pub fn cumulative_seconds(&self) -> Vec<f64> {
        self.records
            .iter()
            .scan(0.0, |total, r| {
                *total += r.elapsed_seconds;
                Some(*total)
            })
            .collect()
    }

    /// Sum of all step times.
    pub fn total_seconds(&self) -> f64 {
        self.records.iter().map(|r| r.elapsed_seconds).sum()
    }

    /// Largest sampled resident memory, 0.0 for an empty trace.
    pub fn peak_memory_mb(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.resident_memory_mb)
            .fold(0.0, f64::max)
    }

    /// Selected token ids in step order.
    pub fn token_ids(&self) -> Vec<u32> {
        self.records.iter().map(|r| r.token_id).collect()
    }
}

impl From<Vec<StepRecord>> for TelemetryTrace {
    fn from(records: Vec<StepRecord>) -> Self {
        Self { records }
    }
}
