//! Decoding engine.
//!
//! This module contains:
//! - GenerationEngine, the single entry point for a generation run
//! - The two decoding strategies (stateless recompute, cached incremental)
//! - Greedy token selection
//! - Telemetry capture and the capabilities it reads from
//!
//! ## Strategies
//!
//! ```text
//!            Stateless                          Cached
//!  step 0:  encode(prompt)      ─► model     encode(prompt) ─► model ─► cache[n]
//!  step 1:  encode(prompt+t0)   ─► model     [t0] + cache[n]   ─► model ─► cache[n+1]
//!  step 2:  encode(prompt+t0t1) ─► model     [t1] + cache[n+1] ─► model ─► cache[n+2]
//!           O(n + i) tokens per step         1 token per step
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod cached;
pub mod generator;
pub mod observer;
pub mod sampler;
pub mod stateless;
pub mod telemetry;

pub use generator::GenerationEngine;
pub use observer::{DecodeObserver, SilentObserver, StepEvent, TracingObserver};
pub use sampler::{GreedySampler, NextTokenDistribution, Selection};
pub use telemetry::{Clock, MemorySampler, ProcessMemory, StepRecord, SystemClock, TelemetryTrace};

/// Decoding strategy for a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Re-encode and recompute the full sequence every step.
    Stateless,
    /// Feed only the newest token and reuse the KV cache.
    Cached,
}

impl Strategy {
    /// Both strategies, in the order the benchmark runs them.
    pub const ALL: [Strategy; 2] = [Strategy::Stateless, Strategy::Cached];

    /// Returns the strategy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stateless => "stateless",
            Self::Cached => "cached",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stateless" => Ok(Self::Stateless),
            "cached" => Ok(Self::Cached),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// Output of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Prompt followed by every generated fragment.
    pub text: String,
    /// One record per step.
    pub trace: TelemetryTrace,
}
