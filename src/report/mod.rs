//! Telemetry reporting.
//!
//! Renders a cached and a stateless trace side by side as terminal charts and
//! persists them as JSON. Purely a consumer of finished traces.

pub mod chart;
pub mod comparison;

pub use comparison::{ComparisonRow, ComparisonSummary, TelemetryComparison};
