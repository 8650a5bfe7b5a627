//! Side-by-side comparison of a cached and a stateless run.

use std::path::Path;

use serde::Serialize;

use super::chart::paired_series_chart;
use crate::engine::TelemetryTrace;
use crate::error::{Error, Result};

/// Aggregate numbers for the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonSummary {
    /// Number of steps in each trace.
    pub steps: usize,
    /// Total stateless time, seconds.
    pub stateless_total_seconds: f64,
    /// Total cached time, seconds.
    pub cached_total_seconds: f64,
    /// `stateless_total / cached_total`; `None` if the cached run took no
    /// measurable time.
    pub speedup: Option<f64>,
    /// Peak sampled memory of the stateless run, MB.
    pub stateless_peak_memory_mb: f64,
    /// Peak sampled memory of the cached run, MB.
    pub cached_peak_memory_mb: f64,
}

/// One step of both runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub step_index: usize,
    pub cached_seconds: f64,
    pub stateless_seconds: f64,
    pub cached_cumulative_seconds: f64,
    pub stateless_cumulative_seconds: f64,
    pub cached_memory_mb: f64,
    pub stateless_memory_mb: f64,
}

/// Two traces of equal length and step indexing.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryComparison {
    cached: TelemetryTrace,
    stateless: TelemetryTrace,
}

impl TelemetryComparison {
    /// Pairs the traces, rejecting mismatched lengths or step indices.
    pub fn new(cached: TelemetryTrace, stateless: TelemetryTrace) -> Result<Self> {
        if cached.len() != stateless.len() {
            return Err(Error::Config(format!(
                "trace lengths differ: cached {} vs stateless {}",
                cached.len(),
                stateless.len()
            )));
        }
        for (i, (c, s)) in cached.records().iter().zip(stateless.records()).enumerate() {
            if c.step_index != i || s.step_index != i {
                return Err(Error::Config(format!(
                    "step {i} indexed as {} (cached) / {} (stateless)",
                    c.step_index, s.step_index
                )));
            }
        }
        Ok(Self { cached, stateless })
    }

    pub fn cached(&self) -> &TelemetryTrace {
        &self.cached
    }

    pub fn stateless(&self) -> &TelemetryTrace {
        &self.stateless
    }

    /// Per-step rows in step order.
    pub fn rows(&self) -> Vec<ComparisonRow> {
        let cached_cumulative = self.cached.cumulative_seconds();
        let stateless_cumulative = self.stateless.cumulative_seconds();
        self.cached
            .records()
            .iter()
            .zip(self.stateless.records())
            .zip(cached_cumulative.into_iter().zip(stateless_cumulative))
            .map(|((c, s), (c_cum, s_cum))| ComparisonRow {
                step_index: c.step_index,
                cached_seconds: c.elapsed_seconds,
                stateless_seconds: s.elapsed_seconds,
                cached_cumulative_seconds: c_cum,
                stateless_cumulative_seconds: s_cum,
                cached_memory_mb: c.resident_memory_mb,
                stateless_memory_mb: s.resident_memory_mb,
            })
            .collect()
    }

    /// `stateless_total / cached_total`, `None` when the cached total is zero.
    pub fn speedup(&self) -> Option<f64> {
        self.summary().speedup
    }

    /// Aggregates both traces.
    pub fn summary(&self) -> ComparisonSummary {
        let cached_total = self.cached.total_seconds();
        let stateless_total = self.stateless.total_seconds();
        ComparisonSummary {
            steps: self.cached.len(),
            stateless_total_seconds: stateless_total,
            cached_total_seconds: cached_total,
            speedup: (cached_total > 0.0).then(|| stateless_total / cached_total),
            stateless_peak_memory_mb: self.stateless.peak_memory_mb(),
            cached_peak_memory_mb: self.cached.peak_memory_mb(),
        }
    }

    /// Renders per-token time, cumulative time and memory charts followed by
    /// the summary.
    pub fn render(&self) -> String {
        let rows = self.rows();
        let column = |f: fn(&ComparisonRow) -> f64| -> Vec<f64> { rows.iter().map(f).collect() };

        let sections = [
            (
                "Token Generation Time",
                column(|r| r.cached_seconds),
                column(|r| r.stateless_seconds),
                "s",
                4,
            ),
            (
                "Cumulative Processing Time",
                column(|r| r.cached_cumulative_seconds),
                column(|r| r.stateless_cumulative_seconds),
                "s",
                4,
            ),
            (
                "Memory Usage",
                column(|r| r.cached_memory_mb),
                column(|r| r.stateless_memory_mb),
                " MB",
                1,
            ),
        ];

        let mut out: Vec<String> = sections
            .iter()
            .map(|(title, cached, stateless, unit, precision)| {
                paired_series_chart(
                    title,
                    [
                        ("cached", '▓', cached.as_slice()),
                        ("stateless", '█', stateless.as_slice()),
                    ],
                    unit,
                    *precision,
                )
            })
            .collect();

        let summary = self.summary();
        let speedup = summary
            .speedup
            .map(|s| format!("{s:.2}x"))
            .unwrap_or_else(|| "n/a".to_string());
        out.push(format!(
            "steps: {}  stateless: {:.4}s  cached: {:.4}s  speedup: {}\n\
             peak memory: stateless {:.1} MB, cached {:.1} MB",
            summary.steps,
            summary.stateless_total_seconds,
            summary.cached_total_seconds,
            speedup,
            summary.stateless_peak_memory_mb,
            summary.cached_peak_memory_mb,
        ));

        out.join("\n\n")
    }

    /// Writes both traces and the summary as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        #[derive(Serialize)]
        struct Report<'a> {
            summary: ComparisonSummary,
            rows: Vec<ComparisonRow>,
            cached: &'a TelemetryTrace,
            stateless: &'a TelemetryTrace,
        }

        let report = Report {
            summary: self.summary(),
            rows: self.rows(),
            cached: &self.cached,
            stateless: &self.stateless,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
