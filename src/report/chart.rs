//! ASCII chart primitives for the terminal report.

/// Width of the longest bar in a chart.
pub const BAR_WIDTH: usize = 40;

/// Horizontal bar for `value` on a `[0, max]` scale.
///
/// # Arguments
///
/// * `value` - Value to draw
/// * `max` - Value drawn as a full bar
/// * `width` - Bar width in characters
/// * `fill` - Character used for the filled part
pub fn hbar(value: f64, max: f64, width: usize, fill: char) -> String {
    let pct = if max > 0.0 && value.is_finite() {
        (value / max).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (pct * width as f64).round() as usize;
    let empty = width - filled;
    format!("{}{}", fill.to_string().repeat(filled), "░".repeat(empty))
}

/// Titled section header.
pub fn section_header(title: &str, width: usize) -> String {
    let title_part = format!(" {title} ");
    let remaining = width.saturating_sub(2 + title_part.chars().count());
    format!("┌─{title_part}{}┐", "─".repeat(remaining.saturating_sub(1)))
}

/// Chart of one series per strategy, two rows per step.
///
/// Rows read `step │ label bar value unit`. Both series share one scale so
/// bar lengths compare directly.
pub fn paired_series_chart(
    title: &str,
    series: [(&str, char, &[f64]); 2],
    unit: &str,
    precision: usize,
) -> String {
    let max = series
        .iter()
        .flat_map(|(_, _, values)| values.iter().copied())
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    let steps = series.iter().map(|(_, _, v)| v.len()).max().unwrap_or(0);
    let label_width = series.iter().map(|(l, _, _)| l.len()).max().unwrap_or(0);

    let mut lines = vec![section_header(title, BAR_WIDTH + label_width + 24)];
    for step in 0..steps {
        for (i, (label, fill, values)) in series.iter().enumerate() {
            let Some(value) = values.get(step) else {
                continue;
            };
            let index = if i == 0 {
                format!("{step:>4}")
            } else {
                " ".repeat(4)
            };
            lines.push(format!(
                "{index} │ {label:label_width$} {} {value:.precision$}{unit}",
                hbar(*value, max, BAR_WIDTH, *fill)
            ));
        }
    }
    lines.push(format!("└{}", "─".repeat(BAR_WIDTH + label_width + 22)));
    lines.join("\n")
}
