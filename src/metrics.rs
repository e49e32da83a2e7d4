//! Conversion between the computation's `name: value` stdout lines and [`Metrics`].

use std::fmt::Write as _;

use crate::error::ParseError;
use crate::shipment::Metrics;

/// Selects the metric lines from raw computation stdout.
///
/// The text after the last newline is an end marker and is discarded, as are
/// blank lines. Trailing carriage returns are stripped.
pub fn metric_lines(stdout: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = stdout.split('\n').collect();
    lines.pop();
    lines
        .into_iter()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Parses `name: value` lines into a mapping. Later duplicates overwrite earlier ones.
///
/// Fails on the first line without a colon, with an empty name, or whose value
/// is not a float. Nothing is returned on failure.
pub fn parse<'a, I>(lines: I) -> Result<Metrics, ParseError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut metrics = Metrics::new();

    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        let Some((name, value)) = line.split_once(':') else {
            return Err(ParseError::Malformed {
                line_no,
                line: line.to_string(),
            });
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::Malformed {
                line_no,
                line: line.to_string(),
            });
        }

        let value = value.trim();
        let parsed = value.parse::<f64>().map_err(|_| ParseError::InvalidValue {
            line_no,
            value: value.to_string(),
        })?;

        metrics.insert(name.to_string(), parsed);
    }

    Ok(metrics)
}

/// Renders metrics in the same line format [`parse`] reads.
///
/// Names containing `:` or with leading or trailing whitespace do not survive
/// a trip back through [`parse`]: the first colon splits the line and both
/// sides are trimmed. The computation never emits such names.
pub fn format(metrics: &Metrics) -> String {
    let mut out = String::new();
    for (name, value) in metrics {
        let _ = writeln!(out, "{name}: {value}");
    }
    out
}
