// SPDX-License-Identifier: Apache-2.0
//! Display-format mini-language for host property values.
//!
//! The host renders numeric properties through small format patterns
//! (`"0"`, `"0.00"`, `"0.0%"`). This is a presentation concern, so it lives
//! here as a pure function and stays off the derivation path.

/// Renders `raw` through a host format `pattern`.
///
/// Supported patterns: `"0"` (truncate to integer), `"0.<zeros>"` (truncate
/// to that many decimals), and the same with a trailing `%` (scale by 100
/// first, append `%`). Truncation never rounds; the host truncates. Any other
/// pattern, and any `raw` that does not parse as a number, passes through
/// unchanged.
#[must_use]
pub fn apply_display_format(raw: &str, pattern: &str) -> String {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return raw.to_owned();
    }
    let (numeric_pattern, percent) = match trimmed.strip_suffix('%') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };
    let Some(decimals) = decimal_places(numeric_pattern) else {
        return raw.to_owned();
    };
    let Ok(mut value) = raw.trim().parse::<f64>() else {
        return raw.to_owned();
    };
    if percent {
        value *= 100.0;
    }
    let truncated = truncate(value, decimals);
    let body = format!("{truncated:.decimals$}");
    if percent {
        format!("{body}%")
    } else {
        body
    }
}

/// Parses a `0`/`0.00` style pattern into its decimal count; `None` when the
/// pattern is not part of the mini-language.
fn decimal_places(pattern: &str) -> Option<usize> {
    match pattern.split_once('.') {
        None => (pattern == "0").then_some(0),
        Some(("0", frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => {
            Some(frac.len())
        }
        Some(_) => None,
    }
}

fn truncate(value: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(i32::try_from(decimals).unwrap_or(0));
    (value * scale).trunc() / scale
}
