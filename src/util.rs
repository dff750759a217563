// Utility helpers for parsing and basic statistics.
//
// This module centralizes the "dirty" CSV/number handling so the rest of
// the code can assume clean, typed values.
use crate::types::ValueStats;
use num_format::{Locale, ToFormattedString};

/// A cell that carries no value: missing, empty, or whitespace only.
pub fn is_blank(s: Option<&str>) -> bool {
    s.map_or(true, |s| s.trim().is_empty())
}

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports.
///
/// - Trims whitespace.
/// - Strips thousands separators like `","` before parsing.
/// - Accepts scientific notation (`1.2e-05`), which the frequency columns use.
/// - Returns `None` for blanks, text, and non-finite results.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer parse that also accepts a float with no fractional part (`"3.0"`),
/// since spreadsheet exports often write whole scores that way.
pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i32>() {
        return Some(v);
    }
    let f = parse_f64_safe(Some(s))?;
    if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}

/// Arithmetic mean; `None` for an empty slice so callers keep "no data"
/// distinct from zero.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

/// Linear interpolation between the two closest ranks of a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Summary statistics of `v`; `None` for an empty slice.
pub fn describe(v: &[f64]) -> Option<ValueStats> {
    let mean = mean(v)?;
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let std = if v.len() > 1 {
        let ss: f64 = v.iter().map(|x| (x - mean).powi(2)).sum();
        Some((ss / (v.len() - 1) as f64).sqrt())
    } else {
        None
    };
    Some(ValueStats {
        count: v.len(),
        mean,
        std,
        min: sorted[0],
        p25: quantile(&sorted, 0.25),
        p50: quantile(&sorted, 0.5),
        p75: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

/// Like `format_number` but renders a missing value as an empty cell.
pub fn format_optional(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_number(v, decimals)).unwrap_or_default()
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
