//! Human-readable TTL parsing.
//!
//! Cache lifetimes can be written as a bare number of seconds (`3600`), a
//! duration string with one or more unit suffixes (`90s`, `12h`, `1h30m`,
//! `2d`), or one of the switch words `off`, `false`, `disabled`, `none`.
//! A TTL that works out to zero disables caching.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The TTL applied when caching is switched on without an explicit lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

const UNITS: &[(&str, u64)] = &[
    ("ms", 1),
    ("s", 1_000),
    ("m", 60 * 1_000),
    ("h", 60 * 60 * 1_000),
    ("d", 24 * 60 * 60 * 1_000),
    ("w", 7 * 24 * 60 * 60 * 1_000),
];

/// A TTL as it appears in a document or configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TtlValue {
    Seconds(i64),
    Fractional(f64),
    Text(String),
}

/// Parses a TTL value into its duration and whether caching is enabled by it.
///
/// Zero and negative lifetimes, and the switch words, yield
/// `(Duration::ZERO, false)`.
pub fn parse_ttl(value: &TtlValue) -> Result<(Duration, bool)> {
    let duration = match value {
        TtlValue::Seconds(secs) if *secs <= 0 => Duration::ZERO,
        TtlValue::Seconds(secs) => Duration::from_secs(*secs as u64),
        TtlValue::Fractional(secs) if !secs.is_finite() => {
            return Err(ConfigError::InvalidDuration(secs.to_string()));
        }
        TtlValue::Fractional(secs) if *secs <= 0.0 => Duration::ZERO,
        TtlValue::Fractional(secs) => Duration::try_from_secs_f64(*secs)
            .map_err(|_| ConfigError::InvalidDuration(secs.to_string()))?,
        TtlValue::Text(text) => {
            let text = text.trim().to_ascii_lowercase();
            if matches!(text.as_str(), "off" | "false" | "disabled" | "none") {
                Duration::ZERO
            } else {
                parse_duration(&text)?
            }
        }
    };

    Ok((duration, !duration.is_zero()))
}

/// Parses a duration string such as `45s`, `12h` or `1h30m`.
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    let text = s.trim();
    if text.is_empty() {
        return Err(invalid());
    }

    if let Ok(secs) = text.parse::<f64>() {
        if !secs.is_finite() || secs < 0.0 {
            return Err(invalid());
        }
        return Duration::try_from_secs_f64(secs).map_err(|_| invalid());
    }

    let mut total_ms: f64 = 0.0;
    let mut rest = text;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(invalid());
        }
        let (num_str, after) = rest.split_at(num_end);
        let num: f64 = num_str.parse().map_err(|_| invalid())?;

        let unit_end = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, remaining) = after.split_at(unit_end);
        let multiplier = UNITS
            .iter()
            .find(|(name, _)| *name == unit.trim())
            .map(|(_, ms)| *ms)
            .ok_or_else(invalid)?;

        total_ms += num * multiplier as f64;
        rest = remaining;
    }

    if total_ms.round() > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_millis(total_ms.round() as u64))
}

/// Formats a duration using the largest units that divide it, e.g. `1h30m`.
pub fn format_duration(duration: Duration) -> String {
    let mut ms = duration.as_millis() as u64;
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (name, unit_ms) in UNITS.iter().rev() {
        // weeks read poorly for cache TTLs
        if *name == "w" {
            continue;
        }
        let count = ms / unit_ms;
        if count > 0 {
            out.push_str(&format!("{}{}", count, name));
            ms -= count * unit_ms;
        }
    }
    out
}
