//! Duration parsing utilities for human-readable durations like "5s", "400ms".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a duration string like "400ms", "5s", "2m", "1h".
///
/// Supported units:
/// - `ms` - milliseconds
/// - `s` - seconds
/// - `m` - minutes
/// - `h` - hours
/// - `d` - days (24 hours)
///
/// The input is case-insensitive and whitespace is trimmed.
///
/// # Examples
///
/// ```
/// use stripe_receipts::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("400ms").unwrap(), Duration::from_millis(400));
/// assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(2 * 60));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    // "ms" must be checked before "m" and "s".
    let (num, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = s.strip_suffix('d') {
        (num, "d")
    } else if let Some(num) = s.strip_suffix('h') {
        (num, "h")
    } else if let Some(num) = s.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = s.strip_suffix('s') {
        (num, "s")
    } else {
        anyhow::bail!("Duration must end with ms, s, m, h, or d");
    };

    let num: u64 = num
        .trim()
        .parse()
        .with_context(|| "Invalid number in duration")?;

    let duration = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => Duration::from_secs(num.checked_mul(60).context("Duration is too large")?),
        "h" => Duration::from_secs(
            num.checked_mul(60 * 60)
                .context("Duration is too large")?,
        ),
        "d" => Duration::from_secs(
            num.checked_mul(24 * 60 * 60)
                .context("Duration is too large")?,
        ),
        _ => unreachable!(),
    };

    Ok(duration)
}

/// Format a duration using the largest unit that divides it evenly.
///
/// ```
/// use stripe_receipts::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(400)), "400ms");
/// assert_eq!(format_duration(Duration::from_secs(5)), "5s");
/// assert_eq!(format_duration(Duration::from_secs(120)), "2m");
/// ```
pub fn format_duration(d: Duration) -> String {
    const SECS_PER_HOUR: u64 = 60 * 60;
    const SECS_PER_MINUTE: u64 = 60;

    if d.subsec_millis() != 0 {
        return format!("{}ms", d.as_millis());
    }

    let secs = d.as_secs();
    if secs >= SECS_PER_HOUR && secs.is_multiple_of(SECS_PER_HOUR) {
        format!("{}h", secs / SECS_PER_HOUR)
    } else if secs >= SECS_PER_MINUTE && secs.is_multiple_of(SECS_PER_MINUTE) {
        format!("{}m", secs / SECS_PER_MINUTE)
    } else {
        format!("{secs}s")
    }
}

/// Serde deserializer for duration strings.
///
/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// clap `value_parser` adapter.
pub fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}
