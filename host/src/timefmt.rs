//! fixed-timezone rendering of backend timestamps.
//!
//! the backend mixes epoch seconds, epoch milliseconds (device details) and
//! ISO-8601 strings (update history). everything is shown in one configured
//! zone, Europe/Berlin unless told otherwise.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// epoch values at or above this are treated as milliseconds.
/// 1e11 seconds is in the year 5138, 1e11 ms is March 1973.
pub const MILLIS_THRESHOLD: f64 = 1e11;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const MINUTE_FORMAT: &str = "%H:%M";
pub const FULL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    tz: Tz,
}

impl Default for LocalClock {
    fn default() -> Self {
        Self { tz: chrono_tz::Europe::Berlin }
    }
}

impl LocalClock {
    pub fn from_name(name: &str) -> Result<Self> {
        let tz = name
            .parse::<Tz>()
            .map_err(|_| anyhow!("unknown timezone: {}", name))?;
        Ok(Self { tz })
    }

    /// `("YYYY-MM-DD", "HH:MM")` for an epoch in seconds or milliseconds.
    pub fn split(&self, epoch: f64) -> Option<(String, String)> {
        let local = normalize_epoch(epoch)?.with_timezone(&self.tz);
        Some((
            local.format(DATE_FORMAT).to_string(),
            local.format(MINUTE_FORMAT).to_string(),
        ))
    }

    /// `"YYYY-MM-DD HH:MM:SS"` for an epoch in seconds or milliseconds.
    pub fn full(&self, epoch: f64) -> Option<String> {
        let local = normalize_epoch(epoch)?.with_timezone(&self.tz);
        Some(local.format(FULL_FORMAT).to_string())
    }

    /// `"YYYY-MM-DD HH:MM"`, the form used on the device details sheet.
    pub fn minutes(&self, epoch: f64) -> Option<String> {
        self.split(epoch).map(|(d, t)| format!("{} {}", d, t))
    }

    /// converts `2024-05-01T10:00:00.000Z` style strings.
    pub fn iso_to_local(&self, iso: &str) -> Result<String> {
        let parsed = DateTime::parse_from_rfc3339(iso.trim())
            .with_context(|| format!("not an ISO-8601 timestamp: {}", iso))?;
        Ok(parsed.with_timezone(&self.tz).format(FULL_FORMAT).to_string())
    }
}

/// interpret a raw epoch, picking seconds or milliseconds by magnitude
pub fn normalize_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }
    if epoch.abs() >= MILLIS_THRESHOLD {
        return DateTime::from_timestamp_millis(epoch.round() as i64);
    }
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// numbers and numeric strings count as epochs; everything else doesn't
pub fn epoch_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summer_time_offset() {
        let clock = LocalClock::default();
        let (date, time) = clock.split(1_719_835_200.0).unwrap();
        assert_eq!(date, "2024-07-01");
        assert_eq!(time, "14:00");
    }

    #[test]
    fn test_winter_time_offset() {
        let clock = LocalClock::default();
        assert_eq!(clock.full(1_704_110_400.0).unwrap(), "2024-01-01 13:00:00");
    }

    #[test]
    fn test_millis_and_seconds_agree() {
        let clock = LocalClock::default();
        assert_eq!(clock.split(1_719_835_200.0), clock.split(1_719_835_200_000.0));
        assert_eq!(clock.minutes(1_719_835_200_000.0).unwrap(), "2024-07-01 14:00");
    }

    #[test]
    fn test_iso_conversion() {
        let clock = LocalClock::default();
        assert_eq!(
            clock.iso_to_local("2024-03-31T01:30:00.000Z").unwrap(),
            "2024-03-31 03:30:00"
        );
        assert!(clock.iso_to_local("yesterday").is_err());
    }

    #[test]
    fn test_epoch_from_value() {
        assert_eq!(epoch_from_value(&json!(12)), Some(12.0));
        assert_eq!(epoch_from_value(&json!(" 1700000000 ")), Some(1_700_000_000.0));
        assert_eq!(epoch_from_value(&json!("n/a")), None);
        assert_eq!(epoch_from_value(&json!(null)), None);
    }

    #[test]
    fn test_other_timezone() {
        let clock = LocalClock::from_name("UTC").unwrap();
        assert_eq!(clock.full(1_704_110_400.0).unwrap(), "2024-01-01 12:00:00");
        assert!(LocalClock::from_name("Mars/Olympus").is_err());
    }
}
