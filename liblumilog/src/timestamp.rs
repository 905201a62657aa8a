use serde::{Deserialize, Serialize};
use std::fmt::Display;
use time::macros::{date, format_description};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use super::error::TimestampError;

/// The timestamp layouts understood by the normalizer. Each input source declares
/// its layout; nothing is auto-detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// `YYYY-MM-DD`, taken as midnight UTC
    #[default]
    DateOnly,
    /// `YYYY/MM/DD HH:MM:SS.ffffff`, taken as UTC
    DateTimeFraction,
}

impl Display for TimestampFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DateOnly => write!(f, "YYYY-MM-DD"),
            Self::DateTimeFraction => write!(f, "YYYY/MM/DD HH:MM:SS.ffffff"),
        }
    }
}

/// The fixed instant all timestamps are measured from.
///
/// Built once when the pipeline starts and handed to everything which needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceEpoch {
    unix_seconds: i64,
}

impl Default for ReferenceEpoch {
    /// 1 Jan 1995, 00:00:00 UTC
    fn default() -> Self {
        Self::from_date(date!(1995 - 01 - 01))
    }
}

impl ReferenceEpoch {
    pub fn from_date(date: Date) -> Self {
        Self {
            unix_seconds: date.midnight().assume_utc().unix_timestamp(),
        }
    }

    /// Parse the epoch from a `YYYY-MM-DD` string
    pub fn parse(text: &str) -> Result<Self, TimestampError> {
        Ok(Self::from_date(parse_date(text)?))
    }

    pub fn unix_seconds(&self) -> i64 {
        self.unix_seconds
    }
}

fn parse_date(text: &str) -> Result<Date, TimestampError> {
    Date::parse(text.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        TimestampError::Parse {
            text: text.to_string(),
            format: TimestampFormat::DateOnly,
        }
    })
}

fn parse_date_time(text: &str) -> Result<PrimitiveDateTime, TimestampError> {
    PrimitiveDateTime::parse(
        text.trim(),
        format_description!("[year]/[month]/[day] [hour]:[minute]:[second].[subsecond]"),
    )
    .map_err(|_| TimestampError::Parse {
        text: text.to_string(),
        format: TimestampFormat::DateTimeFraction,
    })
}

/// Converts timestamp strings to seconds since a ReferenceEpoch.
///
/// The format descriptions are static, so nothing is allocated per row. Fractional
/// seconds are truncated: the result is always a whole number of seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampNormalizer {
    epoch: ReferenceEpoch,
}

impl TimestampNormalizer {
    pub fn new(epoch: ReferenceEpoch) -> Self {
        Self { epoch }
    }

    pub fn epoch(&self) -> &ReferenceEpoch {
        &self.epoch
    }

    /// Seconds between the reference epoch and the given timestamp
    pub fn normalize(&self, text: &str, format: TimestampFormat) -> Result<f64, TimestampError> {
        let unix = match format {
            TimestampFormat::DateOnly => parse_date(text)?.midnight().assume_utc(),
            TimestampFormat::DateTimeFraction => parse_date_time(text)?.assume_utc(),
        }
        .unix_timestamp();
        Ok((unix - self.epoch.unix_seconds) as f64)
    }

    /// Render seconds since the epoch back into the given format
    pub fn format(&self, seconds: f64, format: TimestampFormat) -> Result<String, TimestampError> {
        if !seconds.is_finite() {
            return Err(TimestampError::OutOfRange(seconds));
        }
        let unix = self
            .epoch
            .unix_seconds
            .checked_add(seconds.trunc() as i64)
            .ok_or(TimestampError::OutOfRange(seconds))?;
        let instant = OffsetDateTime::from_unix_timestamp(unix)
            .map_err(|_| TimestampError::OutOfRange(seconds))?;
        let result = match format {
            TimestampFormat::DateOnly => instant
                .date()
                .format(format_description!("[year]-[month]-[day]")),
            TimestampFormat::DateTimeFraction => instant.format(format_description!(
                "[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:6]"
            )),
        };
        result.map_err(|e| TimestampError::Format(e.to_string()))
    }
}
