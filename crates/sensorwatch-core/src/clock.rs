//! # Display Clock
//!
//! Converts block timestamps (seconds since epoch) into the wall-clock
//! string shown next to each reading.
//!
//! The offset is fixed when the clock is built so that formatting is a pure
//! function of the timestamp. The application derives the offset from the
//! host's local time zone unless configured otherwise.

use crate::SensorError;
use crate::primitives::{DEFAULT_TIME_FORMAT, MAX_UTC_OFFSET_SECONDS};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::fmt::Write;

/// Formats block timestamps for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayClock {
    offset: FixedOffset,
    format: String,
}

impl DisplayClock {
    /// Build a clock with an explicit UTC offset and strftime format.
    pub fn new(utc_offset_seconds: i32, format: impl Into<String>) -> Result<Self, SensorError> {
        if utc_offset_seconds.unsigned_abs() > MAX_UTC_OFFSET_SECONDS.unsigned_abs() {
            return Err(SensorError::InvalidClock(format!(
                "UTC offset {}s out of range",
                utc_offset_seconds
            )));
        }
        let offset = FixedOffset::east_opt(utc_offset_seconds).ok_or_else(|| {
            SensorError::InvalidClock(format!("UTC offset {}s out of range", utc_offset_seconds))
        })?;

        let format = format.into();
        if format.is_empty() {
            return Err(SensorError::InvalidClock("empty time format".to_string()));
        }
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(SensorError::InvalidClock(format!(
                "invalid time format {:?}",
                format
            )));
        }

        Ok(Self { offset, format })
    }

    /// UTC clock with the default format.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
            format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// Offset from UTC in seconds.
    #[must_use]
    pub fn utc_offset_seconds(&self) -> i32 {
        self.offset.local_minus_utc()
    }

    /// The strftime format in use.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Format a timestamp; `None` when it is outside the representable range.
    #[must_use]
    pub fn format_timestamp(&self, epoch_seconds: i64) -> Option<String> {
        let utc = DateTime::from_timestamp(epoch_seconds, 0)?;
        let local = utc.with_timezone(&self.offset);
        let mut out = String::new();
        write!(out, "{}", local.format(&self.format)).ok()?;
        Some(out)
    }
}

impl Default for DisplayClock {
    fn default() -> Self {
        Self::utc()
    }
}

// =============================================================================
// TESTS
// =============================================================================
