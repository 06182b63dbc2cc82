//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Hour or minute outside the wall clock.
    #[error("clock time out of range: {hour}h{minute:02}")]
    ClockOutOfRange { hour: u32, minute: u32 },

    /// A record identifier that is not `YYYYMMDD_N`.
    #[error("invalid record id: {value}")]
    InvalidRecordId { value: String },

    /// A record line that is not `ID;DESCRIPTION;TIMESTAMP`.
    #[error("invalid record line: {value}")]
    InvalidRecordLine { value: String },

    /// A timestamp that is not RFC 3339.
    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    /// Unknown identifier style name.
    #[error("invalid id style: {value}")]
    InvalidIdStyle { value: String },
}

/// A wall-clock time of day with minute precision.
///
/// Carries no date; tasks are parsed independently of any date context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "ClockParts", into = "ClockParts")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

#[derive(Serialize, Deserialize)]
struct ClockParts {
    hour: u32,
    minute: u32,
}

impl ClockTime {
    /// Creates a clock time, rejecting hours above 23 and minutes above 59.
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        match (u8::try_from(hour), u8::try_from(minute)) {
            (Ok(h), Ok(m)) if h < 24 && m < 60 => Ok(Self { hour: h, minute: m }),
            _ => Err(ValidationError::ClockOutOfRange { hour, minute }),
        }
    }

    #[must_use]
    pub fn hour(self) -> u32 {
        u32::from(self.hour)
    }

    #[must_use]
    pub fn minute(self) -> u32 {
        u32::from(self.minute)
    }

    /// Minutes elapsed since midnight (0..1440).
    #[must_use]
    pub fn minutes_since_midnight(self) -> u32 {
        self.hour() * 60 + self.minute()
    }
}

impl TryFrom<ClockParts> for ClockTime {
    type Error = ValidationError;

    fn try_from(parts: ClockParts) -> Result<Self, Self::Error> {
        Self::new(parts.hour, parts.minute)
    }
}

impl From<ClockTime> for ClockParts {
    fn from(clock: ClockTime) -> Self {
        Self {
            hour: clock.hour(),
            minute: clock.minute(),
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_time_accepts_wall_clock_bounds() {
        assert!(ClockTime::new(0, 0).is_ok());
        assert!(ClockTime::new(23, 59).is_ok());
    }

    #[test]
    fn clock_time_rejects_out_of_range() {
        assert_eq!(
            ClockTime::new(24, 0),
            Err(ValidationError::ClockOutOfRange { hour: 24, minute: 0 })
        );
        assert!(ClockTime::new(9, 60).is_err());
        assert!(ClockTime::new(300, 0).is_err());
    }

    #[test]
    fn clock_time_display_is_zero_padded() {
        let clock = ClockTime::new(6, 5).unwrap();
        assert_eq!(clock.to_string(), "06:05");
        assert_eq!(clock.minutes_since_midnight(), 365);
    }

    #[test]
    fn clock_time_deserialize_validates() {
        let ok: ClockTime = serde_json::from_str(r#"{"hour":23,"minute":50}"#).unwrap();
        assert_eq!(ok.minutes_since_midnight(), 1430);

        let err: Result<ClockTime, _> = serde_json::from_str(r#"{"hour":25,"minute":0}"#);
        assert!(err.is_err());
    }

    #[test]
    fn validation_error_messages() {
        let err = ValidationError::Empty {
            field: "description",
        };
        assert_eq!(err.to_string(), "description cannot be empty");

        let err = ValidationError::ClockOutOfRange { hour: 25, minute: 7 };
        assert_eq!(err.to_string(), "clock time out of range: 25h07");
    }
}
