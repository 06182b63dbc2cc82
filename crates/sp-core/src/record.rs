//! Normalized records and their identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// Separator between fields of a record line.
pub const FIELD_SEPARATOR: char = ';';

/// Stable identifier of a record: the block's nominal date plus a 1-based ordinal.
///
/// Displays as `YYYYMMDD_N`. The ordinal counts against the date marker, so an
/// entry that rolled over past midnight still carries the marker's date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId {
    date: NaiveDate,
    ordinal: u32,
}

impl RecordId {
    /// Creates an identifier. Ordinals start at 1.
    pub fn new(date: NaiveDate, ordinal: u32) -> Result<Self, ValidationError> {
        if ordinal == 0 {
            return Err(ValidationError::InvalidRecordId {
                value: format!("{}_0", date.format("%Y%m%d")),
            });
        }
        Ok(Self { date, ordinal })
    }

    /// Nominal date of the block this record belongs to.
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Renders `YYYYMMDD` followed by the ordinal padded to three digits.
    ///
    /// Padded ids sort lexicographically within a day for up to 999 entries.
    pub fn padded(&self) -> String {
        format!("{}{:03}", self.date.format("%Y%m%d"), self.ordinal)
    }

    /// Renders the identifier in the given style.
    pub fn render(&self, style: IdStyle) -> String {
        match style {
            IdStyle::Plain => self.to_string(),
            IdStyle::Padded => self.padded(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.date.format("%Y%m%d"), self.ordinal)
    }
}

impl FromStr for RecordId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidRecordId {
            value: s.to_string(),
        };
        let (date, ordinal) = s.split_once('_').ok_or_else(invalid)?;
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = date[..4].parse().map_err(|_| invalid())?;
        let month = date[4..6].parse().map_err(|_| invalid())?;
        let day = date[6..].parse().map_err(|_| invalid())?;
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
        let ordinal = ordinal.parse().map_err(|_| invalid())?;
        Self::new(date, ordinal).map_err(|_| invalid())
    }
}

impl TryFrom<String> for RecordId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

/// How a sink spells record identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStyle {
    /// `20251101_1`
    Plain,
    /// `20251101001`
    #[default]
    Padded,
}

impl IdStyle {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Padded => "padded",
        }
    }
}

impl fmt::Display for IdStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IdStyle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "padded" => Ok(Self::Padded),
            _ => Err(ValidationError::InvalidIdStyle {
                value: s.to_string(),
            }),
        }
    }
}

/// One normalized log entry. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: RecordId,
    pub description: String,
    /// Effective date and clock time at the configured offset, seconds zero.
    pub timestamp: DateTime<FixedOffset>,
}

impl NormalizedRecord {
    /// Renders the `ID;DESCRIPTION;TIMESTAMP` line form.
    pub fn to_line(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.id,
            self.description,
            format_timestamp(&self.timestamp),
            sep = FIELD_SEPARATOR
        )
    }
}

impl fmt::Display for NormalizedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

impl FromStr for NormalizedRecord {
    type Err = ValidationError;

    /// Parses a record line. The id is the first field and the timestamp the
    /// last, so descriptions may themselves contain separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let invalid = || ValidationError::InvalidRecordLine {
            value: line.to_string(),
        };
        let (id, rest) = line.split_once(FIELD_SEPARATOR).ok_or_else(invalid)?;
        let (description, timestamp) = rest.rsplit_once(FIELD_SEPARATOR).ok_or_else(invalid)?;

        let description = description.trim();
        if description.is_empty() {
            return Err(ValidationError::Empty {
                field: "description",
            });
        }

        Ok(Self {
            id: id.trim().parse()?,
            description: description.to_string(),
            timestamp: parse_timestamp(timestamp.trim())?,
        })
    }
}

/// Formats a timestamp as RFC 3339 with whole seconds (`2025-11-01T06:45:00-03:00`).
pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parses an RFC 3339 timestamp, keeping its offset.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, ValidationError> {
    DateTime::parse_from_rfc3339(value).map_err(|_| ValidationError::InvalidTimestamp {
        value: value.to_string(),
    })
}
