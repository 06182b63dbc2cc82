//! Line classification for the daily activity log.
//!
//! Every input line is one of three things:
//!
//! - a date marker (`01/11/2025`) opening a new day block,
//! - a task entry (`+ Lunch   12h30 +15`),
//! - noise, which the sequencer ignores.
//!
//! Classification is a pure function of the line text. Date context is
//! applied later by the [`Sequencer`](crate::Sequencer).

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::ClockTime;

/// Prefix that marks a task line once surrounding whitespace is trimmed.
pub const TASK_MARKER: &str = "+ ";

/// Strict `DD/MM/YYYY` with nothing else on the line.
static DATE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{2})/([0-9]{2})/([0-9]{4})$").unwrap());

/// Time token (`9h`, `9h5`, `16h30`) with an optional `+N` duration after it.
static TIME_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{1,2})h([0-9]{0,2})\s*(?:\+([0-9]+))?").unwrap());

/// A classified input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Start of a new day block.
    DateMarker(NaiveDate),
    /// One logged activity.
    Task(TaskEntry),
    /// Anything the sequencer should skip.
    Noise(NoiseKind),
}

/// One logged activity, without any date attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    /// Free text before the time token, trimmed.
    pub description: String,
    /// Clock time of the entry.
    pub clock: ClockTime,
    /// Trailing `+N` annotation. Parsed but never written to records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

/// Why a line was classified as noise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoiseKind {
    /// Empty or whitespace only.
    Blank,
    /// Text without the task marker.
    Untagged,
    /// Task marker present but no time token.
    MissingTime,
    /// Time token found with nothing before it.
    MissingDescription,
    /// Time token whose hour or minute is off the clock (`25h`, `7h75`).
    InvalidClock { hour: u32, minute: u32 },
    /// `DD/MM/YYYY` shaped but not a calendar date.
    MalformedDate { text: String },
}

impl NoiseKind {
    /// Whether the line carried the task marker and was rejected while parsing it.
    pub const fn is_unparsable_task(&self) -> bool {
        matches!(
            self,
            Self::MissingTime | Self::MissingDescription | Self::InvalidClock { .. }
        )
    }
}

/// Classifies a single raw line.
pub fn classify_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Noise(NoiseKind::Blank);
    }

    if let Some(caps) = DATE_MARKER_RE.captures(line) {
        return parse_date_marker(&caps[1], &caps[2], &caps[3]).map_or_else(
            || {
                Line::Noise(NoiseKind::MalformedDate {
                    text: line.to_string(),
                })
            },
            Line::DateMarker,
        );
    }

    let Some(content) = line.strip_prefix(TASK_MARKER) else {
        return Line::Noise(NoiseKind::Untagged);
    };

    match parse_task(content) {
        Ok(entry) => Line::Task(entry),
        Err(kind) => Line::Noise(kind),
    }
}

fn parse_date_marker(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let day = day.parse().ok()?;
    let month = month.parse().ok()?;
    let year = year.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_task(content: &str) -> Result<TaskEntry, NoiseKind> {
    let caps = TIME_TOKEN_RE
        .captures(content)
        .ok_or(NoiseKind::MissingTime)?;
    let token = caps.get(0).ok_or(NoiseKind::MissingTime)?;

    let hour: u32 = caps[1].parse().map_err(|_| NoiseKind::MissingTime)?;
    let minute: u32 = match &caps[2] {
        "" => 0,
        digits => digits.parse().map_err(|_| NoiseKind::MissingTime)?,
    };
    let clock =
        ClockTime::new(hour, minute).map_err(|_| NoiseKind::InvalidClock { hour, minute })?;

    let description = content[..token.start()].trim();
    if description.is_empty() {
        return Err(NoiseKind::MissingDescription);
    }

    Ok(TaskEntry {
        description: description.to_string(),
        clock,
        duration_minutes: caps.get(3).and_then(|m| m.as_str().parse().ok()),
    })
}
