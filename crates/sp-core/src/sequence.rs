//! Sequencing and midnight rollover resolution.
//!
//! The [`Sequencer`] walks classified lines in input order and turns task
//! entries into [`NormalizedRecord`]s.
//!
//! # Block state
//!
//! Each date marker opens a block holding:
//!
//! - the nominal date (from the marker, used for ids),
//! - the effective date (used for timestamps),
//! - the ordinal counter,
//! - the clock minutes of the previous accepted entry.
//!
//! # Rollover
//!
//! When an entry's clock time is more than [`ROLLOVER_THRESHOLD_MINUTES`]
//! earlier than the previous entry's, the effective date advances one day.
//! The comparison uses raw clock minutes only, so it is independent of how
//! many rollovers the block has already seen. Ordinals keep counting against
//! the nominal date.

use std::fmt;
use std::io::BufRead;

use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::{Line, NoiseKind, TaskEntry, classify_line};
use crate::record::{NormalizedRecord, RecordId};
use crate::types::{ClockTime, ValidationError};

/// Backward clock movement, in minutes, that must be exceeded to infer a rollover.
pub const ROLLOVER_THRESHOLD_MINUTES: u32 = 360;

/// Default offset of emitted timestamps (UTC-03:00).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

/// Options for a normalization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Offset applied to every timestamp, in minutes east of UTC.
    /// Default: -180.
    pub utc_offset_minutes: i32,

    /// Fail the run when any line was dropped for a data-quality reason.
    /// Default: false (drop silently).
    pub strict: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            strict: false,
        }
    }
}

/// Why a line was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Task marker present but the entry could not be parsed.
    UnparsableLine,
    /// Task entry before any date marker.
    OrphanTaskEntry,
    /// `DD/MM/YYYY` shaped line that is not a calendar date.
    MalformedDateMarker,
}

impl DiagnosticKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnparsableLine => "unparsable line",
            Self::OrphanTaskEntry => "task before any date marker",
            Self::MalformedDateMarker => "malformed date marker",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dropped line, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 1-based line number in the input.
    pub line: usize,
    pub kind: DiagnosticKind,
    /// The line as it appeared, trimmed.
    pub text: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.kind, self.text)
    }
}

/// Errors from a normalization run.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Reading the input failed.
    #[error("failed to read line {line}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    /// The configured offset is not a valid UTC offset.
    #[error("invalid UTC offset: {minutes} minutes")]
    InvalidOffset { minutes: i32 },

    /// Advancing the effective date overflowed the calendar.
    #[error("cannot advance past {date}")]
    DateOverflow { date: NaiveDate },

    /// A date and clock time could not be placed at the offset.
    #[error("cannot build timestamp for {date} {clock}")]
    Timestamp { date: NaiveDate, clock: ClockTime },

    /// An identifier failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Strict mode saw dropped lines.
    #[error("{} line(s) rejected", .diagnostics.len())]
    Rejected { diagnostics: Vec<Diagnostic> },
}

/// Records and diagnostics produced by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalization {
    pub records: Vec<NormalizedRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// State of the block opened by the most recent date marker.
#[derive(Debug, Clone)]
struct Block {
    nominal: NaiveDate,
    effective: NaiveDate,
    ordinal: u32,
    previous_minutes: Option<u32>,
}

impl Block {
    const fn new(date: NaiveDate) -> Self {
        Self {
            nominal: date,
            effective: date,
            ordinal: 0,
            previous_minutes: None,
        }
    }

    fn accept(
        &mut self,
        entry: TaskEntry,
        offset: FixedOffset,
    ) -> Result<NormalizedRecord, NormalizeError> {
        let minutes = entry.clock.minutes_since_midnight();
        if self
            .previous_minutes
            .is_some_and(|previous| previous.saturating_sub(minutes) > ROLLOVER_THRESHOLD_MINUTES)
        {
            self.effective = self
                .effective
                .succ_opt()
                .ok_or(NormalizeError::DateOverflow {
                    date: self.effective,
                })?;
            tracing::debug!(
                nominal = %self.nominal,
                effective = %self.effective,
                clock = %entry.clock,
                "inferred midnight rollover"
            );
        }
        self.previous_minutes = Some(minutes);
        self.ordinal += 1;

        let id = RecordId::new(self.nominal, self.ordinal)?;
        let timestamp = NaiveTime::from_hms_opt(entry.clock.hour(), entry.clock.minute(), 0)
            .and_then(|time| {
                offset
                    .from_local_datetime(&self.effective.and_time(time))
                    .single()
            })
            .ok_or(NormalizeError::Timestamp {
                date: self.effective,
                clock: entry.clock,
            })?;

        Ok(NormalizedRecord {
            id,
            description: entry.description,
            timestamp,
        })
    }
}

/// Single-pass line sequencer.
///
/// Owns all state of one normalization run; create a new one per input.
#[derive(Debug, Clone)]
pub struct Sequencer {
    offset: FixedOffset,
    strict: bool,
    block: Option<Block>,
    line_number: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Sequencer {
    pub fn new(options: &NormalizeOptions) -> Result<Self, NormalizeError> {
        let offset = options
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(NormalizeError::InvalidOffset {
                minutes: options.utc_offset_minutes,
            })?;
        Ok(Self {
            offset,
            strict: options.strict,
            block: None,
            line_number: 0,
            diagnostics: Vec::new(),
        })
    }

    /// Feeds the next input line, returning the record it produced, if any.
    pub fn push_line(&mut self, raw: &str) -> Result<Option<NormalizedRecord>, NormalizeError> {
        self.line_number += 1;
        match classify_line(raw) {
            Line::DateMarker(date) => {
                tracing::debug!(line = self.line_number, %date, "date marker");
                self.block = Some(Block::new(date));
                Ok(None)
            }
            Line::Task(entry) => match self.block.as_mut() {
                Some(block) => block.accept(entry, self.offset).map(Some),
                None => {
                    self.drop_line(DiagnosticKind::OrphanTaskEntry, raw);
                    Ok(None)
                }
            },
            Line::Noise(NoiseKind::MalformedDate { .. }) => {
                self.drop_line(DiagnosticKind::MalformedDateMarker, raw);
                Ok(None)
            }
            Line::Noise(kind) => {
                if kind.is_unparsable_task() {
                    self.drop_line(DiagnosticKind::UnparsableLine, raw);
                }
                Ok(None)
            }
        }
    }

    /// Lines dropped so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Ends the run, returning the diagnostics.
    ///
    /// In strict mode any diagnostic turns into [`NormalizeError::Rejected`].
    pub fn finish(self) -> Result<Vec<Diagnostic>, NormalizeError> {
        if self.strict && !self.diagnostics.is_empty() {
            tracing::warn!(
                rejected = self.diagnostics.len(),
                "strict mode rejected input"
            );
            return Err(NormalizeError::Rejected {
                diagnostics: self.diagnostics,
            });
        }
        Ok(self.diagnostics)
    }

    fn drop_line(&mut self, kind: DiagnosticKind, raw: &str) {
        let text = raw.trim().to_string();
        tracing::debug!(line = self.line_number, %kind, %text, "dropped line");
        self.diagnostics.push(Diagnostic {
            line: self.line_number,
            kind,
            text,
        });
    }
}

/// Normalizes a fully materialized log.
pub fn normalize(input: &str, options: &NormalizeOptions) -> Result<Normalization, NormalizeError> {
    let mut sequencer = Sequencer::new(options)?;
    let mut records = Vec::new();
    for line in input.lines() {
        records.extend(sequencer.push_line(line)?);
    }
    finish(sequencer, records)
}

/// Normalizes a log streamed line by line.
pub fn normalize_reader<R: BufRead>(
    reader: R,
    options: &NormalizeOptions,
) -> Result<Normalization, NormalizeError> {
    let mut sequencer = Sequencer::new(options)?;
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| NormalizeError::Read {
            line: idx + 1,
            source,
        })?;
        records.extend(sequencer.push_line(&line)?);
    }
    finish(sequencer, records)
}

fn finish(
    sequencer: Sequencer,
    records: Vec<NormalizedRecord>,
) -> Result<Normalization, NormalizeError> {
    let diagnostics = sequencer.finish()?;
    tracing::info!(
        records = records.len(),
        dropped = diagnostics.len(),
        "normalized log"
    );
    Ok(Normalization {
        records,
        diagnostics,
    })
}
