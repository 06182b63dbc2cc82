//! Core domain logic for SkillPulse.
//!
//! This crate turns a free-form daily activity log into normalized records:
//! - Classification: date markers, task entries and noise
//! - Sequencing: per-day ordinals and midnight rollover inference
//! - Sinks: the storage seam and the fingerprint-based upload gate

pub mod classify;
mod fingerprint;
mod record;
mod sequence;
mod sink;
mod span;
mod types;

pub use classify::{Line, NoiseKind, TaskEntry, classify_line};
pub use fingerprint::Fingerprint;
pub use record::{
    IdStyle, NormalizedRecord, RecordId, format_timestamp, parse_timestamp,
};
pub use sequence::{
    DEFAULT_UTC_OFFSET_MINUTES, Diagnostic, DiagnosticKind, NormalizeError, NormalizeOptions,
    Normalization, ROLLOVER_THRESHOLD_MINUTES, Sequencer, normalize, normalize_reader,
};
pub use sink::{RecordSink, SyncOutcome, UploadReason, UploadState, sync_records};
pub use span::{TaskSpan, task_spans};
pub use types::{ClockTime, ValidationError};
