//! Task spans: records paired with the time the next task started.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::record::{NormalizedRecord, RecordId};

/// A record with an end time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpan {
    pub id: RecordId,
    pub description: String,
    pub start: DateTime<FixedOffset>,
    /// Start of the following record, or `start` for the last one.
    pub end: DateTime<FixedOffset>,
}

/// Pairs each record with the start of the record after it.
pub fn task_spans(records: &[NormalizedRecord]) -> Vec<TaskSpan> {
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| TaskSpan {
            id: record.id,
            description: record.description.clone(),
            start: record.timestamp,
            end: records.get(idx + 1).map_or(record.timestamp, |next| next.timestamp),
        })
        .collect()
}
