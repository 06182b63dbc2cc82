//! Record sinks and the upload gate.
//!
//! A sink is any durable store that accepts task spans keyed by record id and
//! remembers which input it last received. [`sync_records`] decides whether an
//! upload is needed at all:
//!
//! 1. An empty sink always receives an upload.
//! 2. A sink whose stored fingerprint matches the input is skipped.
//! 3. Otherwise every span is upserted and the upload state replaced in one
//!    [`RecordSink::put_all`] batch.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::record::{NormalizedRecord, RecordId};
use crate::span::{TaskSpan, task_spans};

/// What the sink remembers about its last upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadState {
    pub fingerprint: Fingerprint,
    pub uploaded_at: DateTime<Utc>,
    pub task_count: usize,
}

/// A durable destination for task spans.
pub trait RecordSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts or replaces the span stored under its id.
    fn put(&mut self, span: &TaskSpan, uploaded_at: DateTime<Utc>) -> Result<(), Self::Error>;

    /// Whether a span is stored under `id`.
    fn exists(&self, id: &RecordId) -> Result<bool, Self::Error>;

    /// Whether the sink holds no spans at all.
    fn is_empty(&self) -> Result<bool, Self::Error>;

    /// State recorded by the last successful upload.
    fn upload_state(&self) -> Result<Option<UploadState>, Self::Error>;

    /// Replaces the stored upload state.
    fn store_upload_state(&mut self, state: &UploadState) -> Result<(), Self::Error>;

    /// Stores a whole upload: every span, then `state`.
    ///
    /// The default writes one span at a time. Sinks with transactions override
    /// it so a failed upload leaves no spans and no state behind.
    fn put_all(&mut self, spans: &[TaskSpan], state: &UploadState) -> Result<(), Self::Error> {
        for span in spans {
            self.put(span, state.uploaded_at)?;
        }
        self.store_upload_state(state)
    }
}

/// Why an upload went ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadReason {
    /// Requested regardless of the stored fingerprint.
    Forced,
    /// The sink held no spans.
    EmptySink,
    /// Spans exist but no upload state was ever stored.
    NoUploadState,
    /// The input changed since the last upload.
    FingerprintChanged,
}

impl fmt::Display for UploadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Forced => "forced",
            Self::EmptySink => "store is empty",
            Self::NoUploadState => "no previous upload",
            Self::FingerprintChanged => "input changed",
        };
        write!(f, "{s}")
    }
}

/// Result of [`sync_records`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The stored fingerprint matched; nothing was written.
    Skipped { fingerprint: Fingerprint },
    /// Every span was written.
    Uploaded {
        reason: UploadReason,
        /// Spans written.
        written: usize,
        /// Spans whose id was not stored before.
        inserted: usize,
    },
}

/// Uploads `records` to `sink` unless the sink already holds this input.
pub fn sync_records<S: RecordSink>(
    sink: &mut S,
    records: &[NormalizedRecord],
    fingerprint: &Fingerprint,
    now: DateTime<Utc>,
    force: bool,
) -> Result<SyncOutcome, S::Error> {
    let reason = if force {
        UploadReason::Forced
    } else if sink.is_empty()? {
        UploadReason::EmptySink
    } else {
        match sink.upload_state()? {
            Some(state) if state.fingerprint == *fingerprint => {
                tracing::info!(fingerprint = %fingerprint.short(), "input unchanged, skipping upload");
                return Ok(SyncOutcome::Skipped {
                    fingerprint: fingerprint.clone(),
                });
            }
            Some(_) => UploadReason::FingerprintChanged,
            None => UploadReason::NoUploadState,
        }
    };

    let spans = task_spans(records);
    let mut inserted = 0;
    for span in &spans {
        if !sink.exists(&span.id)? {
            inserted += 1;
        }
    }

    let state = UploadState {
        fingerprint: fingerprint.clone(),
        uploaded_at: now,
        task_count: spans.len(),
    };
    sink.put_all(&spans, &state)?;
    for span in &spans {
        tracing::debug!(id = %span.id, description = %span.description, "stored span");
    }
    tracing::info!(%reason, written = spans.len(), inserted, "upload complete");

    Ok(SyncOutcome::Uploaded {
        reason,
        written: spans.len(),
        inserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::convert::Infallible;

    use chrono::TimeZone;

    use crate::sequence::{NormalizeOptions, normalize};

    #[derive(Default)]
    struct MemorySink {
        spans: BTreeMap<RecordId, TaskSpan>,
        state: Option<UploadState>,
        puts: usize,
    }

    impl RecordSink for MemorySink {
        type Error = Infallible;

        fn put(&mut self, span: &TaskSpan, _uploaded_at: DateTime<Utc>) -> Result<(), Infallible> {
            self.puts += 1;
            self.spans.insert(span.id, span.clone());
            Ok(())
        }

        fn exists(&self, id: &RecordId) -> Result<bool, Infallible> {
            Ok(self.spans.contains_key(id))
        }

        fn is_empty(&self) -> Result<bool, Infallible> {
            Ok(self.spans.is_empty())
        }

        fn upload_state(&self) -> Result<Option<UploadState>, Infallible> {
            Ok(self.state.clone())
        }

        fn store_upload_state(&mut self, state: &UploadState) -> Result<(), Infallible> {
            self.state = Some(state.clone());
            Ok(())
        }
    }

    const LOG: &str = "01/11/2025\n+ Sleep 23h50\n+ Wake 0h10\n";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 2, 12, 0, 0).unwrap()
    }

    fn records(input: &str) -> Vec<NormalizedRecord> {
        normalize(input, &NormalizeOptions::default())
            .unwrap()
            .records
    }

    #[test]
    fn first_upload_writes_everything() {
        let mut sink = MemorySink::default();
        let fingerprint = Fingerprint::of(LOG.as_bytes());

        let outcome = sync_records(&mut sink, &records(LOG), &fingerprint, now(), false).unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Uploaded {
                reason: UploadReason::EmptySink,
                written: 2,
                inserted: 2,
            }
        );
        let state = sink.state.unwrap();
        assert_eq!(state.fingerprint, fingerprint);
        assert_eq!(state.task_count, 2);
        assert_eq!(state.uploaded_at, now());
    }

    #[test]
    fn unchanged_input_is_skipped() {
        let mut sink = MemorySink::default();
        let fingerprint = Fingerprint::of(LOG.as_bytes());
        sync_records(&mut sink, &records(LOG), &fingerprint, now(), false).unwrap();
        let puts = sink.puts;

        let outcome = sync_records(&mut sink, &records(LOG), &fingerprint, now(), false).unwrap();

        assert!(matches!(outcome, SyncOutcome::Skipped { .. }));
        assert_eq!(sink.puts, puts);
    }

    #[test]
    fn changed_input_upserts_and_counts_new_ids() {
        let mut sink = MemorySink::default();
        sync_records(
            &mut sink,
            &records(LOG),
            &Fingerprint::of(LOG.as_bytes()),
            now(),
            false,
        )
        .unwrap();

        let changed = format!("{LOG}+ Run 7h\n");
        let outcome = sync_records(
            &mut sink,
            &records(&changed),
            &Fingerprint::of(changed.as_bytes()),
            now(),
            false,
        )
        .unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Uploaded {
                reason: UploadReason::FingerprintChanged,
                written: 3,
                inserted: 1,
            }
        );
        assert_eq!(sink.spans.len(), 3);
    }

    #[test]
    fn empty_sink_ignores_matching_fingerprint() {
        let fingerprint = Fingerprint::of(LOG.as_bytes());
        let mut sink = MemorySink {
            state: Some(UploadState {
                fingerprint: fingerprint.clone(),
                uploaded_at: now(),
                task_count: 2,
            }),
            ..MemorySink::default()
        };

        let outcome = sync_records(&mut sink, &records(LOG), &fingerprint, now(), false).unwrap();

        assert!(matches!(
            outcome,
            SyncOutcome::Uploaded {
                reason: UploadReason::EmptySink,
                ..
            }
        ));
    }

    #[test]
    fn force_uploads_unchanged_input() {
        let mut sink = MemorySink::default();
        let fingerprint = Fingerprint::of(LOG.as_bytes());
        sync_records(&mut sink, &records(LOG), &fingerprint, now(), false).unwrap();

        let outcome = sync_records(&mut sink, &records(LOG), &fingerprint, now(), true).unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Uploaded {
                reason: UploadReason::Forced,
                written: 2,
                inserted: 0,
            }
        );
    }

    #[test]
    fn stored_spans_without_state_upload() {
        let mut sink = MemorySink::default();
        let fingerprint = Fingerprint::of(LOG.as_bytes());
        sync_records(&mut sink, &records(LOG), &fingerprint, now(), false).unwrap();
        sink.state = None;

        let outcome = sync_records(&mut sink, &records(LOG), &fingerprint, now(), false).unwrap();

        assert!(matches!(
            outcome,
            SyncOutcome::Uploaded {
                reason: UploadReason::NoUploadState,
                ..
            }
        ));
    }
}
