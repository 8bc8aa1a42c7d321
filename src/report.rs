//! Operator-facing reporting.
//!
//! The extraction core never prints. It emits [`Event`]s to a [`Reporter`]
//! supplied by the caller: the CLI forwards them to `tracing`, tests collect
//! them in memory.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, error, info, warn};

/// Something the operator may want to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A document is about to be walked.
    DocumentStarted { document: PathBuf },
    /// The document is a call log export and was skipped.
    NotABackup { document: PathBuf },
    /// The document could not be read to the end.
    DocumentFailed { document: PathBuf, error: String },
    /// An `sms`/`mms` element could not be decoded and was skipped.
    RecordSkipped {
        document: PathBuf,
        element: String,
        reason: String,
    },
    /// A part with an unrecognized content type was skipped.
    UnknownContentType {
        document: PathBuf,
        content_type: String,
    },
    /// An attachment was written.
    AttachmentWritten { document: PathBuf, path: PathBuf, bytes: u64 },
    /// An attachment was already present and left untouched.
    AttachmentExists { document: PathBuf, path: PathBuf },
    /// An attachment could not be written.
    AttachmentFailed {
        document: PathBuf,
        part: String,
        error: String,
    },
}

/// Sink for [`Event`]s. Called concurrently from extraction tasks.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);
}

/// Forward events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: Event) {
        match event {
            Event::DocumentStarted { document } => {
                info!(document = %document.display(), "Processing file");
            }
            Event::NotABackup { document } => {
                warn!(document = %document.display(), "Not an SMS backup, skipping");
            }
            Event::DocumentFailed { document, error } => {
                error!(document = %document.display(), error = %error, "Error decoding file");
            }
            Event::RecordSkipped {
                document,
                element,
                reason,
            } => {
                warn!(
                    document = %document.display(),
                    element = %element,
                    reason = %reason,
                    "Skipping undecodable record"
                );
            }
            Event::UnknownContentType {
                document,
                content_type,
            } => {
                warn!(
                    document = %document.display(),
                    content_type = %content_type,
                    "Unknown content type, skipping part"
                );
            }
            Event::AttachmentWritten {
                document,
                path,
                bytes,
            } => {
                info!(
                    document = %document.display(),
                    path = %path.display(),
                    bytes,
                    "Attachment saved"
                );
            }
            Event::AttachmentExists { document, path } => {
                debug!(
                    document = %document.display(),
                    path = %path.display(),
                    "Attachment already present"
                );
            }
            Event::AttachmentFailed {
                document,
                part,
                error,
            } => {
                error!(
                    document = %document.display(),
                    part = %part,
                    error = %error,
                    "Error saving attachment"
                );
            }
        }
    }
}

/// Collect events in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<Event>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of received events matching `pred`.
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
