//! Walk one backup document and extract the attachments of its MMS records.

use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, SbrError};
use crate::model::message::{MmsPart, MmsRecord};
use crate::parser::backup::{BackupItem, BackupReader, DEFAULT_BUFFER_SIZE};
use crate::report::{Event, Reporter};

use super::attachment::{write_attachment, WriteOutcome};
use super::classify::{classify, Category};
use super::filename::DateZone;

/// Settings shared by every document of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Time zone of the filename date prefix.
    pub zone: DateZone,
    /// Write the parts of one message concurrently.
    pub parallel_parts: bool,
    /// Read buffer size for the XML stream.
    pub read_buffer_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            zone: DateZone::Local,
            parallel_parts: true,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ExtractOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            zone: config.extract.timezone,
            parallel_parts: config.extract.parallel_parts,
            read_buffer_size: config.performance.read_buffer_size,
        }
    }
}

/// Counters for one document (or, merged, for a whole run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentSummary {
    pub sms: u64,
    pub mms: u64,
    /// Elements that could not be decoded.
    pub records_skipped: u64,
    pub attachments_written: u64,
    /// Attachments whose derived name was already taken.
    pub attachments_existing: u64,
    pub attachments_failed: u64,
    /// `text/plain` and SMIL parts.
    pub bodies_skipped: u64,
    pub unknown_parts: u64,
    pub bytes_written: u64,
}

impl DocumentSummary {
    /// Add another summary's counters to this one.
    pub fn merge(&mut self, other: &DocumentSummary) {
        self.sms += other.sms;
        self.mms += other.mms;
        self.records_skipped += other.records_skipped;
        self.attachments_written += other.attachments_written;
        self.attachments_existing += other.attachments_existing;
        self.attachments_failed += other.attachments_failed;
        self.bodies_skipped += other.bodies_skipped;
        self.unknown_parts += other.unknown_parts;
        self.bytes_written += other.bytes_written;
    }
}

/// Walk a backup document and write its attachments into `output_dir`.
///
/// Returns [`SbrError::NotABackup`] as soon as a call log container is seen,
/// and any tokenizer error that ends the walk early. Attachments written
/// before an error stay on disk. Undecodable records and failed parts are
/// reported and skipped.
pub fn walk_document(
    path: &Path,
    output_dir: &Path,
    options: &ExtractOptions,
    reporter: &dyn Reporter,
) -> Result<DocumentSummary> {
    let mut reader = BackupReader::open(path, options.read_buffer_size)?;
    let mut summary = DocumentSummary::default();

    while let Some(item) = reader.next_item()? {
        match item {
            BackupItem::CallLog => return Err(SbrError::NotABackup(path.to_path_buf())),
            BackupItem::Sms(sms) => {
                summary.sms += 1;
                debug!(address = %sms.address, date = %sms.date, "SMS");
            }
            BackupItem::Mms(mms) => {
                summary.mms += 1;
                debug!(address = %mms.address, date = %mms.date, parts = mms.parts.len(), "MMS");
                extract_parts(&mms, path, output_dir, options, reporter, &mut summary);
            }
            BackupItem::Invalid { element, reason } => {
                summary.records_skipped += 1;
                reporter.report(Event::RecordSkipped {
                    document: path.to_path_buf(),
                    element,
                    reason,
                });
            }
        }
    }

    info!(
        document = %path.display(),
        sms = summary.sms,
        mms = summary.mms,
        written = summary.attachments_written,
        "Finished file"
    );
    Ok(summary)
}

/// Classify every part of `mms` and write the extractable ones.
///
/// Returns only once every write has finished.
fn extract_parts(
    mms: &MmsRecord,
    document: &Path,
    output_dir: &Path,
    options: &ExtractOptions,
    reporter: &dyn Reporter,
    summary: &mut DocumentSummary,
) {
    let mut jobs: Vec<&MmsPart> = Vec::with_capacity(mms.parts.len());
    for part in &mms.parts {
        match classify(&part.content_type).category {
            Category::Extract => jobs.push(part),
            Category::Body => summary.bodies_skipped += 1,
            Category::Unknown => {
                summary.unknown_parts += 1;
                reporter.report(Event::UnknownContentType {
                    document: document.to_path_buf(),
                    content_type: part.content_type.clone(),
                });
            }
        }
    }

    let write = |part| (part, write_attachment(part, &mms.date, output_dir, options.zone));
    let outcomes: Vec<(&MmsPart, Result<WriteOutcome>)> =
        if options.parallel_parts && jobs.len() > 1 {
            jobs.into_par_iter().map(write).collect()
        } else {
            jobs.into_iter().map(write).collect()
        };

    for (part, outcome) in outcomes {
        match outcome {
            Ok(WriteOutcome::Written { path, bytes }) => {
                summary.attachments_written += 1;
                summary.bytes_written += bytes;
                reporter.report(Event::AttachmentWritten {
                    document: document.to_path_buf(),
                    path,
                    bytes,
                });
            }
            Ok(WriteOutcome::AlreadyExists { path }) => {
                summary.attachments_existing += 1;
                reporter.report(Event::AttachmentExists {
                    document: document.to_path_buf(),
                    path,
                });
            }
            Err(e) => {
                summary.attachments_failed += 1;
                reporter.report(Event::AttachmentFailed {
                    document: document.to_path_buf(),
                    part: part.label(),
                    error: e.to_string(),
                });
            }
        }
    }
}
