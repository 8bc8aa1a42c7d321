//! Batch driver: discover backup documents and walk them in parallel.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, SbrError};
use crate::export::document::{walk_document, DocumentSummary, ExtractOptions};
use crate::report::{Event, Reporter};

/// Which files count as backup documents in directory mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFilter {
    pub prefix: String,
    pub extension: String,
}

impl Default for DocumentFilter {
    fn default() -> Self {
        Self {
            prefix: "sms-".to_string(),
            extension: ".xml".to_string(),
        }
    }
}

impl DocumentFilter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: config.extract.document_prefix.clone(),
            extension: config.extract.document_extension.clone(),
        }
    }

    /// `true` if a file with this name should be walked.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix) && file_name.ends_with(&self.extension)
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Documents selected for walking.
    pub documents: u64,
    /// Documents identified as call logs.
    pub documents_rejected: u64,
    /// Documents abandoned on a read or XML error.
    pub documents_failed: u64,
    /// Counters of the documents that were walked to the end.
    pub totals: DocumentSummary,
}

/// Make sure `path` is a usable output directory, creating it if absent.
pub fn prepare_output_dir(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SbrError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            std::fs::create_dir_all(path).map_err(|e| SbrError::io(path, e))?;
            info!(path = %path.display(), "Created output directory");
            Ok(())
        }
        Err(e) => Err(SbrError::io(path, e)),
    }
}

/// List the documents to walk.
///
/// A file input is returned as-is, whatever its name. A directory is walked
/// recursively and only regular files accepted by `filter` are kept, sorted.
/// Unreadable subdirectories are logged and skipped.
pub fn discover_documents(input: &Path, filter: &DocumentFilter) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(input).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            SbrError::FileNotFound(input.to_path_buf())
        } else {
            SbrError::io(input, e)
        }
    })?;
    if !meta.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut documents: Vec<PathBuf> = WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Failed to walk directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| filter.matches(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect();
    documents.sort();
    Ok(documents)
}

/// Extract every attachment reachable from `input` into `output`.
///
/// Fatal errors (missing input, unusable output directory) are returned
/// before any document is touched. Document-level failures are reported and
/// counted. Returns once every document and every attachment write has
/// finished. `progress` receives `(documents_done, documents_total)`.
pub fn run(
    input: &Path,
    output: &Path,
    options: &ExtractOptions,
    filter: &DocumentFilter,
    reporter: &dyn Reporter,
    progress: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> Result<BatchSummary> {
    let documents = discover_documents(input, filter)?;
    prepare_output_dir(output)?;

    info!(
        input = %input.display(),
        output = %output.display(),
        documents = documents.len(),
        "Starting extraction"
    );

    let total = documents.len();
    let done = AtomicUsize::new(0);

    let results: Vec<Result<DocumentSummary>> = documents
        .par_iter()
        .map(|document| {
            reporter.report(Event::DocumentStarted {
                document: document.clone(),
            });
            let result = walk_document(document, output, options, reporter);
            match &result {
                Ok(_) => {}
                Err(SbrError::NotABackup(_)) => reporter.report(Event::NotABackup {
                    document: document.clone(),
                }),
                Err(e) => reporter.report(Event::DocumentFailed {
                    document: document.clone(),
                    error: e.to_string(),
                }),
            }
            if let Some(cb) = progress {
                cb(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            }
            result
        })
        .collect();

    let mut summary = BatchSummary {
        documents: total as u64,
        ..Default::default()
    };
    for result in &results {
        match result {
            Ok(doc) => summary.totals.merge(doc),
            Err(SbrError::NotABackup(_)) => summary.documents_rejected += 1,
            Err(_) => summary.documents_failed += 1,
        }
    }
    Ok(summary)
}
