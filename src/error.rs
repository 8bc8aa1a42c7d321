//! Centralized error types for sbr.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the sbr library.
#[derive(Error, Debug)]
pub enum SbrError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input path does not exist.
    #[error("Input not found: {0}")]
    FileNotFound(PathBuf),

    /// The output path exists but is not a directory.
    #[error("Output path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The document is a call log export, not a message backup.
    #[error("Not an SMS backup: {0}")]
    NotABackup(PathBuf),

    /// The XML tokenizer failed; the rest of the document is unreadable.
    #[error("Malformed XML in '{path}' at byte {position}: {source}")]
    Xml {
        path: PathBuf,
        position: u64,
        source: quick_xml::Error,
    },

    /// The document ended in the middle of an element.
    #[error("Unexpected end of '{path}' inside <{element}>")]
    Truncated { path: PathBuf, element: String },

    /// A single `sms` or `mms` element could not be decoded.
    #[error("Could not decode <{element}>: {reason}")]
    Record { element: String, reason: String },

    /// The message date is not a base-10 millisecond timestamp.
    #[error("Invalid message timestamp '{0}'")]
    InvalidTimestamp(String),

    /// The part payload is not valid base64.
    #[error("Invalid attachment data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The part payload decoded to zero bytes.
    #[error("Attachment data is empty")]
    EmptyPayload,

    /// A directory occupies the path an attachment would be written to.
    #[error("Output path is an existing directory: {0}")]
    OutputIsDirectory(PathBuf),
}

/// Convenience alias for `Result<T, SbrError>`.
pub type Result<T> = std::result::Result<T, SbrError>;

impl SbrError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
