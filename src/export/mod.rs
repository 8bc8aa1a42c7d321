//! Attachment extraction: classification, naming, crash-safe writing, and
//! the per-document walk that ties them together.

pub mod attachment;
pub mod classify;
pub mod document;
pub mod filename;
