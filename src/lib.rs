//! `sbr` - recover MMS attachments from SMS Backup & Restore XML exports.
//!
//! This crate provides the core library for streaming backup documents,
//! classifying and naming MMS parts, and writing them to disk without ever
//! leaving a partial file or replacing an existing one.

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod report;
