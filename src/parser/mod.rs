//! Backup document parsing: streaming XML reader and record decoding.

pub mod backup;
mod record;
