//! Data model for records decoded from SMS/MMS backup documents.

pub mod message;
