//! Output filename derivation.
//!
//! Names are built from the message sent time and, when the exporting app
//! recorded one, the part's original filename:
//!
//! - `2023-11-14-221320.jpg` when no name was supplied
//! - `2023-11-14-221320-photo.jpg` when `cl="photo.jpg"`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SbrError};

use super::classify::extension_for;

/// `strftime` pattern for the date prefix.
pub const DATE_PREFIX_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Time zone used to render the date prefix. Fixed for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateZone {
    /// The machine's local time zone.
    #[default]
    Local,
    Utc,
}

/// Parse an epoch-millisecond string into a second-precision UTC time.
pub fn parse_sent_time(sent: &str) -> Result<DateTime<Utc>> {
    let millis: i64 = sent
        .parse()
        .map_err(|_| SbrError::InvalidTimestamp(sent.to_string()))?;
    DateTime::from_timestamp(millis / 1000, 0)
        .ok_or_else(|| SbrError::InvalidTimestamp(sent.to_string()))
}

/// Render the `YYYY-MM-DD-HHMMSS` prefix.
pub fn date_prefix(sent: DateTime<Utc>, zone: DateZone) -> String {
    match zone {
        DateZone::Local => sent
            .with_timezone(&chrono::Local)
            .format(DATE_PREFIX_FORMAT)
            .to_string(),
        DateZone::Utc => sent.format(DATE_PREFIX_FORMAT).to_string(),
    }
}

/// Derive the output filename for a part.
///
/// `filename` (the `cl` attribute) wins over `name`; either is ignored when
/// empty or the literal `"null"`. A supplied name keeps its own extension.
pub fn derive_filename(
    sent: &str,
    name: &str,
    filename: &str,
    content_type: &str,
    zone: DateZone,
) -> Result<String> {
    let prefix = date_prefix(parse_sent_time(sent)?, zone);

    match supplied_name(filename, name) {
        Some(supplied) => Ok(format!("{prefix}-{supplied}")),
        None => Ok(format!("{prefix}{}", extension_for(content_type))),
    }
}

fn supplied_name(filename: &str, name: &str) -> Option<String> {
    [filename, name]
        .into_iter()
        .find(|s| !s.is_empty() && *s != "null")
        .map(sanitize_supplied_name)
}

/// Keep a supplied name inside the output directory.
fn sanitize_supplied_name(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
