//! Write decoded attachments to disk.
//!
//! Every file is written to a hidden temporary sibling, stamped with the
//! message sent time, and then published under its final name with a
//! no-clobber link. A file that already exists under the final name is never
//! replaced. Any failure before publishing removes the temporary file.

use std::borrow::Cow;
use std::fs::FileTimes;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, SbrError};
use crate::model::message::MmsPart;

use super::filename::{derive_filename, parse_sent_time, DateZone};

/// Suffix of in-flight temporary files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Standard alphabet, padded, accepting non-zero trailing bits in the last
/// symbol as some exporters produce them.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// What [`write_attachment`] did with a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new file was published.
    Written { path: PathBuf, bytes: u64 },
    /// A file with the derived name was already present and was left alone.
    AlreadyExists { path: PathBuf },
}

/// Decode a part and write it into `output_dir`.
///
/// `sent` is the owning message's epoch-millisecond date; it names the file
/// and becomes its access and modification time.
pub fn write_attachment(
    part: &MmsPart,
    sent: &str,
    output_dir: &Path,
    zone: DateZone,
) -> Result<WriteOutcome> {
    let data = decode_payload(&part.data)?;
    if data.is_empty() {
        return Err(SbrError::EmptyPayload);
    }

    let sent_time = parse_sent_time(sent)?;
    let filename = derive_filename(sent, &part.name, &part.filename, &part.content_type, zone)?;
    let final_path = output_dir.join(&filename);

    match std::fs::metadata(&final_path) {
        Ok(meta) if meta.is_dir() => return Err(SbrError::OutputIsDirectory(final_path)),
        Ok(_) => {
            debug!(path = %final_path.display(), "Attachment already extracted");
            return Ok(WriteOutcome::AlreadyExists { path: final_path });
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(SbrError::io(&final_path, e)),
    }

    // Dropping `tmp` on any early return deletes the temporary file.
    let mut tmp = create_temp(output_dir, &filename)?;

    tmp.write_all(&data)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| SbrError::io(tmp.path(), e))?;

    let mtime = SystemTime::from(sent_time);
    tmp.as_file()
        .set_times(FileTimes::new().set_accessed(mtime).set_modified(mtime))
        .map_err(|e| SbrError::io(tmp.path(), e))?;

    match tmp.persist_noclobber(&final_path) {
        Ok(_) => {
            debug!(path = %final_path.display(), bytes = data.len(), "Attachment written");
            Ok(WriteOutcome::Written {
                path: final_path,
                bytes: data.len() as u64,
            })
        }
        // Another part with the same derived name won the race.
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %final_path.display(), "Attachment published concurrently");
            Ok(WriteOutcome::AlreadyExists { path: final_path })
        }
        Err(e) => Err(SbrError::io(&final_path, e.error)),
    }
}

/// Decode a base64 payload, tolerating line breaks inside the attribute.
pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let compact: Cow<'_, str> = if data.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(data.chars().filter(|c| !c.is_ascii_whitespace()).collect())
    } else {
        Cow::Borrowed(data)
    };
    Ok(PAYLOAD_ENGINE.decode(compact.as_bytes())?)
}

/// Temporary files are hidden siblings: `.{filename}.XXXXXX.tmp`.
fn create_temp(output_dir: &Path, filename: &str) -> Result<NamedTempFile> {
    let prefix = format!(".{filename}.");
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(TEMP_SUFFIX);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    builder
        .tempfile_in(output_dir)
        .map_err(|e| SbrError::io(output_dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    const SENT: &str = "1700000000000";

    fn jpeg_part(data: &str) -> MmsPart {
        MmsPart {
            content_type: "image/jpeg".into(),
            data: data.into(),
            ..Default::default()
        }
    }

    fn leftover_temps(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(TEMP_SUFFIX))
            .collect()
    }

    #[test]
    fn test_write_content_and_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = write_attachment(&jpeg_part("AQID"), SENT, dir.path(), DateZone::Utc).unwrap();

        let path = dir.path().join("2023-11-14-221320.jpg");
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                path: path.clone(),
                bytes: 3
            }
        );
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        assert!(leftover_temps(dir.path()).is_empty());
    }

    #[test]
    fn test_existing_file_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2023-11-14-221320.jpg");
        std::fs::write(&path, b"original").unwrap();

        let outcome = write_attachment(&jpeg_part("AQID"), SENT, dir.path(), DateZone::Utc).unwrap();
        assert_eq!(outcome, WriteOutcome::AlreadyExists { path: path.clone() });
        assert_eq!(std::fs::read(&path).unwrap(), b"original");
        assert!(leftover_temps(dir.path()).is_empty());
    }

    #[test]
    fn test_directory_at_final_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2023-11-14-221320.jpg");
        std::fs::create_dir(&path).unwrap();

        let err = write_attachment(&jpeg_part("AQID"), SENT, dir.path(), DateZone::Utc).unwrap_err();
        assert!(matches!(err, SbrError::OutputIsDirectory(p) if p == path));
        assert!(leftover_temps(dir.path()).is_empty());
    }

    #[test]
    fn test_invalid_base64_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            write_attachment(&jpeg_part("not base64!"), SENT, dir.path(), DateZone::Utc).unwrap_err();
        assert!(matches!(err, SbrError::Base64(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_timestamp_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            write_attachment(&jpeg_part("AQID"), "yesterday", dir.path(), DateZone::Utc).unwrap_err();
        assert!(matches!(err, SbrError::InvalidTimestamp(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_attachment(&jpeg_part(""), SENT, dir.path(), DateZone::Utc).unwrap_err();
        assert!(matches!(err, SbrError::EmptyPayload));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stale_temp_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(".2023-11-14-221320.jpg.abc123.tmp");
        std::fs::write(&stale, b"half").unwrap();

        write_attachment(&jpeg_part("AQID"), SENT, dir.path(), DateZone::Utc).unwrap();
        let path = dir.path().join("2023-11-14-221320.jpg");
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(std::fs::read(&stale).unwrap(), b"half");
    }

    #[test]
    fn test_supplied_name_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let part = MmsPart {
            filename: "photo.jpg".into(),
            ..jpeg_part("AQID")
        };
        write_attachment(&part, SENT, dir.path(), DateZone::Utc).unwrap();
        assert!(dir.path().join("2023-11-14-221320-photo.jpg").is_file());
    }

    #[test]
    fn test_decode_payload_with_line_breaks() {
        assert_eq!(decode_payload("AQ\nID\r\n").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_payload("AQID").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_payload_allows_trailing_bits() {
        assert_eq!(decode_payload("AQJ=").unwrap(), vec![1, 2]);
        assert_eq!(decode_payload("AQI=").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_writers_publish_one_file() {
        use base64::engine::general_purpose::STANDARD;
        use std::sync::Barrier;

        const WRITERS: usize = 8;
        let dir = tempfile::tempdir().unwrap();
        let payloads: Vec<Vec<u8>> = (0..WRITERS).map(|i| vec![i as u8 + 1; 4096]).collect();
        let parts: Vec<MmsPart> = payloads
            .iter()
            .map(|p| MmsPart {
                content_type: "image/png".into(),
                filename: "x.png".into(),
                data: STANDARD.encode(p),
                ..Default::default()
            })
            .collect();
        let barrier = Barrier::new(WRITERS);

        let outcomes: Vec<WriteOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = parts
                .iter()
                .map(|part| {
                    let barrier = &barrier;
                    let dir = dir.path();
                    s.spawn(move || {
                        barrier.wait();
                        write_attachment(part, SENT, dir, DateZone::Utc).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let path = dir.path().join("2023-11-14-221320-x.png");
        let winners: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| matches!(o, WriteOutcome::Written { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(winners.len(), 1);
        for (i, outcome) in outcomes.iter().enumerate() {
            if i != winners[0] {
                assert_eq!(*outcome, WriteOutcome::AlreadyExists { path: path.clone() });
            }
        }
        assert_eq!(std::fs::read(&path).unwrap(), payloads[winners[0]]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(leftover_temps(dir.path()).is_empty());
    }
}
