//! Streaming reader for SMS Backup & Restore XML documents.
//!
//! Reads the document token by token with a buffered reader and only ever
//! materializes the single `<sms>` or `<mms>` element being decoded. Exports
//! with thousands of photo messages run to gigabytes, so the document itself
//! is never loaded.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, SbrError};
use crate::model::message::{MmsRecord, SmsRecord};

use super::record::{read_mms, read_sms, ReadError};

/// Default read buffer size (128 KB).
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Root element of a call log export.
const CALL_LOG_ELEMENT: &[u8] = b"calls";

/// One item produced by [`BackupReader::next_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupItem {
    Sms(SmsRecord),
    Mms(MmsRecord),
    /// A call log container was found: the document is not a message backup.
    CallLog,
    /// An element was skipped because it could not be decoded.
    Invalid { element: String, reason: String },
}

/// Pull-based reader over the records of one backup document.
pub struct BackupReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    path: PathBuf,
    finished: bool,
}

impl BackupReader<BufReader<File>> {
    /// Open a backup document on disk.
    pub fn open(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SbrError::FileNotFound(path.to_path_buf())
            } else {
                SbrError::io(path, e)
            }
        })?;
        Ok(Self::from_reader(
            BufReader::with_capacity(buffer_size.max(1), file),
            path,
        ))
    }
}

impl<R: BufRead> BackupReader<R> {
    /// Wrap any buffered reader. `path` is only used in error messages.
    pub fn from_reader(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::with_capacity(8 * 1024),
            path: path.into(),
            finished: false,
        }
    }

    /// Return the next record, `Ok(None)` at end of document.
    ///
    /// Errors are document-level: after an `Err` the reader is finished and
    /// keeps returning `Ok(None)`.
    pub fn next_item(&mut self) -> Result<Option<BackupItem>> {
        if self.finished {
            return Ok(None);
        }
        let item = self.read_item();
        if !matches!(item, Ok(Some(_))) {
            self.finished = true;
        }
        item
    }

    fn read_item(&mut self) -> Result<Option<BackupItem>> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => return Err(xml_error(&self.reader, &self.path, e)),
            };

            let (start, empty) = match event {
                Event::Start(e) => (e.into_owned(), false),
                Event::Empty(e) => (e.into_owned(), true),
                Event::Eof => return Ok(None),
                _ => continue,
            };

            let name = start.local_name();
            let result = match name.as_ref() {
                CALL_LOG_ELEMENT => return Ok(Some(BackupItem::CallLog)),
                b"sms" => read_sms(&mut self.reader, &start, empty, &mut self.buf)
                    .map(BackupItem::Sms),
                b"mms" => read_mms(&mut self.reader, &start, empty, &mut self.buf)
                    .map(BackupItem::Mms),
                _ => continue,
            };

            return match result {
                Ok(item) => Ok(Some(item)),
                Err(ReadError::Record(reason)) => Ok(Some(BackupItem::Invalid {
                    element: String::from_utf8_lossy(name.as_ref()).into_owned(),
                    reason,
                })),
                Err(ReadError::Xml(e)) => Err(xml_error(&self.reader, &self.path, e)),
                Err(ReadError::UnexpectedEof) => Err(SbrError::Truncated {
                    path: self.path.clone(),
                    element: String::from_utf8_lossy(name.as_ref()).into_owned(),
                }),
            };
        }
    }
}

fn xml_error<R>(reader: &Reader<R>, path: &Path, source: quick_xml::Error) -> SbrError {
    SbrError::Xml {
        path: path.to_path_buf(),
        position: reader.error_position() as u64,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_items(xml: &str) -> (Vec<BackupItem>, Option<SbrError>) {
        let mut reader = BackupReader::from_reader(xml.as_bytes(), "test.xml");
        let mut items = Vec::new();
        loop {
            match reader.next_item() {
                Ok(Some(item)) => items.push(item),
                Ok(None) => return (items, None),
                Err(e) => return (items, Some(e)),
            }
        }
    }

    #[test]
    fn test_reads_sms_and_mms_in_order() {
        let xml = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<!--File Created By SMS Backup & Restore-->
<smses count="2">
  <sms protocol="0" address="+1555" date="1700000000000" body="hello" />
  <mms date="1700000001000" address="+1555">
    <parts><part ct="image/png" data="AQID" /></parts>
  </mms>
</smses>"#;
        let (items, err) = collect_items(xml);
        assert!(err.is_none());
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], BackupItem::Sms(s) if s.body == "hello"));
        match &items[1] {
            BackupItem::Mms(m) => {
                assert_eq!(m.date, "1700000001000");
                assert_eq!(m.parts.len(), 1);
            }
            other => panic!("expected mms, got {other:?}"),
        }
    }

    #[test]
    fn test_call_log_is_detected() {
        let xml = r#"<?xml version='1.0'?><calls count="1"><call number="+1555" duration="3" /></calls>"#;
        let (items, err) = collect_items(xml);
        assert!(err.is_none());
        assert_eq!(items, vec![BackupItem::CallLog]);
    }

    #[test]
    fn test_invalid_record_does_not_stop_reading() {
        let xml = r#"<smses><sms date="1" body="&nope;" /><sms date="2" body="ok" /></smses>"#;
        let (items, err) = collect_items(xml);
        assert!(err.is_none());
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], BackupItem::Invalid { element, .. } if element == "sms"));
        assert!(matches!(&items[1], BackupItem::Sms(s) if s.body == "ok"));
    }

    #[test]
    fn test_mismatched_tags_end_the_document() {
        let xml = r#"<smses><sms date="1" body="a" /><mms date="2"><parts></mms></smses>"#;
        let (items, err) = collect_items(xml);
        assert_eq!(items.len(), 1);
        assert!(matches!(err, Some(SbrError::Xml { .. })));
    }

    #[test]
    fn test_truncated_document() {
        let xml = r#"<smses><mms date="2"><parts><part ct="image/png" data="AQID"/>"#;
        let (items, err) = collect_items(xml);
        assert!(items.is_empty());
        assert!(matches!(
            err,
            Some(SbrError::Truncated { .. }) | Some(SbrError::Xml { .. })
        ));
    }

    #[test]
    fn test_finished_after_error() {
        let mut reader =
            BackupReader::from_reader(&b"<smses><mms date=\"2\"><parts></mms>"[..], "bad.xml");
        assert!(reader.next_item().is_err());
        assert!(matches!(reader.next_item(), Ok(None)));
    }

    #[test]
    fn test_open_missing_file() {
        let err = BackupReader::open("/definitely/not/here.xml", DEFAULT_BUFFER_SIZE)
            .err()
            .unwrap();
        assert!(matches!(err, SbrError::FileNotFound(_)));
    }
}
