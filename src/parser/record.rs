//! Decoding of `<sms>` and `<mms>` elements into records.
//!
//! Attribute problems (bad escapes, duplicate attributes) are record-level:
//! the element is still consumed to its end tag so the stream stays aligned,
//! and the failure is returned as [`ReadError::Record`]. Tokenizer failures
//! and EOF inside an element are document-level.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::model::message::{MmsPart, MmsRecord, SmsRecord};

/// Failure while reading one element.
#[derive(Debug)]
pub(crate) enum ReadError {
    /// The element was consumed but could not be decoded.
    Record(String),
    /// The tokenizer failed.
    Xml(quick_xml::Error),
    /// The document ended before the element was closed.
    UnexpectedEof,
}

impl From<quick_xml::Error> for ReadError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e)
    }
}

/// Visit every attribute of `start` as `(key, unescaped value)`.
fn for_each_attribute(
    start: &BytesStart<'_>,
    mut visit: impl FnMut(&[u8], String),
) -> Result<(), String> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        visit(attr.key.as_ref(), value.into_owned());
    }
    Ok(())
}

/// Read an `<sms>` element whose start tag has just been returned.
pub(crate) fn read_sms<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart<'_>,
    empty: bool,
    buf: &mut Vec<u8>,
) -> Result<SmsRecord, ReadError> {
    let mut sms = SmsRecord::default();
    let decoded = for_each_attribute(start, |key, value| match key {
        b"address" => sms.address = value,
        b"body" => sms.body = value,
        b"date" => sms.date = value,
        _ => {}
    });

    if !empty {
        skip_children(reader, buf)?;
    }
    decoded.map_err(ReadError::Record)?;
    Ok(sms)
}

/// Read an `<mms>` element whose start tag has just been returned, including
/// its `<parts>`, `<addrs>` and `<body>` children.
pub(crate) fn read_mms<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart<'_>,
    empty: bool,
    buf: &mut Vec<u8>,
) -> Result<MmsRecord, ReadError> {
    let mut mms = MmsRecord::default();
    let mut deferred = for_each_attribute(start, |key, value| match key {
        b"date" => mms.date = value,
        b"address" => mms.address = value,
        b"text_only" => mms.text_only = value,
        b"read" => mms.read = value,
        b"locked" => mms.locked = value,
        b"seen" => mms.seen = value,
        b"date_sent" => mms.date_sent = value,
        b"readable_date" => mms.readable_date = value,
        b"contact_name" => mms.contact_name = value,
        b"from_address" => mms.from_address = value,
        b"m_cls" => mms.message_class = value,
        b"m_size" => mms.message_size = value,
        _ => {}
    })
    .err();

    if empty {
        return match deferred {
            Some(reason) => Err(ReadError::Record(reason)),
            None => Ok(mms),
        };
    }

    // Depth relative to the <mms> element; 0 means its end tag was reached.
    let mut depth: usize = 1;
    let mut in_body = false;

    while depth > 0 {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                depth += 1;
                match (depth, e.local_name().as_ref()) {
                    (3, b"part") => record_part(&mut mms, &e, &mut deferred),
                    (3, b"addr") => record_addr(&mut mms, &e, &mut deferred),
                    (2, b"body") => in_body = true,
                    _ => {}
                }
            }
            Event::Empty(e) => match (depth + 1, e.local_name().as_ref()) {
                (3, b"part") => record_part(&mut mms, &e, &mut deferred),
                (3, b"addr") => record_addr(&mut mms, &e, &mut deferred),
                _ => {}
            },
            Event::Text(t) if in_body => match t.unescape() {
                Ok(text) => mms.body.push_str(&text),
                Err(e) => {
                    deferred.get_or_insert(e.to_string());
                }
            },
            Event::CData(t) if in_body => {
                mms.body.push_str(&String::from_utf8_lossy(&t));
            }
            Event::End(_) => {
                if depth == 2 {
                    in_body = false;
                }
                depth -= 1;
            }
            Event::Eof => return Err(ReadError::UnexpectedEof),
            _ => {}
        }
    }

    match deferred {
        Some(reason) => Err(ReadError::Record(reason)),
        None => Ok(mms),
    }
}

fn record_part(mms: &mut MmsRecord, start: &BytesStart<'_>, deferred: &mut Option<String>) {
    let mut part = MmsPart::default();
    let decoded = for_each_attribute(start, |key, value| match key {
        b"ct" => part.content_type = value,
        b"cl" => part.filename = value,
        b"name" => part.name = value,
        b"data" => part.data = value,
        b"text" => part.text = value,
        b"cd" => part.content_display = value,
        _ => {}
    });
    match decoded {
        Ok(()) => mms.parts.push(part),
        Err(reason) => {
            deferred.get_or_insert(reason);
        }
    }
}

fn record_addr(mms: &mut MmsRecord, start: &BytesStart<'_>, deferred: &mut Option<String>) {
    let mut address = None;
    let decoded = for_each_attribute(start, |key, value| {
        if key == b"address" {
            address = Some(value);
        }
    });
    match decoded {
        Ok(()) => mms.addresses.extend(address),
        Err(reason) => {
            deferred.get_or_insert(reason);
        }
    }
}

/// Consume events up to and including the end tag of the current element.
pub(crate) fn skip_children<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
) -> Result<(), ReadError> {
    let mut depth: usize = 1;
    while depth > 0 {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(ReadError::UnexpectedEof),
            _ => {}
        }
    }
    Ok(())
}
