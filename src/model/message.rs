//! Message records decoded from a backup document.
//!
//! Records are transient: the walker decodes one element at a time and drops
//! it once its parts have been dispatched.

/// A plain text message (`<sms>` element).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmsRecord {
    /// Phone number or contact token of the other party.
    pub address: String,

    /// Message text.
    pub body: String,

    /// Sent time as an epoch-millisecond string.
    pub date: String,
}

/// A multimedia message (`<mms>` element).
///
/// Only `date` and `parts` drive extraction. Everything else is carried
/// through as it appears in the export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MmsRecord {
    /// Sent time as an epoch-millisecond string.
    pub date: String,

    /// Primary address (`address` attribute, may be `~`-joined for groups).
    pub address: String,

    /// Attachment and body fragments, in document order.
    pub parts: Vec<MmsPart>,

    /// Participant addresses from `<addrs><addr address=".."/></addrs>`.
    pub addresses: Vec<String>,

    /// Text of a nested `<body>` element, if any.
    pub body: String,

    pub text_only: String,
    pub read: String,
    pub locked: String,
    pub seen: String,
    pub date_sent: String,
    pub readable_date: String,
    pub contact_name: String,
    pub from_address: String,

    /// `m_cls` attribute (e.g. `personal`).
    pub message_class: String,

    /// `m_size` attribute, as written by the exporting app.
    pub message_size: String,
}

/// One attachment or body fragment of an [`MmsRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MmsPart {
    /// Declared MIME type (`ct`).
    pub content_type: String,

    /// Content location (`cl`), usually the original filename. May be `"null"`.
    pub filename: String,

    /// `name` attribute. May be `"null"`.
    pub name: String,

    /// Base64-encoded payload (`data`). Empty for text parts.
    pub data: String,

    /// Inline text (`text`), used by `text/plain` and SMIL parts.
    pub text: String,

    /// Content disposition (`cd`).
    pub content_display: String,
}

impl MmsPart {
    /// Short human-readable label used in diagnostics.
    pub fn label(&self) -> String {
        let supplied = [self.filename.as_str(), self.name.as_str()]
            .into_iter()
            .find(|s| !s.is_empty() && *s != "null");
        match supplied {
            Some(name) => format!("{} ({})", name, self.content_type),
            None => self.content_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_label_prefers_filename() {
        let part = MmsPart {
            content_type: "image/png".into(),
            filename: "a.png".into(),
            name: "b.png".into(),
            ..Default::default()
        };
        assert_eq!(part.label(), "a.png (image/png)");
    }

    #[test]
    fn test_part_label_skips_null() {
        let part = MmsPart {
            content_type: "image/png".into(),
            filename: "null".into(),
            name: "null".into(),
            ..Default::default()
        };
        assert_eq!(part.label(), "image/png");
    }
}
