//! Attachment classification by declared MIME type.

/// What to do with a part of a given content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Media or document worth writing to disk.
    Extract,
    /// Message text or SMIL layout; skipped without comment.
    Body,
    /// Anything else; skipped and reported.
    Unknown,
}

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// File extension including the leading dot (`.jpg`, `.bin`, ...).
    pub extension: &'static str,
    pub category: Category,
}

/// Classify a part by its declared content type.
///
/// The extension lookup is an exact, case-sensitive match; the keep/skip
/// decision is made on the lowercased type.
pub fn classify(content_type: &str) -> Classification {
    Classification {
        extension: extension_for(content_type),
        category: category_for(content_type),
    }
}

/// File extension for a content type, `.bin` when unrecognized.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/heic" => ".heic",
        "video/mp4" => ".mp4",
        "video/3gpp" => ".3gp",
        "audio/mpeg" => ".mp3",
        "audio/amr" => ".amr",
        "audio/vnd.qcelp" => ".qcp",
        "text/plain" => ".txt",
        "application/pdf" => ".pdf",
        "text/x-vcard" | "text/x-vCard" | "text/xvcard" | "text/vcard" => ".vcf",
        _ => ".bin",
    }
}

fn category_for(content_type: &str) -> Category {
    let ct = content_type.to_lowercase();
    if ct.starts_with("image/") || ct.starts_with("audio/") || ct.starts_with("video/") {
        return Category::Extract;
    }
    match ct.as_str() {
        "application/pdf"
        | "text/x-vcard"
        | "text/v-card"
        | "text/vcard"
        | "application/octet-stream" => Category::Extract,
        "text/plain" | "application/smil" => Category::Body,
        _ => Category::Unknown,
    }
}
