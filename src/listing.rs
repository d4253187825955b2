//! Parsing of the external tool's `ls` output lines into structured records.
//!
//! The tool emits either a bare file name per line (short form) or an
//! `ls -l`-style row (long form). Column order and unit suffixes are an
//! externally-versioned, loosely-specified protocol; every assumption about
//! them lives in this module so format drift stays a localized change.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::size::parse_size;

/// Category derived from a file name's extension. Best-effort heuristic,
/// never authoritative metadata from the upstream store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileKind {
    Image,
    Video,
    Document,
    Archive,
    Folder,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "Image",
            FileKind::Video => "Video",
            FileKind::Document => "Document",
            FileKind::Archive => "Archive",
            FileKind::Folder => "Folder",
            FileKind::Other => "Other",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote file as reported by a single listing line. Constructed
/// transiently per parsed line and owned solely by the receiving caller.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub name: String,
    /// Bytes; zero when the upstream token was absent or unparsable.
    pub size: u64,
    pub kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl FileRecord {
    fn named(name: String, size: u64) -> Self {
        let kind = detect_kind(&name);
        FileRecord {
            name,
            size,
            kind,
            id: None,
            path: None,
            created: None,
            modified: None,
        }
    }
}

/// Parse one trimmed, non-empty, non-"total" listing line.
///
/// Short form: the entire line is the file name. Long form: see
/// [`parse_long_line`]. Returns `None` for lines that yield no record;
/// callers skip those silently.
pub fn parse_line(line: &str, long_format: bool) -> Option<FileRecord> {
    if long_format {
        parse_long_line(line)
    } else {
        Some(FileRecord::named(line.to_string(), 0))
    }
}

/// Parse a long-format row: whitespace-tokenized, token 2 is the size field,
/// tokens 5 onward rejoined with single spaces reconstruct a name that may
/// itself contain spaces. Rows with fewer than 6 tokens yield no record.
pub fn parse_long_line(line: &str) -> Option<FileRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 6 {
        return None;
    }

    // Unknown sizes degrade to zero so one odd row never aborts a listing.
    let size = parse_size(tokens[2]).unwrap_or(0);
    let name = tokens[5..].join(" ");

    Some(FileRecord::named(name, size))
}

/// Derive a category from the lower-cased extension. An empty extension
/// implies a folder.
pub fn detect_kind(name: &str) -> FileKind {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());

    match ext.as_deref() {
        None => FileKind::Folder,
        Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "svg") => FileKind::Image,
        Some("mp4" | "avi" | "mkv" | "mov" | "wmv" | "flv" | "webm" | "m4v") => FileKind::Video,
        Some("pdf" | "doc" | "docx" | "txt" | "xlsx" | "pptx" | "odt" | "rtf") => {
            FileKind::Document
        }
        Some("zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz") => FileKind::Archive,
        Some(_) => FileKind::Other,
    }
}

/// Render a byte count for display, optionally with a one-decimal binary
/// suffix.
pub fn format_size(bytes: u64, human: bool) -> String {
    if !human {
        return bytes.to_string();
    }

    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    if bytes >= GIB {
        format!("{:.1}GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1}MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1}KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes}B")
    }
}
