//! Content-based format detection.
//!
//! The institution serves HTML pages under `.xls` names and binary workbooks
//! under generic download URLs, so the URL suffix is never trusted.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::ingest_error::IngestError;
use crate::resource::decode_text;

const LEGACY_SIGNATURE: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
const ZIP_SIGNATURE: [u8; 2] = *b"PK";
const TEXT_PROBE_CHARS: usize = 1024;
const MAX_CONTROL_RATIO: f64 = 0.10;

static HTML_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(!doctype\s+html|html|head|body|table|tr|td|th|meta|div|pre)\b")
        .expect("valid html marker regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SniffedFormat {
    LegacySpreadsheet,
    ModernSpreadsheet,
    HtmlTable,
    DelimitedText,
    Unknown,
}

impl SniffedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SniffedFormat::LegacySpreadsheet => "legacy-spreadsheet",
            SniffedFormat::ModernSpreadsheet => "modern-spreadsheet",
            SniffedFormat::HtmlTable => "html-table",
            SniffedFormat::DelimitedText => "delimited-text",
            SniffedFormat::Unknown => "unknown",
        }
    }

    /// Extensions that would be expected for this format
    fn expected_extensions(&self) -> &'static [&'static str] {
        match self {
            SniffedFormat::LegacySpreadsheet => &["xls"],
            SniffedFormat::ModernSpreadsheet => &["xlsx", "xlsm"],
            SniffedFormat::HtmlTable => &["html", "htm", "jsp"],
            SniffedFormat::DelimitedText => &["csv", "txt", "tsv"],
            SniffedFormat::Unknown => &[],
        }
    }
}

impl fmt::Display for SniffedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a buffer by its content alone.
pub fn detect(bytes: &[u8]) -> SniffedFormat {
    if bytes.starts_with(&LEGACY_SIGNATURE) {
        return SniffedFormat::LegacySpreadsheet;
    }
    if bytes.starts_with(&ZIP_SIGNATURE) {
        return SniffedFormat::ModernSpreadsheet;
    }

    let text = decode_text(bytes);
    if !looks_like_text(&text) {
        return SniffedFormat::Unknown;
    }

    let head: String = text.chars().take(TEXT_PROBE_CHARS * 4).collect();
    let trimmed = head.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if trimmed.starts_with('<') || HTML_MARKER.is_match(&head) {
        SniffedFormat::HtmlTable
    } else {
        SniffedFormat::DelimitedText
    }
}

/// Determine the real format of a fetched buffer.
///
/// `declared_extension` is only compared against the result for logging.
pub fn sniff(bytes: &[u8], declared_extension: Option<&str>) -> Result<SniffedFormat, IngestError> {
    let format = detect(bytes);
    debug!(
        "Sniffed {} bytes as {} (declared extension: {:?})",
        bytes.len(),
        format,
        declared_extension
    );

    if format == SniffedFormat::Unknown {
        let reason = if bytes.is_empty() {
            "empty buffer".to_string()
        } else {
            format!(
                "{} bytes with no known signature and no readable text (head: {:02X?})",
                bytes.len(),
                &bytes[..bytes.len().min(8)]
            )
        };
        return Err(IngestError::UnrecognizedFormat(reason));
    }

    if let Some(ext) = declared_extension {
        let ext = ext.to_ascii_lowercase();
        if !format.expected_extensions().contains(&ext.as_str()) {
            warn!("Resource declared as '.{}' but content is {}", ext, format);
        }
    }

    Ok(format)
}

fn looks_like_text(text: &str) -> bool {
    let mut total = 0usize;
    let mut control = 0usize;
    for c in text.chars().take(TEXT_PROBE_CHARS) {
        total += 1;
        if c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\u{0c}') {
            control += 1;
        }
    }
    total > 0 && (control as f64 / total as f64) <= MAX_CONTROL_RATIO
}
