//! Text extraction: raw document bytes → [`NormalizedText`].
//!
//! One adapter per supported format. Each adapter is a pure transform —
//! no filesystem or network access — so the whole stage is trivially
//! testable with byte literals.
//!
//! ## Normalization rules
//!
//! Downstream stages work on *paragraphs*: the rule tier matches headers
//! line by line and the binder emits one LaTeX block per paragraph. So each
//! non-empty source line becomes one paragraph, with control characters
//! stripped and interior whitespace runs collapsed to a single space. DOCX
//! paragraphs (`w:p` elements) map 1:1; PDF text is split on the line
//! boundaries the extractor reports.
//!
//! Magic bytes are validated before any parser runs: a declared-but-wrong
//! format must fail with a typed error, never crash inside a parser.

use std::fmt;
use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::ZipArchive;

use crate::error::Doc2TexError;

/// Declared format of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Plain UTF-8 (or near-UTF-8) text.
    PlainText,
    /// Office Open XML word-processing document.
    Docx,
    /// Portable Document Format.
    Pdf,
}

impl InputFormat {
    /// Map a file extension (without dot, any case) to a format.
    ///
    /// Returns `None` for extensions with no registered adapter; callers
    /// surface that as [`Doc2TexError::UnsupportedFormat`].
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(InputFormat::PlainText),
            "docx" => Some(InputFormat::Docx),
            "pdf" => Some(InputFormat::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::PlainText => "txt",
            InputFormat::Docx => "docx",
            InputFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding detected while decoding plain-text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// Input was valid UTF-8.
    Utf8,
    /// Input contained invalid sequences; decoded lossily.
    Utf8Lossy,
}

/// Extracted document text as an ordered paragraph sequence.
///
/// Owned by a single conversion run; the only structure preserved from the
/// source document is the paragraph boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub paragraphs: Vec<String>,
    pub encoding: TextEncoding,
}

impl NormalizedText {
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Total character count across paragraphs.
    pub fn char_len(&self) -> usize {
        self.paragraphs.iter().map(|p| p.chars().count()).sum()
    }

    /// Full text with paragraphs joined by blank lines.
    pub fn full_text(&self) -> String {
        self.paragraphs.join("\n\n")
    }

    /// A bounded excerpt for the remote classifier.
    ///
    /// Whole paragraphs are taken until the budget is spent, then the last
    /// paragraph is cut at a char boundary. Bounding the excerpt caps token
    /// cost per call regardless of document size.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut out = String::new();
        let mut budget = max_chars;
        for para in &self.paragraphs {
            if budget == 0 {
                break;
            }
            if !out.is_empty() {
                out.push('\n');
                budget = budget.saturating_sub(1);
            }
            if para.chars().count() <= budget {
                out.push_str(para);
                budget -= para.chars().count();
            } else {
                out.extend(para.chars().take(budget));
                budget = 0;
            }
        }
        out
    }
}

/// Extract and normalize text from raw document bytes.
///
/// # Errors
/// * [`Doc2TexError::UnsupportedFormat`] — the bytes do not carry the
///   declared format's signature.
/// * [`Doc2TexError::CorruptInput`] — the adapter ran but produced no text.
pub fn extract(bytes: &[u8], format: InputFormat) -> Result<NormalizedText, Doc2TexError> {
    let (raw, encoding) = match format {
        InputFormat::PlainText => decode_plain_text(bytes),
        InputFormat::Docx => {
            check_magic(bytes, b"PK\x03\x04", format)?;
            (extract_docx(bytes)?, TextEncoding::Utf8)
        }
        InputFormat::Pdf => {
            check_pdf_magic(bytes, format)?;
            (extract_pdf(bytes)?, TextEncoding::Utf8)
        }
    };

    let paragraphs = normalize(&raw);
    if paragraphs.is_empty() {
        return Err(Doc2TexError::CorruptInput {
            format: format.as_str().into(),
            detail: "no text content found".into(),
        });
    }

    debug!(
        format = %format,
        paragraphs = paragraphs.len(),
        "extracted document text"
    );

    Ok(NormalizedText {
        paragraphs,
        encoding,
    })
}

// ── Adapters ─────────────────────────────────────────────────────────────

fn decode_plain_text(bytes: &[u8]) -> (String, TextEncoding) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), TextEncoding::Utf8),
        Err(_) => (
            String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Utf8Lossy,
        ),
    }
}

/// DOCX: ZIP archive; the text lives in `word/document.xml` as `w:t` runs
/// grouped into `w:p` paragraph elements.
fn extract_docx(bytes: &[u8]) -> Result<String, Doc2TexError> {
    let corrupt = |detail: String| Doc2TexError::CorruptInput {
        format: "docx".into(),
        detail,
    };

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(format!("not a ZIP archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| corrupt(format!("word/document.xml missing: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| corrupt(format!("word/document.xml unreadable: {e}")))?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_text_run = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            // Self-closing breaks and tabs separate words, not paragraphs.
            Ok(Event::Empty(e)) if matches!(e.name().as_ref(), b"w:br" | b"w:tab") => {
                out.push(' ');
            }
            Ok(Event::Text(t)) if in_text_run => {
                let piece = t
                    .unescape()
                    .map_err(|e| corrupt(format!("invalid XML text: {e}")))?;
                out.push_str(&piece);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(corrupt(format!("invalid XML: {e}"))),
        }
        buf.clear();
    }

    Ok(out)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, Doc2TexError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| Doc2TexError::CorruptInput {
        format: "pdf".into(),
        detail: e.to_string(),
    })
}

// ── Magic-byte checks ────────────────────────────────────────────────────

fn check_magic(bytes: &[u8], magic: &[u8], format: InputFormat) -> Result<(), Doc2TexError> {
    if bytes.starts_with(magic) {
        Ok(())
    } else {
        Err(Doc2TexError::UnsupportedFormat {
            format: format.as_str().into(),
            detail: "file signature does not match the declared format".into(),
        })
    }
}

/// PDF magic may follow a BOM or leading whitespace.
fn check_pdf_magic(bytes: &[u8], format: InputFormat) -> Result<(), Doc2TexError> {
    let trimmed: Vec<u8> = bytes
        .iter()
        .skip_while(|&&b| b == 0xEF || b == 0xBB || b == 0xBF || b.is_ascii_whitespace())
        .take(4)
        .copied()
        .collect();
    if trimmed.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(Doc2TexError::UnsupportedFormat {
            format: format.as_str().into(),
            detail: "file signature does not match the declared format".into(),
        })
    }
}

// ── Normalization ────────────────────────────────────────────────────────

/// Split raw text into normalized paragraphs.
///
/// Per line: drop control characters, collapse whitespace runs, trim.
/// Empty lines vanish; their only role is separating paragraphs.
fn normalize(raw: &str) -> Vec<String> {
    raw.lines()
        .map(normalize_line)
        .filter(|l| !l.is_empty())
        .collect()
}

fn normalize_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;
    for ch in line.chars() {
        if ch.is_control() {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    out
}
