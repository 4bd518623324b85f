//! Local rule tier: keyword/structure heuristics for document typing.
//!
//! Official correspondence is rigidly formatted — a memorandum announces
//! itself with an "OFFICE MEMORANDUM" caption, a circular with "CIRCULAR",
//! a contract with "WHEREAS" recitals. Matching those fixed markers costs
//! nothing and is right often enough that the remote classifier can be
//! skipped entirely for the common cases. Each rule carries a fixed
//! confidence; the hybrid classifier compares the best match against its
//! short-circuit threshold.
//!
//! The tier also pulls out the header fields the binder needs (subject,
//! file number, date) and the section captions used for key-section lists.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::pipeline::classify::DocumentType;
use crate::pipeline::extract::NormalizedText;

/// Paragraphs scanned for type markers. Captions sit at the top of a
/// document; scanning everything would let a quoted memo deep inside a
/// report misclassify the whole file.
const SCAN_WINDOW: usize = 40;

/// Best local guess for a document, with extracted header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub document_type: DocumentType,
    pub confidence: f32,
    /// Title when the document states one (subject line or caption).
    /// Empty when no rule found a title — the binder decides whether that
    /// matters for the selected template.
    pub title: String,
    /// Signatory when a signature line was found.
    pub author: String,
    /// Issuing department when stated.
    pub department: String,
    /// Slot-level values extracted from the header (subject, file_no, date).
    pub fields: BTreeMap<String, String>,
    /// Section captions in document order.
    pub key_sections: Vec<String>,
    /// First body paragraph, truncated, as a cheap summary.
    pub summary: String,
}

static RE_SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^sub(?:ject)?\s*[:\-]\s*(.+)$").unwrap());
static RE_FILE_NO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:f\.\s*no\.?|file\s*no\.?|no\.)\s*[:\-]?\s*(.+)$").unwrap());
static RE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^dated?\s*[:\-]\s*(.+)$").unwrap());
static RE_DEPARTMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^((?:ministry|department|office|directorate) of .+)$").unwrap());
static RE_SIGNATORY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(([^()]{2,60})\)$").unwrap());
static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*\.?\s+[A-Z][^.]{2,58}$").unwrap());
static RE_CLOSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^yours\s+(?:faithfully|sincerely|truly)\b").unwrap());
static RE_SALUTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:dear|respected)\s+\S").unwrap());

/// Classify using local rules only.
///
/// Always returns a match; when nothing fires the result is
/// [`DocumentType::Unknown`] with a deliberately low confidence so the
/// hybrid tier consults the remote classifier.
pub fn classify_local(text: &NormalizedText) -> RuleMatch {
    let window: Vec<&str> = text
        .paragraphs
        .iter()
        .take(SCAN_WINDOW)
        .map(String::as_str)
        .collect();
    let upper: Vec<String> = window.iter().map(|p| p.to_uppercase()).collect();

    let (document_type, confidence) = match_type(&window, &upper, text);
    let fields = extract_fields(text);
    let key_sections = collect_key_sections(text);

    let title = fields
        .get("subject")
        .cloned()
        .or_else(|| {
            window
                .iter()
                .find(|p| is_caps_heading(p) && !is_type_caption(&p.to_uppercase()))
                .map(|p| p.to_string())
        })
        .unwrap_or_default();

    let author = text
        .paragraphs
        .iter()
        .rev()
        .find_map(|p| RE_SIGNATORY.captures(p).map(|c| c[1].trim().to_string()))
        .unwrap_or_default();

    let department = text
        .paragraphs
        .iter()
        .take(SCAN_WINDOW)
        .find_map(|p| RE_DEPARTMENT.captures(p).map(|c| c[1].trim().to_string()))
        .unwrap_or_default();

    let summary = text
        .paragraphs
        .iter()
        .find(|p| !is_caps_heading(p) && !is_header_field(p) && p.chars().count() > 40)
        .map(|p| truncate_chars(p, 200))
        .unwrap_or_default();

    RuleMatch {
        document_type,
        confidence,
        title,
        author,
        department,
        fields,
        key_sections,
        summary,
    }
}

/// Ordered rule table: first match wins within a confidence level, highest
/// confidence wins overall.
fn match_type(window: &[&str], upper: &[String], text: &NormalizedText) -> (DocumentType, f32) {
    let mut best = (DocumentType::Unknown, 0.2_f32);
    let mut consider = |t: DocumentType, c: f32| {
        if c > best.1 {
            best = (t, c);
        }
    };

    let any_upper = |needle: &str| upper.iter().any(|p| p.contains(needle));
    let any_caption = |needle: &str| {
        upper
            .iter()
            .zip(window)
            .any(|(u, raw)| is_caps_heading(raw) && (u == needle || u.starts_with(&format!("{needle} NO"))))
    };

    if any_upper("OFFICE MEMORANDUM") {
        consider(DocumentType::OfficeMemorandum, 0.9);
    }
    if any_caption("CIRCULAR") || any_upper("CIRCULAR NO.") {
        consider(DocumentType::Circular, 0.85);
    }
    if any_caption("NOTIFICATION") {
        consider(DocumentType::Notification, 0.85);
    }
    if any_upper("NOTICE INVITING TENDER")
        || any_upper("INVITATION FOR BIDS")
        || any_upper("TENDER NOTICE")
    {
        consider(DocumentType::TenderDocument, 0.85);
    }
    if any_upper("WHEREAS") || any_upper("HEREINAFTER") || any_upper("WITNESSETH") {
        consider(DocumentType::LegalDocument, 0.8);
    }
    if any_upper("BALANCE SHEET")
        || any_upper("PROFIT AND LOSS")
        || any_upper("FINANCIAL STATEMENTS")
    {
        consider(DocumentType::FinancialReport, 0.8);
    }
    if any_caption("ABSTRACT") && (any_caption("REFERENCES") || any_upper("KEYWORDS")) {
        consider(DocumentType::ResearchPaper, 0.8);
    }
    let has_salutation = window.iter().any(|p| RE_SALUTATION.is_match(p));
    let has_closing = text.paragraphs.iter().any(|p| RE_CLOSING.is_match(p));
    if has_salutation && has_closing {
        consider(DocumentType::Letter, 0.85);
    }
    // Weak signals: below the default short-circuit threshold on purpose,
    // so the remote tier gets a say when only these fire.
    if upper
        .iter()
        .zip(window)
        .any(|(u, raw)| is_caps_heading(raw) && u.contains("POLICY"))
    {
        consider(DocumentType::PolicyDocument, 0.7);
    }
    if any_caption("REPORT") || any_caption("EXECUTIVE SUMMARY") || any_upper("ANNUAL REPORT") {
        consider(DocumentType::Report, 0.7);
    }

    best
}

fn extract_fields(text: &NormalizedText) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for para in text.paragraphs.iter().take(SCAN_WINDOW) {
        if let Some(c) = RE_SUBJECT.captures(para) {
            fields
                .entry("subject".to_string())
                .or_insert_with(|| c[1].trim().to_string());
        } else if let Some(c) = RE_DATE.captures(para) {
            fields
                .entry("date".to_string())
                .or_insert_with(|| c[1].trim().to_string());
        } else if let Some(c) = RE_FILE_NO.captures(para) {
            fields
                .entry("file_no".to_string())
                .or_insert_with(|| c[1].trim().to_string());
        }
    }
    fields
}

fn collect_key_sections(text: &NormalizedText) -> Vec<String> {
    text.paragraphs
        .iter()
        .filter(|p| {
            (is_caps_heading(p) && !is_type_caption(&p.to_uppercase()))
                || RE_NUMBERED_HEADING.is_match(p)
        })
        .take(12)
        .cloned()
        .collect()
}

/// An all-caps line of plausible caption length.
pub(crate) fn is_caps_heading(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3
        && line.chars().count() <= 60
        && letters.iter().all(|c| c.is_uppercase())
}

/// Captions that name the document kind rather than its topic.
fn is_type_caption(upper: &str) -> bool {
    matches!(
        upper,
        "OFFICE MEMORANDUM" | "CIRCULAR" | "NOTIFICATION" | "REPORT" | "ORDER" | "NOTICE"
    ) || upper.starts_with("CIRCULAR NO")
        || upper.starts_with("NOTIFICATION NO")
}

fn is_header_field(line: &str) -> bool {
    RE_SUBJECT.is_match(line) || RE_FILE_NO.is_match(line) || RE_DATE.is_match(line)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::{extract, InputFormat};

    fn text_of(s: &str) -> NormalizedText {
        extract(s.as_bytes(), InputFormat::PlainText).unwrap()
    }

    #[test]
    fn memo_caption_scores_high_and_extracts_fields() {
        let m = classify_local(&text_of("OFFICE MEMORANDUM\nNo. 123\nSubject: Test\n"));
        assert_eq!(m.document_type, DocumentType::OfficeMemorandum);
        assert!(m.confidence >= 0.75, "confidence {}", m.confidence);
        assert_eq!(m.fields.get("subject").map(String::as_str), Some("Test"));
        assert_eq!(m.fields.get("file_no").map(String::as_str), Some("123"));
        assert_eq!(m.title, "Test");
    }

    #[test]
    fn circular_caption() {
        let m = classify_local(&text_of("CIRCULAR NO. 4/2025\nSubject: Leave rules\nAll officers...\n"));
        assert_eq!(m.document_type, DocumentType::Circular);
        assert!(m.confidence >= 0.75);
    }

    #[test]
    fn legal_recitals() {
        let m = classify_local(&text_of(
            "AGREEMENT\nWHEREAS the parties hereinafter referred to as vendors agree...\n",
        ));
        assert_eq!(m.document_type, DocumentType::LegalDocument);
    }

    #[test]
    fn letter_needs_salutation_and_closing() {
        let m = classify_local(&text_of(
            "Dear Sir,\nKindly expedite the pending request.\nYours faithfully,\n(A. Clerk)\n",
        ));
        assert_eq!(m.document_type, DocumentType::Letter);
        assert_eq!(m.author, "A. Clerk");
    }

    #[test]
    fn unmarked_text_is_low_confidence_unknown() {
        let m = classify_local(&text_of("Some ordinary prose without any markers at all.\n"));
        assert_eq!(m.document_type, DocumentType::Unknown);
        assert!(m.confidence < 0.5);
        assert!(m.title.is_empty());
    }

    #[test]
    fn report_signal_stays_below_short_circuit() {
        let m = classify_local(&text_of("EXECUTIVE SUMMARY\nThe quarter closed well.\n"));
        assert_eq!(m.document_type, DocumentType::Report);
        assert!(m.confidence < 0.75);
    }

    #[test]
    fn department_and_date_extraction() {
        let m = classify_local(&text_of(
            "Ministry of Finance\nDated: 3 March 2025\nNOTIFICATION\nSubject: Revised rates\n",
        ));
        assert_eq!(m.department, "Ministry of Finance");
        assert_eq!(m.fields.get("date").map(String::as_str), Some("3 March 2025"));
        assert_eq!(m.document_type, DocumentType::Notification);
    }

    #[test]
    fn key_sections_skip_type_captions() {
        let m = classify_local(&text_of(
            "OFFICE MEMORANDUM\nBACKGROUND\n1. Scope of work\nplain text here\n",
        ));
        assert!(m.key_sections.iter().any(|s| s == "BACKGROUND"));
        assert!(m.key_sections.iter().any(|s| s == "1. Scope of work"));
        assert!(!m.key_sections.iter().any(|s| s == "OFFICE MEMORANDUM"));
    }
}
