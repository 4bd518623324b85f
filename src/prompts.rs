//! Prompts for the remote classification and enhancement tiers.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the allowed document types and template
//!    identifiers the model may emit are enumerated in exactly one place,
//!    derived from the same enums and registry the pipeline enforces.
//!
//! 2. **Testability** — unit tests inspect prompts directly without a live
//!    provider, so a type added to [`DocumentType`] that is missing from
//!    the prompt is caught immediately.

use crate::pipeline::classify::{DocumentAnalysis, DocumentType};
use crate::pipeline::template::BUILTIN_TEMPLATE_IDS;

/// System prompt for the classification call.
pub const CLASSIFY_SYSTEM_PROMPT: &str = "You are an expert in institutional and government \
document classification. You analyse documents according to official correspondence standards \
and respond with precise, schema-conforming JSON. Focus on accurate document type detection \
and metadata extraction.";

/// System prompt for the enhancement call.
pub const ENHANCE_SYSTEM_PROMPT: &str = "You are an expert in official document drafting and \
formatting standards. You restructure document text to meet formal presentation standards \
while preserving its meaning exactly.";

/// Build the user prompt for document classification.
///
/// The excerpt is already bounded by the caller; this function never grows
/// it. The JSON shape mirrors [`crate::remote::RemoteAnalysis`] field for
/// field.
pub fn classification_prompt(excerpt: &str) -> String {
    let types = DocumentType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let templates = BUILTIN_TEMPLATE_IDS.join(", ");

    format!(
        r#"Analyse the following document text and reply with a single JSON object, no commentary.

Document text:
"""
{excerpt}
"""

Reply in exactly this JSON shape:
{{
  "document_type": "one of: {types}",
  "title": "extracted or inferred document title",
  "author": "signatory or issuing officer, empty string if not stated",
  "department": "issuing department or institution, empty string if not stated",
  "classification": "one of: Public, Restricted, Confidential, Secret",
  "summary": "one or two sentence summary",
  "key_sections": ["main", "section", "headings"],
  "suggested_template": "one of: {templates}",
  "confidence_score": 0.0
}}

Set confidence_score to your certainty in document_type, between 0 and 1.
Do not invent metadata: leave fields empty rather than guessing."#
    )
}

/// Build the user prompt for the content enhancement call.
pub fn enhancement_prompt(text: &str, analysis: &DocumentAnalysis) -> String {
    format!(
        r#"Restructure the following {doc_type} for formal presentation.

Current title: {title}
Department: {department}

Original text:
"""
{text}
"""

Improve structure and hierarchy: put section headings on their own lines, keep header
fields (file number, date, subject) as separate lines, and use formal register throughout.
Preserve the original content and meaning exactly. Reply with plain restructured text only —
no markup, no commentary."#,
        doc_type = analysis.document_type,
        title = analysis.title,
        department = analysis.department,
    )
}
