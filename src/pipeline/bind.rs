//! Content binding: fill a template's slots from text, analysis, and
//! user-supplied metadata.
//!
//! Per-field precedence, applied slot by slot:
//!
//! 1. explicit user override,
//! 2. value extracted by the classifier (header fields, then the analysis
//!    metadata itself),
//! 3. the slot's static default (raw LaTeX, inserted verbatim).
//!
//! Everything from tiers 1 and 2 passes through [`escape_latex`] — user and
//! AI text is untrusted markup-wise, and a single stray `%` or `{` breaks
//! the compile. Escaping is total: every reserved character maps to a
//! command that renders the original glyph, so no character is ever
//! dropped.
//!
//! Required slots with no value at any tier fail the run with one batch
//! error listing every gap, rather than silently rendering blank regions.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MetadataOverrides;
use crate::error::Doc2TexError;
use crate::pipeline::classify::DocumentAnalysis;
use crate::pipeline::extract::NormalizedText;
use crate::pipeline::heuristics::is_caps_heading;
use crate::pipeline::template::TemplateSpec;

/// A template with every slot resolved to a LaTeX fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundDocument {
    pub template_id: String,
    pub slots: BTreeMap<String, String>,
}

/// Escape LaTeX-reserved characters in untrusted text.
///
/// Character-by-character, so ordering hazards (escaping the backslashes
/// introduced by earlier replacements) cannot arise.
pub fn escape_latex(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str(r"\textbackslash{}"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '#' => out.push_str(r"\#"),
            '$' => out.push_str(r"\$"),
            '%' => out.push_str(r"\%"),
            '&' => out.push_str(r"\&"),
            '_' => out.push_str(r"\_"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            _ => out.push(ch),
        }
    }
    out
}

/// Bind extracted text and metadata into the template's slot structure.
///
/// `enhanced` carries the remote tier's restructured text when enhancement
/// ran; the original normalized text is used otherwise.
///
/// # Errors
/// [`Doc2TexError::MissingRequiredFields`] listing every unfilled required
/// slot at once.
pub fn bind(
    text: &NormalizedText,
    enhanced: Option<&str>,
    analysis: &DocumentAnalysis,
    spec: &TemplateSpec,
    overrides: &MetadataOverrides,
) -> Result<BoundDocument, Doc2TexError> {
    let mut slots = BTreeMap::new();
    let mut missing = Vec::new();

    for slot in &spec.slots {
        let value = if slot.name == "body" {
            Some(render_body(text, enhanced))
        } else {
            resolve_slot(&slot.name, analysis, overrides)
        };

        match value {
            Some(v) => {
                slots.insert(slot.name.clone(), v);
            }
            None => match &slot.default {
                Some(default) => {
                    slots.insert(slot.name.clone(), default.clone());
                }
                None if slot.required => missing.push(slot.name.clone()),
                None => {}
            },
        }
    }

    if !missing.is_empty() {
        return Err(Doc2TexError::MissingRequiredFields {
            template: spec.id.clone(),
            fields: missing,
        });
    }

    debug!(template = %spec.id, slots = slots.len(), "document bound");

    Ok(BoundDocument {
        template_id: spec.id.clone(),
        slots,
    })
}

/// Resolve a metadata slot through the precedence chain, escaping the
/// result. Empty strings count as absent at every tier.
fn resolve_slot(
    name: &str,
    analysis: &DocumentAnalysis,
    overrides: &MetadataOverrides,
) -> Option<String> {
    let non_empty = |s: &str| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_string())
    };

    if let Some(v) = overrides.get(name).and_then(|s| non_empty(s)) {
        return Some(escape_latex(&v));
    }
    if let Some(v) = analysis.fields.get(name).and_then(|s| non_empty(s)) {
        return Some(escape_latex(&v));
    }

    let from_analysis = match name {
        "title" | "subject" => non_empty(&analysis.title),
        "author" | "signatory" => non_empty(&analysis.author),
        "department" => non_empty(&analysis.department),
        "classification" => non_empty(&analysis.classification),
        "summary" | "abstract" => non_empty(&analysis.summary),
        "keywords" => non_empty(&analysis.key_sections.join(", ")),
        _ => None,
    };
    from_analysis.map(|v| escape_latex(&v))
}

// ── Body rendering ───────────────────────────────────────────────────────

static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*\.?\s+[A-Z][^.]{2,58}$").unwrap());
static RE_HEADER_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:f\.\s*no\.?|file\s*no\.?|no\.|dated?\s*[:\-])").unwrap());
static RE_SIGNATURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\([^()]{2,48}\)$").unwrap());

/// Turn paragraphs into a LaTeX body using document-structure heuristics.
///
/// All-caps captions become sections, numbered captions subsections,
/// `No. …`/`Dated: …` header lines bold, short parenthesized lines italic
/// signature lines, everything else an escaped paragraph.
fn render_body(text: &NormalizedText, enhanced: Option<&str>) -> String {
    let owned: Vec<String>;
    let paragraphs: &[String] = match enhanced {
        Some(e) => {
            owned = e
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            &owned
        }
        None => &text.paragraphs,
    };

    let mut blocks = Vec::with_capacity(paragraphs.len());
    for para in paragraphs {
        blocks.push(render_paragraph(para));
    }
    blocks.join("\n\n")
}

fn render_paragraph(para: &str) -> String {
    let escaped = escape_latex(para);
    if is_caps_heading(para) && para.chars().count() > 10 {
        format!(r"\section{{{escaped}}}")
    } else if RE_NUMBERED_HEADING.is_match(para) {
        format!(r"\subsection{{{escaped}}}")
    } else if RE_HEADER_FIELD.is_match(para) {
        format!(r"\textbf{{{escaped}}}")
    } else if RE_SIGNATURE.is_match(para) {
        format!("\\vspace{{1em}}\n\\textit{{{escaped}}}")
    } else {
        escaped
    }
}
