//! LaTeX assembly: substitute bound slots and styling into the skeleton.
//!
//! Pure and deterministic — the same spec and bound document always yield
//! the same source, and nothing here touches the filesystem or network.
//! A single regex pass resolves every `[[placeholder]]`: `style:*` keys
//! read the spec's styling parameters, anything else reads the bound slot
//! map. Unbound optional slots render empty; the binder has already
//! guaranteed that required slots exist.
//!
//! The closure-based `replace_all` is deliberate: replacement strings here
//! are full LaTeX fragments, and closure replacements are inserted
//! literally, so `\section`, `$` and friends survive untouched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::pipeline::bind::BoundDocument;
use crate::pipeline::template::TemplateSpec;

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([a-z_]+(?::[a-z_]+)?)\]\]").unwrap());

/// Render the final LaTeX source for a bound document.
pub fn assemble(spec: &TemplateSpec, bound: &BoundDocument) -> String {
    let source = RE_PLACEHOLDER
        .replace_all(&spec.skeleton, |caps: &Captures<'_>| {
            let key = &caps[1];
            match key.strip_prefix("style:") {
                Some(style_key) => style_value(spec, style_key),
                None => bound.slots.get(key).cloned().unwrap_or_default(),
            }
        })
        .to_string();

    debug!(template = %spec.id, bytes = source.len(), "source assembled");
    source
}

fn style_value(spec: &TemplateSpec, key: &str) -> String {
    let s = &spec.styling;
    match key {
        "primary" => s.primary_color.clone(),
        "accent" => s.accent_color.clone(),
        "margin_top" => s.margins.top.clone(),
        "margin_bottom" => s.margins.bottom.clone(),
        "margin_left" => s.margins.left.clone(),
        "margin_right" => s.margins.right.clone(),
        "font_pt" => s.base_font_pt.to_string(),
        // Unknown style keys render empty rather than leaking the marker
        // into the compiled document.
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::template::TemplateRegistry;
    use std::collections::BTreeMap;

    fn bound_for(spec_id: &str, pairs: &[(&str, &str)]) -> BoundDocument {
        BoundDocument {
            template_id: spec_id.to_string(),
            slots: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn substitutes_slots_and_styling() {
        let registry = TemplateRegistry::builtin();
        let spec = registry.get("government_memo").unwrap();
        let bound = bound_for(
            "government_memo",
            &[
                ("doc_kind", "OFFICE MEMORANDUM"),
                ("department", "Ministry of Finance"),
                ("file_no", "42/2025"),
                ("date", r"\today"),
                ("classification", "Public"),
                ("subject", "Test"),
                ("body", "Body paragraph."),
                ("signatory", "A. Officer"),
            ],
        );

        let source = assemble(spec, &bound);
        assert!(source.contains(r"\documentclass[11pt,a4paper]{article}"));
        assert!(source.contains(r"\textbf{Subject: }Test"));
        assert!(source.contains("Body paragraph."));
        assert!(source.contains(r"\definecolor{primary}{HTML}{FF9933}"));
        assert!(source.contains("top=2.5cm"));
        assert!(source.contains("left=3cm"));
        assert!(!source.contains("[["), "unresolved placeholder in:\n{source}");
    }

    #[test]
    fn replacement_is_literal_not_regex_expansion() {
        let registry = TemplateRegistry::builtin();
        let spec = registry.get("basic").unwrap();
        let bound = bound_for(
            "basic",
            &[
                ("title", r"Cost \$100"),
                ("author", "~"),
                ("date", r"\today"),
                ("body", r"A \section{B} with $x^2$ and \\ breaks"),
            ],
        );
        let source = assemble(spec, &bound);
        assert!(source.contains(r"A \section{B} with $x^2$ and \\ breaks"));
        assert!(source.contains(r"Cost \$100"));
    }

    #[test]
    fn missing_optional_slot_renders_empty() {
        let registry = TemplateRegistry::builtin();
        let spec = registry.get("basic").unwrap();
        let bound = bound_for("basic", &[("body", "x")]);
        let source = assemble(spec, &bound);
        assert!(source.contains(r"\title{}"));
        assert!(!source.contains("[["));
    }

    #[test]
    fn every_builtin_template_assembles_clean() {
        let registry = TemplateRegistry::builtin();
        for spec in registry.iter() {
            let bound = BoundDocument {
                template_id: spec.id.clone(),
                slots: spec
                    .slots
                    .iter()
                    .map(|s| (s.name.clone(), format!("value-{}", s.name)))
                    .collect::<BTreeMap<_, _>>(),
            };
            let source = assemble(spec, &bound);
            assert!(
                !source.contains("[["),
                "template {} left a placeholder:\n{source}",
                spec.id
            );
            assert!(source.contains(r"\begin{document}"));
            assert!(source.contains(r"\end{document}"));
        }
    }
}
