//! Configuration types for document-to-LaTeX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`],
//! built via its [`ConversionConfigBuilder`]. Keeping every knob in one
//! struct makes it trivial to share configs across threads and to diff two
//! runs to understand why their outputs differ. The template registry and
//! the remote analyzer ride along as `Arc`s — the registry is the only
//! resource shared across runs, and it is read-only after construction.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Doc2TexError;
use crate::pipeline::template::TemplateRegistry;
use crate::remote::RemoteAnalyzer;

/// Configuration for a document-to-LaTeX conversion.
///
/// Built via [`ConversionConfig::builder()`] or
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2tex::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .local_confidence_threshold(0.8)
///     .compiler("xelatex")
///     .compile(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rule-tier confidence at or above which the remote classifier is
    /// skipped entirely. Range: 0–1. Default: 0.75.
    ///
    /// This is the cost-optimization contract: clearly marked official
    /// documents (memoranda, circulars) classify locally for free, and the
    /// remote tier only sees the ambiguous remainder.
    pub local_confidence_threshold: f32,

    /// Confidence above which the classifier's suggested template beats the
    /// document type's default template. Range: 0–1. Default: 0.5.
    ///
    /// Lower than the short-circuit threshold on purpose: trusting a
    /// template *suggestion* is cheaper to get wrong than trusting a type
    /// verdict, so a weaker signal suffices.
    pub template_override_threshold: f32,

    /// Characters of normalized text sent to the remote classifier.
    /// Default: 2000.
    ///
    /// Caps token cost per call regardless of document size; the opening of
    /// an official document carries nearly all of its type signal.
    pub excerpt_chars: usize,

    /// Deadline for each remote classifier/enhancer call, in seconds.
    /// Default: 8.
    pub remote_timeout_secs: u64,

    /// Whether the enhancement tier may rewrite content for document types
    /// that need deep restructuring. Default: true. Best-effort either way.
    pub enhancement: bool,

    /// Whether to run the external compiler after assembly. Default: true.
    /// When false the run ends with LaTeX source only.
    pub compile: bool,

    /// External compiler binary. Default: "pdflatex".
    pub compiler: String,

    /// Wall-clock timeout per compiler pass, in seconds. Default: 30.
    ///
    /// A runaway compile (corrupt input driving TeX into a loop) is killed
    /// and reported as `TimedOut`, distinct from a compile that ran and
    /// failed.
    pub compile_timeout_secs: u64,

    /// Explicit template choice. Always wins over classification.
    pub template_override: Option<String>,

    /// User-supplied metadata, field by field. Each field beats the
    /// corresponding extracted/AI value.
    pub overrides: MetadataOverrides,

    /// Remote model identifier, e.g. "gpt-4o-mini". `None` uses the
    /// analyzer's default.
    pub model: Option<String>,

    /// Pre-constructed remote analyzer. Takes precedence over environment
    /// auto-detection; the seam tests use to count calls.
    pub analyzer: Option<Arc<dyn RemoteAnalyzer>>,

    /// Template registry. Defaults to the built-in set; read-only once the
    /// config is built.
    pub registry: Arc<TemplateRegistry>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            local_confidence_threshold: 0.75,
            template_override_threshold: 0.5,
            excerpt_chars: 2000,
            remote_timeout_secs: 8,
            enhancement: true,
            compile: true,
            compiler: "pdflatex".to_string(),
            compile_timeout_secs: 30,
            template_override: None,
            overrides: MetadataOverrides::default(),
            model: None,
            analyzer: None,
            registry: Arc::new(TemplateRegistry::builtin()),
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("local_confidence_threshold", &self.local_confidence_threshold)
            .field("template_override_threshold", &self.template_override_threshold)
            .field("excerpt_chars", &self.excerpt_chars)
            .field("remote_timeout_secs", &self.remote_timeout_secs)
            .field("enhancement", &self.enhancement)
            .field("compile", &self.compile)
            .field("compiler", &self.compiler)
            .field("compile_timeout_secs", &self.compile_timeout_secs)
            .field("template_override", &self.template_override)
            .field("overrides", &self.overrides)
            .field("model", &self.model)
            .field("analyzer", &self.analyzer.as_ref().map(|_| "<dyn RemoteAnalyzer>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Explicit user metadata, one field per template concern.
///
/// Every populated field wins over the classifier's extracted value for the
/// matching slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataOverrides {
    pub title: Option<String>,
    pub author: Option<String>,
    pub department: Option<String>,
    pub classification: Option<String>,
    pub file_no: Option<String>,
    pub date: Option<String>,
}

impl MetadataOverrides {
    /// Value for a slot name, honouring slot aliases (a memo's subject is
    /// its title; a signatory is its author).
    pub fn get(&self, slot: &str) -> Option<&str> {
        let field = match slot {
            "title" | "subject" => &self.title,
            "author" | "signatory" => &self.author,
            "department" => &self.department,
            "classification" => &self.classification,
            "file_no" => &self.file_no,
            "date" => &self.date,
            _ => &None,
        };
        field.as_deref()
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn local_confidence_threshold(mut self, t: f32) -> Self {
        self.config.local_confidence_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn template_override_threshold(mut self, t: f32) -> Self {
        self.config.template_override_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn excerpt_chars(mut self, n: usize) -> Self {
        self.config.excerpt_chars = n.max(100);
        self
    }

    pub fn remote_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote_timeout_secs = secs.max(1);
        self
    }

    pub fn enhancement(mut self, v: bool) -> Self {
        self.config.enhancement = v;
        self
    }

    pub fn compile(mut self, v: bool) -> Self {
        self.config.compile = v;
        self
    }

    pub fn compiler(mut self, compiler: impl Into<String>) -> Self {
        self.config.compiler = compiler.into();
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs.max(1);
        self
    }

    pub fn template_override(mut self, id: impl Into<String>) -> Self {
        self.config.template_override = Some(id.into());
        self
    }

    pub fn overrides(mut self, overrides: MetadataOverrides) -> Self {
        self.config.overrides = overrides;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn RemoteAnalyzer>) -> Self {
        self.config.analyzer = Some(analyzer);
        self
    }

    pub fn registry(mut self, registry: Arc<TemplateRegistry>) -> Self {
        self.config.registry = registry;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Doc2TexError> {
        let c = &self.config;
        if c.compiler.trim().is_empty() {
            return Err(Doc2TexError::InvalidConfig(
                "Compiler binary name must not be empty".into(),
            ));
        }
        if c.template_override_threshold > c.local_confidence_threshold {
            return Err(Doc2TexError::InvalidConfig(format!(
                "template_override_threshold ({}) must not exceed local_confidence_threshold ({})",
                c.template_override_threshold, c.local_confidence_threshold
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.local_confidence_threshold, 0.75);
        assert_eq!(c.template_override_threshold, 0.5);
        assert_eq!(c.excerpt_chars, 2000);
        assert_eq!(c.compile_timeout_secs, 30);
        assert_eq!(c.compiler, "pdflatex");
    }

    #[test]
    fn builder_clamps_thresholds() {
        let c = ConversionConfig::builder()
            .local_confidence_threshold(7.0)
            .template_override_threshold(-1.0)
            .build()
            .unwrap();
        assert_eq!(c.local_confidence_threshold, 1.0);
        assert_eq!(c.template_override_threshold, 0.0);
    }

    #[test]
    fn empty_compiler_rejected() {
        let err = ConversionConfig::builder().compiler("  ").build().unwrap_err();
        assert!(matches!(err, Doc2TexError::InvalidConfig(_)));
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let err = ConversionConfig::builder()
            .local_confidence_threshold(0.3)
            .template_override_threshold(0.6)
            .build()
            .unwrap_err();
        assert!(matches!(err, Doc2TexError::InvalidConfig(_)));
    }

    #[test]
    fn overrides_honour_aliases() {
        let o = MetadataOverrides {
            title: Some("T".into()),
            author: Some("A".into()),
            ..Default::default()
        };
        assert_eq!(o.get("subject"), Some("T"));
        assert_eq!(o.get("signatory"), Some("A"));
        assert_eq!(o.get("file_no"), None);
        assert_eq!(o.get("nonexistent"), None);
    }
}
