//! Hybrid document classification: local rules first, remote LLM second.
//!
//! The two tiers are an explicit strategy, not scattered conditionals:
//!
//! ```text
//! rule tier ──▶ confident? ──yes──▶ return local analysis (no remote call)
//!                  │no
//!                  ▼
//!            remote tier ──ok──▶ merged analysis
//!                  │error/timeout/bad JSON
//!                  ▼
//!            local analysis (fallback)
//! ```
//!
//! Two contracts hold unconditionally:
//!
//! * **Cost contract** — when the rule tier's confidence clears the
//!   threshold, the remote analyzer is never invoked. Verified by
//!   call-count tests against a mock analyzer.
//! * **Totality contract** — `classify` always returns an analysis.
//!   Remote failures are logged and recovered; a confidence of 0 is a
//!   valid low-trust result, not an error.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::pipeline::extract::NormalizedText;
use crate::pipeline::heuristics::{self, RuleMatch};
use crate::pipeline::template::default_template_for;
use crate::remote::{RemoteAnalysis, RemoteAnalyzer};

/// Closed set of recognised document categories.
///
/// Adding a variant forces the template selector's exhaustive match to be
/// updated — there is no silent fallthrough for new categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    OfficeMemorandum,
    Circular,
    Notification,
    ResearchPaper,
    Report,
    Letter,
    PolicyDocument,
    TenderDocument,
    AcademicPaper,
    LegalDocument,
    FinancialReport,
    Unknown,
}

impl DocumentType {
    pub const ALL: [DocumentType; 12] = [
        DocumentType::OfficeMemorandum,
        DocumentType::Circular,
        DocumentType::Notification,
        DocumentType::ResearchPaper,
        DocumentType::Report,
        DocumentType::Letter,
        DocumentType::PolicyDocument,
        DocumentType::TenderDocument,
        DocumentType::AcademicPaper,
        DocumentType::LegalDocument,
        DocumentType::FinancialReport,
        DocumentType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::OfficeMemorandum => "office_memorandum",
            DocumentType::Circular => "circular",
            DocumentType::Notification => "notification",
            DocumentType::ResearchPaper => "research_paper",
            DocumentType::Report => "report",
            DocumentType::Letter => "letter",
            DocumentType::PolicyDocument => "policy_document",
            DocumentType::TenderDocument => "tender_document",
            DocumentType::AcademicPaper => "academic_paper",
            DocumentType::LegalDocument => "legal_document",
            DocumentType::FinancialReport => "financial_report",
            DocumentType::Unknown => "unknown",
        }
    }

    /// Types whose source text usually needs deep restructuring before it
    /// binds well into a template.
    pub fn needs_restructuring(&self) -> bool {
        matches!(
            self,
            DocumentType::LegalDocument | DocumentType::PolicyDocument | DocumentType::Unknown
        )
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or(())
    }
}

/// Which tier produced the analysis. Kept for audit output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Rules,
    Remote,
}

/// Typed result of document classification.
///
/// Produced once per run and immutable afterwards; consumed by the template
/// selector and the content binder. String fields are empty (not defaulted)
/// when no tier could determine them — slot defaults are a template concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub document_type: DocumentType,
    pub title: String,
    pub author: String,
    pub department: String,
    /// Classification label (Public, Restricted, Confidential, Secret).
    pub classification: String,
    pub summary: String,
    pub key_sections: Vec<String>,
    pub suggested_template: String,
    /// Certainty in `document_type`, always within [0, 1].
    pub confidence_score: f32,
    /// Slot-level header values extracted by either tier (subject, file_no,
    /// date).
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub source: AnalysisSource,
}

impl DocumentAnalysis {
    fn from_rules(m: RuleMatch) -> Self {
        DocumentAnalysis {
            suggested_template: default_template_for(m.document_type).to_string(),
            document_type: m.document_type,
            title: m.title,
            author: m.author,
            department: m.department,
            classification: String::new(),
            summary: m.summary,
            key_sections: m.key_sections,
            confidence_score: m.confidence.clamp(0.0, 1.0),
            fields: m.fields,
            source: AnalysisSource::Rules,
        }
    }
}

/// Two-tier classifier. See the module docs for the decision diagram.
pub struct HybridClassifier {
    analyzer: Option<Arc<dyn RemoteAnalyzer>>,
    local_threshold: f32,
    excerpt_chars: usize,
    remote_timeout: Duration,
}

impl HybridClassifier {
    pub fn new(
        analyzer: Option<Arc<dyn RemoteAnalyzer>>,
        local_threshold: f32,
        excerpt_chars: usize,
        remote_timeout_secs: u64,
    ) -> Self {
        HybridClassifier {
            analyzer,
            local_threshold,
            excerpt_chars,
            remote_timeout: Duration::from_secs(remote_timeout_secs),
        }
    }

    /// Classify the document. Infallible by contract.
    pub async fn classify(&self, text: &NormalizedText) -> DocumentAnalysis {
        let local = heuristics::classify_local(text);
        debug!(
            document_type = %local.document_type,
            confidence = local.confidence,
            "rule tier verdict"
        );

        if local.confidence >= self.local_threshold {
            info!(
                document_type = %local.document_type,
                confidence = local.confidence,
                "rule tier confident, skipping remote classifier"
            );
            return DocumentAnalysis::from_rules(local);
        }

        let Some(analyzer) = &self.analyzer else {
            debug!("no remote analyzer configured, using rule tier result");
            return DocumentAnalysis::from_rules(local);
        };

        let excerpt = text.excerpt(self.excerpt_chars);
        match timeout(self.remote_timeout, analyzer.analyze(&excerpt)).await {
            Ok(Ok(remote)) => match merge_remote(remote, &local) {
                Some(analysis) => {
                    info!(
                        document_type = %analysis.document_type,
                        confidence = analysis.confidence_score,
                        "remote classifier verdict"
                    );
                    analysis
                }
                None => {
                    warn!("remote classifier returned an unrecognised document type, using rule tier result");
                    DocumentAnalysis::from_rules(local)
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "remote classification failed, using rule tier result");
                DocumentAnalysis::from_rules(local)
            }
            Err(_) => {
                warn!(
                    secs = self.remote_timeout.as_secs(),
                    "remote classification timed out, using rule tier result"
                );
                DocumentAnalysis::from_rules(local)
            }
        }
    }

    /// Best-effort content restructuring for types that need it.
    ///
    /// Returns `None` when enhancement does not apply, no analyzer is
    /// configured, or the remote call fails — the caller proceeds with the
    /// unenhanced text in every one of those cases.
    pub async fn enhance(
        &self,
        text: &NormalizedText,
        analysis: &DocumentAnalysis,
    ) -> Option<String> {
        if !needs_enhancement(text, analysis) {
            return None;
        }
        let analyzer = self.analyzer.as_ref()?;

        match timeout(self.remote_timeout, analyzer.enhance(&text.full_text(), analysis)).await {
            Ok(Ok(enhanced)) if !enhanced.trim().is_empty() => {
                info!(chars = enhanced.len(), "content enhancement applied");
                Some(enhanced)
            }
            Ok(Ok(_)) => {
                warn!("enhancement returned empty content, keeping original text");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "enhancement failed, keeping original text");
                None
            }
            Err(_) => {
                warn!("enhancement timed out, keeping original text");
                None
            }
        }
    }
}

/// Complexity indicators that make straight rule-based binding inadequate.
pub fn needs_enhancement(text: &NormalizedText, analysis: &DocumentAnalysis) -> bool {
    analysis.document_type.needs_restructuring()
        || analysis.confidence_score < 0.7
        || text.char_len() > 12_000
}

/// Fold a remote verdict over the local one.
///
/// Remote wins on every field it filled; rule-extracted header fields are
/// kept because the remote schema does not carry them. Returns `None` when
/// the remote document type is not in the closed set — that response is
/// malformed under the requested schema, and malformed responses fall back.
fn merge_remote(remote: RemoteAnalysis, local: &RuleMatch) -> Option<DocumentAnalysis> {
    let document_type = DocumentType::from_str(remote.document_type.trim()).ok()?;

    let pick = |r: Option<String>, l: &str| {
        r.filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| l.to_string())
    };

    let suggested_template = remote
        .suggested_template
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_template_for(document_type).to_string());

    Some(DocumentAnalysis {
        document_type,
        title: pick(remote.title, &local.title),
        author: pick(remote.author, &local.author),
        department: pick(remote.department, &local.department),
        classification: remote.classification.unwrap_or_default(),
        summary: pick(remote.summary, &local.summary),
        key_sections: if remote.key_sections.is_empty() {
            local.key_sections.clone()
        } else {
            remote.key_sections
        },
        suggested_template,
        confidence_score: remote.confidence_score.clamp(0.0, 1.0),
        fields: local.fields.clone(),
        source: AnalysisSource::Remote,
    })
}
