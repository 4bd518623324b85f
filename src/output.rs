//! Output types for document-to-LaTeX conversion.
//!
//! A run that reaches assembly always yields LaTeX source; the compiled
//! artifact has its own independent success state. That split gives three
//! observable outcomes:
//!
//! * **Complete** — source plus a compiled PDF;
//! * **SourceOnly** — source plus compiler diagnostics (or compilation was
//!   disabled); the caller can retry compilation later without redoing the
//!   pipeline;
//! * hard failure — `Err(Doc2TexError)` from the `convert*` entry points,
//!   no artifacts.

use serde::{Deserialize, Serialize};

use crate::pipeline::bind::BoundDocument;
use crate::pipeline::classify::DocumentAnalysis;
use crate::pipeline::compile::CompilationResult;

/// Observable outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// LaTeX source and compiled PDF both produced.
    Complete,
    /// LaTeX source produced; no PDF (compile failed, timed out, or was
    /// disabled).
    SourceOnly,
}

/// Everything a finished conversion run produced.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Assembled LaTeX source.
    pub latex: String,
    /// The classifier's verdict, for display and audit.
    pub analysis: DocumentAnalysis,
    /// The filled slot structure the source was rendered from.
    pub bound: BoundDocument,
    /// Remote-restructured text, when the enhancement tier ran.
    pub enhanced: Option<String>,
    /// Compiler verdict; `None` when compilation was disabled.
    pub compilation: Option<CompilationResult>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    pub fn outcome(&self) -> RunOutcome {
        match &self.compilation {
            Some(c) if c.success => RunOutcome::Complete,
            _ => RunOutcome::SourceOnly,
        }
    }

    /// Compiled document bytes, when the run completed fully.
    pub fn pdf(&self) -> Option<&[u8]> {
        self.compilation
            .as_ref()
            .and_then(|c| c.pdf.as_deref())
            .filter(|b| !b.is_empty())
    }
}

/// Timing and tier usage for one conversion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub extract_ms: u64,
    pub classify_ms: u64,
    pub compile_ms: u64,
    pub total_ms: u64,
    /// Paragraphs the extractor produced.
    pub paragraphs: usize,
    /// Whether the remote tier produced the final analysis.
    pub remote_classified: bool,
    /// Whether the enhancement tier rewrote the content.
    pub enhanced: bool,
    /// Compiler passes that ran (0 when compilation was disabled).
    pub passes: u32,
}
