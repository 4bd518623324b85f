//! # doc2tex
//!
//! Convert office documents (plain text, DOCX, PDF) into formatted
//! LaTeX/PDF output, selecting a document template via hybrid
//! rule-based/LLM classification.
//!
//! ## Why this crate?
//!
//! Institutional documents arrive as loosely formatted text but must leave
//! as rigidly formatted official output — memoranda, circulars,
//! notifications, reports, each with its own fixed layout. Instead of
//! asking an LLM to typeset entire documents, this crate classifies the
//! document (cheap rules first, remote model only when the rules are
//! unsure), binds the extracted content into a fixed LaTeX template, and
//! drives the system TeX compiler with timeouts and structured error
//! capture.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Extract   bytes → normalized paragraphs (TXT / DOCX / PDF)
//!  ├─ 2. Classify  keyword rules; remote LLM only below the confidence
//!  │               threshold, with rule-tier fallback on any failure
//!  ├─ 3. Select    document type + confidence → template spec
//!  ├─ 4. Bind      user overrides > extracted values > slot defaults,
//!  │               total LaTeX escaping of untrusted text
//!  ├─ 5. Assemble  slots + styling → LaTeX source
//!  └─ 6. Compile   pdflatex ×2 (cross-references), 30 s/pass timeout
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2tex::{convert_bytes, ConversionConfig, InputFormat, RunOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Remote classifier auto-detected from OPENAI_API_KEY; without a
//!     // key the rule tier classifies alone.
//!     let config = ConversionConfig::default();
//!     let document = std::fs::read("memo.txt")?;
//!     let output = convert_bytes(&document, InputFormat::PlainText, &config).await?;
//!
//!     println!("{}", output.latex);
//!     match output.outcome() {
//!         RunOutcome::Complete => eprintln!("PDF: {} bytes", output.pdf().unwrap().len()),
//!         RunOutcome::SourceOnly => eprintln!("source only — see compiler diagnostics"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Outcomes
//!
//! A run ends one of three ways:
//!
//! | Outcome | Source | PDF | How |
//! |---------|--------|-----|-----|
//! | Complete | ✓ | ✓ | both passes succeeded, artifact on disk |
//! | Source only | ✓ | ✗ | compile failed/timed out/disabled — diagnostics attached |
//! | Hard failure | ✗ | ✗ | `Err`: extraction, unknown template, missing required fields |
//!
//! Classification is never a failure mode: remote errors degrade to the
//! local rule verdict, and a confidence of 0 is a valid result.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2tex` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doc2tex = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod remote;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, MetadataOverrides};
pub use convert::{convert_bytes, convert_file, convert_sync, convert_to_dir};
pub use error::{Doc2TexError, RemoteError};
pub use output::{ConversionOutput, ConversionStats, RunOutcome};
pub use pipeline::bind::{escape_latex, BoundDocument};
pub use pipeline::classify::{AnalysisSource, DocumentAnalysis, DocumentType, HybridClassifier};
pub use pipeline::compile::{CompilationOrchestrator, CompilationResult, CompileState};
pub use pipeline::extract::{InputFormat, NormalizedText, TextEncoding};
pub use pipeline::template::{TemplateRegistry, TemplateSpec};
pub use remote::{OpenAiAnalyzer, RemoteAnalysis, RemoteAnalyzer};
