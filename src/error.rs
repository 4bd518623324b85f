//! Error types for the doc2tex library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Doc2TexError`] — **Fatal**: the conversion cannot proceed at all
//!   (unsupported input format, unreadable document, unregistered template,
//!   unfilled required slots). Returned as `Err(Doc2TexError)` from the
//!   top-level `convert*` functions.
//!
//! * [`RemoteError`] — **Non-fatal**: the remote classifier/enhancer call
//!   failed (transport, timeout, bad JSON). The classifier catches every
//!   `RemoteError`, logs it, and falls back to the local rule tier, so a
//!   remote outage never aborts a run.
//!
//! Compilation failures are a third category and deliberately neither of
//! these: the compiler's verdict lives in
//! [`crate::pipeline::compile::CompilationResult`] so the already-assembled
//! LaTeX source survives a failed or timed-out compile as a partial success.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doc2tex library.
#[derive(Debug, Error)]
pub enum Doc2TexError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// No extraction adapter exists for the declared format, or the bytes
    /// do not match the declared format's signature.
    #[error("Unsupported input format '{format}': {detail}")]
    UnsupportedFormat { format: String, detail: String },

    /// The adapter ran but could not produce any text.
    #[error("Could not extract text from {format} input: {detail}")]
    CorruptInput { format: String, detail: String },

    // ── Template/binding errors ───────────────────────────────────────────
    /// The resolved template identifier has no registered spec.
    ///
    /// This is a configuration error, not a classification error: the
    /// registry is fixed at startup, so an unknown id means a bad override
    /// or an unvalidated suggestion, never bad input.
    #[error("No template registered under id '{id}'.\nKnown templates: {}", .known.join(", "))]
    UnknownTemplate { id: String, known: Vec<String> },

    /// One or more required slots could not be filled.
    ///
    /// Lists every unfilled slot at once so the caller can correct all gaps
    /// in a single round trip.
    #[error("Template '{template}' is missing required fields: {}", .fields.join(", "))]
    MissingRequiredFields {
        template: String,
        fields: Vec<String>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error from the remote classifier/enhancer.
///
/// Always caught inside [`crate::pipeline::classify`]; never propagated out
/// of the pipeline as a run failure.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Connection-level failure (DNS, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded the configured deadline.
    #[error("remote call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The API answered with a non-success status.
    #[error("remote API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not contain parseable structured output.
    #[error("malformed remote response: {0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_lists_all() {
        let e = Doc2TexError::MissingRequiredFields {
            template: "government_memo".into(),
            fields: vec!["subject".into(), "body".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("subject, body"), "got: {msg}");
        assert!(msg.contains("government_memo"));
    }

    #[test]
    fn unknown_template_names_registry() {
        let e = Doc2TexError::UnknownTemplate {
            id: "fancy".into(),
            known: vec!["basic".into(), "government_memo".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("'fancy'"));
        assert!(msg.contains("basic, government_memo"));
    }

    #[test]
    fn unsupported_format_display() {
        let e = Doc2TexError::UnsupportedFormat {
            format: "pdf".into(),
            detail: "magic bytes do not match".into(),
        };
        assert!(e.to_string().contains("pdf"));
    }

    #[test]
    fn remote_timeout_display() {
        let e = RemoteError::Timeout { secs: 8 };
        assert!(e.to_string().contains("8s"));
    }
}
