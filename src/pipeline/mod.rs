//! Pipeline stages for document-to-LaTeX conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. add an extraction adapter) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ classify ──▶ template ──▶ bind ──▶ assemble ──▶ compile
//! (bytes)     (rules+LLM)  (select)    (slots)   (LaTeX)      (pdflatex ×2)
//! ```
//!
//! 1. [`extract`]    — format adapters: bytes → normalized paragraphs
//! 2. [`heuristics`] — the local rule tier of classification
//! 3. [`classify`]   — hybrid rules/remote classifier; the only stage with
//!    network I/O, always recovered
//! 4. [`template`]   — registry lookup and selection precedence
//! 5. [`bind`]       — slot filling with total escaping of untrusted text
//! 6. [`assemble`]   — pure placeholder substitution into the skeleton
//! 7. [`compile`]    — external-compiler state machine with timeouts

pub mod assemble;
pub mod bind;
pub mod classify;
pub mod compile;
pub mod extract;
pub mod heuristics;
pub mod template;
