//! Conversion entry points.
//!
//! [`convert_bytes`] is the primary API: it drives the full pipeline over
//! an in-memory document and compiles inside an isolated temporary working
//! directory, so concurrent runs never share mutable state. [`convert_file`]
//! and [`convert_to_dir`] are the filesystem-facing conveniences the CLI
//! uses; [`convert_sync`] wraps the async API for blocking callers.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::ConversionConfig;
use crate::error::Doc2TexError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::classify::{AnalysisSource, HybridClassifier};
use crate::pipeline::compile::CompilationOrchestrator;
use crate::pipeline::extract::{self, InputFormat};
use crate::pipeline::{assemble, bind, template};
use crate::remote::{OpenAiAnalyzer, RemoteAnalyzer};

/// Convert an in-memory document to LaTeX (and optionally PDF).
///
/// # Returns
/// `Ok(ConversionOutput)` whenever LaTeX source was produced — including
/// runs whose compilation failed or timed out (check `output.outcome()`).
///
/// # Errors
/// Returns `Err(Doc2TexError)` only for errors that prevent producing any
/// artifact: extraction failures, an unregistered template, or unfilled
/// required slots. Classification problems never surface here.
pub async fn convert_bytes(
    bytes: &[u8],
    format: InputFormat,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Doc2TexError> {
    let total_start = Instant::now();
    info!(format = %format, bytes = bytes.len(), "starting conversion");

    // ── Step 1: Extract and normalize text ───────────────────────────────
    let extract_start = Instant::now();
    let text = extract::extract(bytes, format)?;
    let extract_ms = extract_start.elapsed().as_millis() as u64;
    debug!(paragraphs = text.paragraphs.len(), "text extracted");

    // ── Step 2: Classify (hybrid, never fails) ───────────────────────────
    let classify_start = Instant::now();
    let classifier = HybridClassifier::new(
        resolve_analyzer(config),
        config.local_confidence_threshold,
        config.excerpt_chars,
        config.remote_timeout_secs,
    );
    let analysis = classifier.classify(&text).await;
    info!(
        document_type = %analysis.document_type,
        confidence = analysis.confidence_score,
        template = %analysis.suggested_template,
        "document classified"
    );

    // ── Step 3: Enhance content (best-effort) ────────────────────────────
    let enhanced = if config.enhancement {
        classifier.enhance(&text, &analysis).await
    } else {
        None
    };
    let classify_ms = classify_start.elapsed().as_millis() as u64;

    // ── Step 4: Select template ──────────────────────────────────────────
    let spec = template::select(
        &config.registry,
        &analysis,
        config.template_override.as_deref(),
        config.template_override_threshold,
    )?;
    info!(template = %spec.id, "template selected");

    // ── Step 5: Bind content into slots ──────────────────────────────────
    let bound = bind::bind(&text, enhanced.as_deref(), &analysis, spec, &config.overrides)?;

    // ── Step 6: Assemble LaTeX source ────────────────────────────────────
    let latex = assemble::assemble(spec, &bound);

    // ── Step 7: Compile (optional; failure is a partial success) ─────────
    let (compilation, compile_ms) = if config.compile {
        let workdir = tempfile::TempDir::new()
            .map_err(|e| Doc2TexError::Internal(format!("failed to create workdir: {e}")))?;
        let compile_start = Instant::now();
        let mut orchestrator = CompilationOrchestrator::new(
            &config.compiler,
            Duration::from_secs(config.compile_timeout_secs),
        );
        let result = orchestrator.compile(&latex, workdir.path()).await?;
        (Some(result), compile_start.elapsed().as_millis() as u64)
    } else {
        (None, 0)
    };

    let stats = ConversionStats {
        extract_ms,
        classify_ms,
        compile_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
        paragraphs: text.paragraphs.len(),
        remote_classified: analysis.source == AnalysisSource::Remote,
        enhanced: enhanced.is_some(),
        passes: compilation.as_ref().map_or(0, |c| c.passes),
    };

    info!(
        outcome = ?compilation.as_ref().map(|c| c.state),
        total_ms = stats.total_ms,
        "conversion finished"
    );

    Ok(ConversionOutput {
        latex,
        analysis,
        bound,
        enhanced,
        compilation,
        stats,
    })
}

/// Convert a document file, inferring the format from its extension.
pub async fn convert_file(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Doc2TexError> {
    let path = input_path.as_ref();
    let format = format_of(path)?;

    let bytes = fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Doc2TexError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Doc2TexError::Internal(format!("failed to read '{}': {e}", path.display()))
        }
    })?;

    convert_bytes(&bytes, format, config).await
}

/// Convert a document file into a project directory.
///
/// Writes `main.tex` (atomically), `analysis.json`, and
/// `enhanced_content.txt` when the enhancement tier ran. Compilation, when
/// enabled, runs inside the project directory so `main.pdf` and auxiliary
/// files land next to the source; a failed compile additionally leaves its
/// diagnostics in `compile.log`.
pub async fn convert_to_dir(
    input_path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Doc2TexError> {
    let out_dir = out_dir.as_ref();

    // Run the pipeline without compiling; compilation happens below, in the
    // project directory instead of a throwaway temp dir.
    let mut inner_config = config.clone();
    inner_config.compile = false;
    let mut output = convert_file(input_path, &inner_config).await?;

    fs::create_dir_all(out_dir)
        .await
        .map_err(|e| Doc2TexError::OutputWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    write_atomic(&out_dir.join("main.tex"), output.latex.as_bytes()).await?;

    if let Some(ref enhanced) = output.enhanced {
        write_atomic(&out_dir.join("enhanced_content.txt"), enhanced.as_bytes()).await?;
    }

    if config.compile {
        let compile_start = Instant::now();
        let mut orchestrator = CompilationOrchestrator::new(
            &config.compiler,
            Duration::from_secs(config.compile_timeout_secs),
        );
        let result = orchestrator.compile(&output.latex, out_dir).await?;

        if !result.success {
            write_atomic(&out_dir.join("compile.log"), result.log.as_bytes()).await?;
        }

        output.stats.compile_ms = compile_start.elapsed().as_millis() as u64;
        output.stats.total_ms += output.stats.compile_ms;
        output.stats.passes = result.passes;
        output.compilation = Some(result);
    }

    let report = serde_json::json!({
        "analysis": output.analysis,
        "stats": output.stats,
    });
    let report_bytes = serde_json::to_vec_pretty(&report)
        .map_err(|e| Doc2TexError::Internal(format!("failed to serialise analysis: {e}")))?;
    write_atomic(&out_dir.join("analysis.json"), &report_bytes).await?;

    info!(dir = %out_dir.display(), "project directory written");
    Ok(output)
}

/// Synchronous wrapper around [`convert_bytes`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    bytes: &[u8],
    format: InputFormat,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Doc2TexError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Doc2TexError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert_bytes(bytes, format, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn format_of(path: &Path) -> Result<InputFormat, Doc2TexError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    InputFormat::from_extension(ext).ok_or_else(|| Doc2TexError::UnsupportedFormat {
        format: ext.to_string(),
        detail: "no extraction adapter registered for this extension".into(),
    })
}

/// Resolve the remote analyzer, from most-specific to least-specific.
///
/// 1. **Pre-built analyzer** (`config.analyzer`) — the caller constructed
///    it entirely; used as-is. This is how tests count calls and how
///    callers add middleware.
/// 2. **Environment** — `OPENAI_API_KEY` present means the built-in
///    OpenAI-compatible analyzer, honouring `config.model`.
/// 3. **None** — classification runs on the rule tier alone. Still a valid
///    setup: the pipeline degrades, it never demands a key.
fn resolve_analyzer(config: &ConversionConfig) -> Option<Arc<dyn RemoteAnalyzer>> {
    if let Some(ref analyzer) = config.analyzer {
        return Some(Arc::clone(analyzer));
    }

    match OpenAiAnalyzer::from_env(config.model.as_deref(), config.remote_timeout_secs) {
        Some(analyzer) => Some(Arc::new(analyzer)),
        None => {
            debug!("no remote analyzer configured; classification uses the rule tier only");
            None
        }
    }
}

/// Atomic write: temp file in the same directory, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Doc2TexError> {
    let failed = |e: std::io::Error| Doc2TexError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes).await.map_err(failed)?;
    if let Err(e) = fs::rename(&tmp_path, path).await {
        // Best-effort cleanup of the orphaned temp file.
        let _ = fs::remove_file(&tmp_path).await;
        warn!(path = %path.display(), "atomic rename failed");
        return Err(failed(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_inference_from_path() {
        assert!(matches!(
            format_of(Path::new("a/b/c.txt")),
            Ok(InputFormat::PlainText)
        ));
        assert!(matches!(format_of(Path::new("x.DOCX")), Ok(InputFormat::Docx)));
        assert!(matches!(format_of(Path::new("x.pdf")), Ok(InputFormat::Pdf)));
        assert!(matches!(
            format_of(Path::new("x.odt")),
            Err(Doc2TexError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            format_of(Path::new("noextension")),
            Err(Doc2TexError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn missing_input_file_is_typed() {
        let err = convert_file("definitely/not/here.txt", &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Doc2TexError::FileNotFound { .. }), "got {err:?}");
    }
}
