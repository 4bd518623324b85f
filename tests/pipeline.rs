//! Integration tests for the conversion pipeline.
//!
//! The remote classifier is a counting mock and the external compiler is a
//! shell-script stand-in, so every test here runs hermetically — no API
//! keys, no TeX installation. Script-based compiler tests are unix-only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use doc2tex::{
    convert_bytes, convert_to_dir, CompilationOrchestrator, CompileState, ConversionConfig,
    DocumentAnalysis, DocumentType, HybridClassifier, InputFormat, RemoteAnalysis, RemoteAnalyzer,
    RemoteError, RunOutcome,
};

const MEMO_TEXT: &[u8] = b"OFFICE MEMORANDUM\nNo. 123\nSubject: Test\n";

// ── Mock remote analyzer ─────────────────────────────────────────────────────

/// Counting mock: `response = None` simulates a remote outage.
struct MockAnalyzer {
    analyze_calls: AtomicUsize,
    response: Option<RemoteAnalysis>,
}

impl MockAnalyzer {
    fn failing() -> Arc<Self> {
        Arc::new(MockAnalyzer {
            analyze_calls: AtomicUsize::new(0),
            response: None,
        })
    }

    fn answering(response: RemoteAnalysis) -> Arc<Self> {
        Arc::new(MockAnalyzer {
            analyze_calls: AtomicUsize::new(0),
            response: Some(response),
        })
    }

    fn calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteAnalyzer for MockAnalyzer {
    async fn analyze(&self, _excerpt: &str) -> Result<RemoteAnalysis, RemoteError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Some(r) => Ok(r.clone()),
            None => Err(RemoteError::Transport("mock outage".into())),
        }
    }

    async fn enhance(
        &self,
        _text: &str,
        _analysis: &DocumentAnalysis,
    ) -> Result<String, RemoteError> {
        Err(RemoteError::Transport("mock outage".into()))
    }
}

fn extract_text(bytes: &[u8]) -> doc2tex::NormalizedText {
    doc2tex::pipeline::extract::extract(bytes, InputFormat::PlainText).unwrap()
}

// ── Classifier contracts ─────────────────────────────────────────────────────

#[tokio::test]
async fn confident_rule_tier_never_calls_remote() {
    let mock = MockAnalyzer::failing();
    let classifier = HybridClassifier::new(Some(mock.clone()), 0.75, 2000, 5);

    let analysis = classifier.classify(&extract_text(MEMO_TEXT)).await;

    assert_eq!(analysis.document_type, DocumentType::OfficeMemorandum);
    assert!(analysis.confidence_score >= 0.75);
    assert_eq!(mock.calls(), 0, "remote tier must not be consulted");
}

#[tokio::test]
async fn remote_failure_falls_back_to_rule_verdict() {
    let ambiguous = b"Some ordinary prose without any structural markers.\n";
    let mock = MockAnalyzer::failing();

    let with_remote = HybridClassifier::new(Some(mock.clone()), 0.75, 2000, 5);
    let rules_only = HybridClassifier::new(None, 0.75, 2000, 5);

    let fallback = with_remote.classify(&extract_text(ambiguous)).await;
    let local = rules_only.classify(&extract_text(ambiguous)).await;

    assert_eq!(mock.calls(), 1, "ambiguous text must consult the remote tier");
    assert_eq!(fallback, local, "fallback must equal the rule-tier result");
    assert!(fallback.confidence_score >= 0.0 && fallback.confidence_score <= 1.0);
}

#[tokio::test]
async fn remote_verdict_wins_below_threshold() {
    let ambiguous = b"Some ordinary prose without any structural markers.\n";
    let mock = MockAnalyzer::answering(RemoteAnalysis {
        document_type: "policy_document".into(),
        title: Some("Remote Work Policy".into()),
        author: None,
        department: None,
        classification: Some("Restricted".into()),
        summary: None,
        key_sections: vec![],
        suggested_template: None,
        confidence_score: 0.85,
    });
    let classifier = HybridClassifier::new(Some(mock.clone()), 0.75, 2000, 5);

    let analysis = classifier.classify(&extract_text(ambiguous)).await;

    assert_eq!(mock.calls(), 1);
    assert_eq!(analysis.document_type, DocumentType::PolicyDocument);
    assert_eq!(analysis.title, "Remote Work Policy");
    assert_eq!(analysis.suggested_template, "government_circular");
    assert!(analysis.confidence_score <= 1.0);
}

// ── Mock compilers ───────────────────────────────────────────────────────────

#[cfg(unix)]
fn write_script(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("mock-latex.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Emulates reference resolution: the first pass writes the aux data and an
/// artifact with unresolved marks; only a pass that finds the aux file
/// produces resolved references.
#[cfg(unix)]
const TWO_PASS_SCRIPT: &str = r#"if [ -f main.aux ]; then
  printf 'refs:resolved' > main.pdf
else
  printf 'refs:??' > main.pdf
  cp main.pdf pass1.pdf
  touch main.aux
fi
echo "mock pass complete"
"#;

#[cfg(unix)]
#[tokio::test]
async fn forward_references_resolve_on_second_pass() {
    let scripts = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let compiler = write_script(scripts.path(), TWO_PASS_SCRIPT);

    let source = "\\documentclass{article}\n\\begin{document}\n\
                  See \\ref{sec:a} and \\ref{sec:b}.\n\
                  \\section{A}\\label{sec:a}\n\\section{B}\\label{sec:b}\n\
                  \\end{document}\n";

    let mut orchestrator =
        CompilationOrchestrator::new(compiler.to_str().unwrap(), Duration::from_secs(10));
    let result = orchestrator.compile(source, workdir.path()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.state, CompileState::Success);
    assert_eq!(result.passes, 2);

    // First-pass artifact lacked resolved references...
    let first = std::fs::read(workdir.path().join("pass1.pdf")).unwrap();
    assert_eq!(first, b"refs:??");
    // ...the final artifact has them.
    assert_eq!(result.pdf.as_deref(), Some(&b"refs:resolved"[..]));
}

#[cfg(unix)]
#[tokio::test]
async fn sleeping_compiler_times_out_distinctly() {
    let scripts = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let compiler = write_script(scripts.path(), "sleep 20\n");

    let mut orchestrator =
        CompilationOrchestrator::new(compiler.to_str().unwrap(), Duration::from_secs(1));
    let result = orchestrator
        .compile("\\documentclass{article}", workdir.path())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.state, CompileState::TimedOut, "timeout is not Failed");
    assert_eq!(orchestrator.state(), CompileState::TimedOut);
    assert!(result.log.contains("timeout"));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_compiler_captures_diagnostics_and_stops() {
    let scripts = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let compiler = write_script(
        scripts.path(),
        "echo '! Undefined control sequence. l.3'\nexit 1\n",
    );

    let mut orchestrator =
        CompilationOrchestrator::new(compiler.to_str().unwrap(), Duration::from_secs(10));
    let result = orchestrator
        .compile("\\documentclass{article}", workdir.path())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.state, CompileState::Failed);
    assert_eq!(result.passes, 1, "no second pass after a failure");
    assert!(result.log.contains("Undefined control sequence"));
}

#[cfg(unix)]
#[tokio::test]
async fn clean_exit_without_artifact_is_failed() {
    let scripts = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let compiler = write_script(scripts.path(), "exit 0\n");

    let mut orchestrator =
        CompilationOrchestrator::new(compiler.to_str().unwrap(), Duration::from_secs(10));
    let result = orchestrator
        .compile("\\documentclass{article}", workdir.path())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.state, CompileState::Failed);
    assert_eq!(result.passes, 2);
    assert!(result.log.contains("no output artifact"));
}

// ── End-to-end ───────────────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn office_memorandum_end_to_end() {
    let scripts = tempfile::tempdir().unwrap();
    let compiler = write_script(scripts.path(), "printf '%%PDF-1.4 mock' > main.pdf\n");
    let mock = MockAnalyzer::failing();

    let config = ConversionConfig::builder()
        .analyzer(mock.clone())
        .compiler(compiler.to_str().unwrap())
        .compile_timeout_secs(10)
        .build()
        .unwrap();

    let output = convert_bytes(MEMO_TEXT, InputFormat::PlainText, &config)
        .await
        .expect("conversion should succeed");

    // Local tier classified without any remote call.
    assert_eq!(output.analysis.document_type, DocumentType::OfficeMemorandum);
    assert!(output.analysis.confidence_score >= 0.75);
    assert_eq!(mock.calls(), 0);
    assert!(!output.stats.remote_classified);

    // Template resolved to the memo default and the header slots filled.
    assert_eq!(output.bound.template_id, "government_memo");
    assert_eq!(output.bound.slots.get("subject").map(String::as_str), Some("Test"));
    assert_eq!(output.bound.slots.get("file_no").map(String::as_str), Some("123"));

    // Assembled source carries the subject, correctly escaped (no escaping
    // needed for this value, so it appears literally).
    assert!(output.latex.contains("Test"));
    assert!(output.latex.contains("\\begin{document}"));

    // Mocked compilation succeeded.
    let compilation = output.compilation.as_ref().expect("compilation ran");
    assert!(compilation.success);
    assert_eq!(output.outcome(), RunOutcome::Complete);
    assert!(output.pdf().is_some());
}

#[tokio::test]
async fn source_survives_when_compilation_is_disabled() {
    let config = ConversionConfig::builder().compile(false).build().unwrap();

    let output = convert_bytes(MEMO_TEXT, InputFormat::PlainText, &config)
        .await
        .unwrap();

    assert!(output.compilation.is_none());
    assert_eq!(output.outcome(), RunOutcome::SourceOnly);
    assert!(output.latex.contains("OFFICE MEMORANDUM"));
}

#[cfg(unix)]
#[tokio::test]
async fn failed_compile_is_partial_success_with_source() {
    let scripts = tempfile::tempdir().unwrap();
    let compiler = write_script(scripts.path(), "echo 'boom'\nexit 1\n");

    let config = ConversionConfig::builder()
        .analyzer(MockAnalyzer::failing())
        .compiler(compiler.to_str().unwrap())
        .build()
        .unwrap();

    let output = convert_bytes(MEMO_TEXT, InputFormat::PlainText, &config)
        .await
        .expect("run must not fail when only the compiler does");

    assert_eq!(output.outcome(), RunOutcome::SourceOnly);
    assert!(!output.latex.is_empty(), "source is kept");
    let compilation = output.compilation.unwrap();
    assert!(!compilation.success);
    assert!(compilation.log.contains("boom"));
}

#[tokio::test]
async fn template_override_always_wins() {
    let config = ConversionConfig::builder()
        .compile(false)
        .template_override("basic")
        .build()
        .unwrap();

    let output = convert_bytes(MEMO_TEXT, InputFormat::PlainText, &config)
        .await
        .unwrap();

    assert_eq!(output.bound.template_id, "basic");
}

#[tokio::test]
async fn adversarial_subject_is_escaped_into_source() {
    let input = b"OFFICE MEMORANDUM\nNo. 9\nSubject: 50% of {budget} & _misc_\nBody text.\n";
    let config = ConversionConfig::builder().compile(false).build().unwrap();

    let output = convert_bytes(input, InputFormat::PlainText, &config)
        .await
        .unwrap();

    let subject = output.bound.slots.get("subject").unwrap();
    assert_eq!(subject, r"50\% of \{budget\} \& \_misc\_");
    assert!(output.latex.contains(subject.as_str()));
}

#[tokio::test]
async fn project_directory_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("memo.txt");
    std::fs::write(&input_path, MEMO_TEXT).unwrap();
    let out_dir = dir.path().join("project");

    let config = ConversionConfig::builder().compile(false).build().unwrap();
    let output = convert_to_dir(&input_path, &out_dir, &config).await.unwrap();

    let main_tex = std::fs::read_to_string(out_dir.join("main.tex")).unwrap();
    assert_eq!(main_tex, output.latex);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("analysis.json")).unwrap())
            .unwrap();
    assert_eq!(report["analysis"]["document_type"], "office_memorandum");
    assert!(report["stats"]["total_ms"].is_number());
}
