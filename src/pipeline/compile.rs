//! Compilation orchestration: drive the external LaTeX compiler.
//!
//! The retry flow is an explicit finite-state machine rather than nested
//! conditionals:
//!
//! ```text
//! Idle → FirstPass → SecondPass → Success
//!            │            │     ↘ Failed    (compiler ran, reported errors
//!            │            │                  — or exit 0 with no artifact)
//!            └────────────┴──────→ TimedOut (pass exceeded the deadline)
//! ```
//!
//! The second pass is unconditional after a successful first pass: tables
//! of contents and cross-references resolve only on the pass *after* the
//! one that wrote the `.aux` data. `TimedOut` is terminal and distinct from
//! `Failed` — a hung compiler and a complaining compiler need different
//! operator responses.
//!
//! Each pass runs under a wall-clock deadline with `kill_on_drop`, so
//! cancelling the run (dropping the future) terminates the in-flight
//! subprocess rather than orphaning it. Diagnostics are captured verbatim;
//! no automatic pass follows a failure.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::Doc2TexError;

/// Name of the source file written into the working directory.
pub const SOURCE_FILE: &str = "main.tex";
/// Name of the artifact the compiler must produce.
pub const ARTIFACT_FILE: &str = "main.pdf";

/// States of the compilation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileState {
    Idle,
    FirstPass,
    SecondPass,
    Success,
    Failed,
    TimedOut,
}

impl CompileState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompileState::Success | CompileState::Failed | CompileState::TimedOut
        )
    }
}

/// Terminal artifact of a compilation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationResult {
    pub success: bool,
    /// Compiled document bytes; `None` unless `state == Success`.
    #[serde(skip)]
    pub pdf: Option<Vec<u8>>,
    /// Verbatim compiler diagnostics, both passes concatenated.
    pub log: String,
    pub duration_ms: u64,
    /// Passes that actually ran.
    pub passes: u32,
    /// Terminal state: `Success`, `Failed`, or `TimedOut`.
    pub state: CompileState,
}

/// Drives the external compiler through the pass state machine.
pub struct CompilationOrchestrator {
    compiler: String,
    timeout_per_pass: Duration,
    state: CompileState,
}

enum PassOutcome {
    /// Process ran to completion; `ok` is the exit-status verdict.
    Completed { ok: bool, log: String },
    /// Deadline exceeded; the subprocess was killed.
    TimedOut,
    /// The compiler binary could not be launched at all.
    SpawnFailed(String),
}

impl CompilationOrchestrator {
    pub fn new(compiler: impl Into<String>, timeout_per_pass: Duration) -> Self {
        CompilationOrchestrator {
            compiler: compiler.into(),
            timeout_per_pass,
            state: CompileState::Idle,
        }
    }

    /// Current state; terminal after [`compile`](Self::compile) returns.
    pub fn state(&self) -> CompileState {
        self.state
    }

    /// Compile `source` inside `workdir`.
    ///
    /// Returns `Err` only when the working directory cannot be written —
    /// compiler failures and timeouts are data, not errors, so the caller
    /// keeps the LaTeX source either way.
    pub async fn compile(
        &mut self,
        source: &str,
        workdir: &Path,
    ) -> Result<CompilationResult, Doc2TexError> {
        let start = Instant::now();
        let tex_path = workdir.join(SOURCE_FILE);
        tokio::fs::write(&tex_path, source)
            .await
            .map_err(|e| Doc2TexError::OutputWriteFailed {
                path: tex_path.clone(),
                source: e,
            })?;

        let mut log = String::new();
        let mut passes = 0u32;

        for pass_state in [CompileState::FirstPass, CompileState::SecondPass] {
            self.state = pass_state;
            debug!(compiler = %self.compiler, state = ?pass_state, "starting compiler pass");

            match self.run_pass(workdir).await {
                PassOutcome::Completed { ok, log: pass_log } => {
                    passes += 1;
                    log.push_str(&format!("==== {:?} ====\n", pass_state));
                    log.push_str(&pass_log);
                    if !ok {
                        warn!(state = ?pass_state, "compiler reported errors");
                        self.state = CompileState::Failed;
                        return Ok(self.result(false, None, log, start, passes));
                    }
                }
                PassOutcome::TimedOut => {
                    warn!(
                        secs = self.timeout_per_pass.as_secs(),
                        state = ?pass_state,
                        "compiler pass exceeded deadline, subprocess killed"
                    );
                    log.push_str(&format!(
                        "==== {:?} ====\ncompiler killed after {}s timeout\n",
                        pass_state,
                        self.timeout_per_pass.as_secs()
                    ));
                    self.state = CompileState::TimedOut;
                    return Ok(self.result(false, None, log, start, passes));
                }
                PassOutcome::SpawnFailed(detail) => {
                    warn!(compiler = %self.compiler, detail = %detail, "compiler could not be launched");
                    log.push_str(&format!(
                        "failed to launch compiler '{}': {detail}\n",
                        self.compiler
                    ));
                    self.state = CompileState::Failed;
                    return Ok(self.result(false, None, log, start, passes));
                }
            }
        }

        // Exit code 0 is not proof of output: require a non-empty artifact
        // on disk before declaring success.
        let pdf_path = workdir.join(ARTIFACT_FILE);
        match tokio::fs::read(&pdf_path).await {
            Ok(bytes) if !bytes.is_empty() => {
                info!(
                    bytes = bytes.len(),
                    passes,
                    ms = start.elapsed().as_millis() as u64,
                    "compilation succeeded"
                );
                self.state = CompileState::Success;
                Ok(self.result(true, Some(bytes), log, start, passes))
            }
            _ => {
                warn!("compiler exited cleanly but produced no output artifact");
                log.push_str("compiler exited 0 but produced no output artifact\n");
                self.state = CompileState::Failed;
                Ok(self.result(false, None, log, start, passes))
            }
        }
    }

    async fn run_pass(&self, workdir: &Path) -> PassOutcome {
        let child = Command::new(&self.compiler)
            .arg("-interaction=nonstopmode")
            .arg(SOURCE_FILE)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => return PassOutcome::SpawnFailed(e.to_string()),
        };

        // Dropping the wait future on timeout kills the child via
        // kill_on_drop, which is exactly the cancellation contract.
        match timeout(self.timeout_per_pass, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
                log.push_str(&String::from_utf8_lossy(&output.stderr));
                PassOutcome::Completed {
                    ok: output.status.success(),
                    log,
                }
            }
            Ok(Err(e)) => PassOutcome::SpawnFailed(e.to_string()),
            Err(_) => PassOutcome::TimedOut,
        }
    }

    fn result(
        &self,
        success: bool,
        pdf: Option<Vec<u8>>,
        log: String,
        start: Instant,
        passes: u32,
    ) -> CompilationResult {
        CompilationResult {
            success,
            pdf,
            log,
            duration_ms: start.elapsed().as_millis() as u64,
            passes,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!CompileState::Idle.is_terminal());
        assert!(!CompileState::FirstPass.is_terminal());
        assert!(!CompileState::SecondPass.is_terminal());
        assert!(CompileState::Success.is_terminal());
        assert!(CompileState::Failed.is_terminal());
        assert!(CompileState::TimedOut.is_terminal());
    }

    #[tokio::test]
    async fn missing_compiler_is_failed_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = CompilationOrchestrator::new(
            "doc2tex-no-such-compiler-binary",
            Duration::from_secs(5),
        );
        let result = orch
            .compile("\\documentclass{article}", dir.path())
            .await
            .expect("spawn failure is a compile outcome, not an error");
        assert!(!result.success);
        assert_eq!(result.state, CompileState::Failed);
        assert_eq!(orch.state(), CompileState::Failed);
        assert!(result.log.contains("failed to launch"));
        assert_eq!(result.passes, 0);
    }
}
