use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    config::ExecConfig,
    error::Error,
    languages::{LanguageProfile, ProfileRegistry, SourceLayout},
    runner::{ProcessOutput, ProcessRunner},
    types::{ExecutionRequest, ExecutionResult, ExecutionStatus},
    workspace::Workspace,
    Result,
};

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    ProfileResolved,
    WorkspacePrepared,
    Compiling,
    Compiled,
    CompileFailed,
    Running,
    Completed,
    RuntimeFailed,
    TimedOut,
    WorkspaceReleased,
    Done,
}

impl Phase {
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;

        matches!(
            (self, next),
            // unsupported language and workspace errors end before a
            // workspace exists
            (Received, ProfileResolved)
                | (Received, Done)
                | (ProfileResolved, WorkspacePrepared)
                | (ProfileResolved, Done)
                | (WorkspacePrepared, Compiling)
                | (WorkspacePrepared, Running)
                | (Compiling, Compiled)
                | (Compiling, CompileFailed)
                | (Compiled, Running)
                | (Running, Completed)
                | (Running, RuntimeFailed)
                | (Running, TimedOut)
                // release is reachable from every state that owns a
                // workspace, including ones an internal error interrupted
                | (
                    WorkspacePrepared
                        | Compiling
                        | Compiled
                        | CompileFailed
                        | Running
                        | Completed
                        | RuntimeFailed
                        | TimedOut,
                    WorkspaceReleased
                )
                | (WorkspaceReleased, Done)
        )
    }
}

#[derive(Debug)]
struct PhaseTracker {
    current: Phase,
    history: Vec<Phase>,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            current: Phase::Received,
            history: vec![Phase::Received],
        }
    }

    fn advance(&mut self, next: Phase) -> Result<()> {
        if !self.current.can_advance_to(next) {
            return Err(Error::Internal(format!(
                "illegal phase transition {:?} -> {:?}",
                self.current, next
            )));
        }
        debug!("Phase {:?} -> {:?}", self.current, next);
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}

/// Runs one request end to end: resolve profile, prepare workspace,
/// compile, run, release
pub struct CodeExecutor {
    registry: Arc<ProfileRegistry>,
    runner: ProcessRunner,
    workspace_root: PathBuf,
}

impl CodeExecutor {
    pub fn new(config: &ExecConfig) -> Result<Self> {
        config.validate()?;
        let registry = ProfileRegistry::with_overrides(&config.languages)?;
        Ok(Self::with_registry(Arc::new(registry), config))
    }

    pub fn with_registry(registry: Arc<ProfileRegistry>, config: &ExecConfig) -> Self {
        Self {
            registry,
            runner: ProcessRunner::new(config.limits.clone(), config.max_output_bytes),
            workspace_root: config.workspace_root(),
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Execute one request. Never fails: every outcome, including bugs in
    /// this crate, becomes an [`ExecutionResult`].
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        self.execute_traced(request).await.0
    }

    /// Like [`CodeExecutor::execute`], also returning the phases visited.
    pub async fn execute_traced(&self, request: ExecutionRequest) -> (ExecutionResult, Vec<Phase>) {
        let span = info_span!(
            "execution",
            id = %Uuid::new_v4(),
            language = %request.language
        );

        async move {
            let started = Instant::now();
            let mut tracker = PhaseTracker::new();

            let mut result = match self.drive(&request, &mut tracker).await {
                Ok(result) => result,
                Err(e) => {
                    error!("Internal error during execution: {}", e);
                    ExecutionResult::failed(
                        ExecutionStatus::SystemError,
                        format!("internal error: {}", e),
                    )
                }
            };
            result.execution_time = started.elapsed();

            info!(
                "Execution finished: status={} elapsed={:?}",
                result.status, result.execution_time
            );
            (result, tracker.history)
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        request: &ExecutionRequest,
        tracker: &mut PhaseTracker,
    ) -> Result<ExecutionResult> {
        let profile = match self.registry.profile_for(&request.language) {
            Ok(profile) => profile,
            Err(e @ Error::UnsupportedLanguage(_)) => {
                info!("Rejected request: {}", e);
                tracker.advance(Phase::Done)?;
                return Ok(ExecutionResult::failed(
                    ExecutionStatus::UnsupportedLanguage,
                    e.to_string(),
                ));
            }
            Err(e) => return Err(e),
        };
        tracker.advance(Phase::ProfileResolved)?;

        let layout = profile.layout(&request.code);
        let workspace =
            match Workspace::acquire(&self.workspace_root, &layout.file_name, &request.code).await
            {
                Ok(workspace) => workspace,
                Err(e) => {
                    error!("Failed to prepare workspace: {}", e);
                    tracker.advance(Phase::Done)?;
                    return Ok(ExecutionResult::failed(
                        ExecutionStatus::SystemError,
                        e.to_string(),
                    ));
                }
            };
        tracker.advance(Phase::WorkspacePrepared)?;

        let outcome = self
            .compile_and_run(profile, &layout, &workspace, request, tracker)
            .await;

        if let Err(e) = workspace.release().await {
            // the workspace was dropped inside release, which retries removal
            warn!("{}", e);
        }
        tracker.advance(Phase::WorkspaceReleased)?;
        tracker.advance(Phase::Done)?;

        outcome
    }

    async fn compile_and_run(
        &self,
        profile: &LanguageProfile,
        layout: &SourceLayout,
        workspace: &Workspace,
        request: &ExecutionRequest,
        tracker: &mut PhaseTracker,
    ) -> Result<ExecutionResult> {
        let dir = workspace.root_dir();

        if let Some(compile) = profile.compile_command(layout) {
            tracker.advance(Phase::Compiling)?;
            let output = match self
                .runner
                .run(&compile, dir, &profile.env, None, profile.compile_timeout)
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    tracker.advance(Phase::CompileFailed)?;
                    return start_failure(e);
                }
            };

            if !output.success() {
                info!("Compilation failed for {}", profile.language);
                tracker.advance(Phase::CompileFailed)?;
                return Ok(compile_failure(output, profile.compile_timeout));
            }
            tracker.advance(Phase::Compiled)?;
        }

        tracker.advance(Phase::Running)?;
        let run = profile.run_command(layout);
        let output = match self
            .runner
            .run(
                &run,
                dir,
                &profile.env,
                request.input.as_deref(),
                profile.run_timeout,
            )
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracker.advance(Phase::RuntimeFailed)?;
                return start_failure(e);
            }
        };

        if output.timed_out {
            tracker.advance(Phase::TimedOut)?;
            Ok(ExecutionResult {
                status: ExecutionStatus::Timeout,
                failure: Some(format!(
                    "execution timed out after {}",
                    format_secs(profile.run_timeout)
                )),
                ..from_output(output)
            })
        } else if output.success() {
            tracker.advance(Phase::Completed)?;
            Ok(ExecutionResult {
                status: ExecutionStatus::Success,
                failure: None,
                ..from_output(output)
            })
        } else {
            tracker.advance(Phase::RuntimeFailed)?;
            let failure = failure_text(&output, "process");
            Ok(ExecutionResult {
                status: ExecutionStatus::RuntimeError,
                failure: Some(failure),
                ..from_output(output)
            })
        }
    }
}

/// A compiler or interpreter that could not be started is reported to the
/// caller; anything else is a bug and propagates.
fn start_failure(e: Error) -> Result<ExecutionResult> {
    match e {
        Error::ToolchainUnavailable(program) => {
            warn!("Toolchain not available: {}", program);
            Ok(ExecutionResult::failed(
                ExecutionStatus::SystemError,
                format!("toolchain not available: {}", program),
            ))
        }
        e @ Error::Spawn { .. } => {
            warn!("{}", e);
            Ok(ExecutionResult::failed(
                ExecutionStatus::SystemError,
                e.to_string(),
            ))
        }
        e => Err(e),
    }
}

fn compile_failure(output: ProcessOutput, timeout: Duration) -> ExecutionResult {
    let failure = if output.timed_out {
        format!("compilation timed out after {}", format_secs(timeout))
    } else {
        failure_text(&output, "compiler")
    };

    ExecutionResult {
        status: ExecutionStatus::CompilationError,
        stdout: String::new(),
        stderr: output.stderr,
        exit_code: output.exit_code,
        execution_time: output.elapsed,
        truncated: output.truncated,
        failure: Some(failure),
    }
}

fn from_output(output: ProcessOutput) -> ExecutionResult {
    ExecutionResult {
        status: ExecutionStatus::Success,
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
        execution_time: output.elapsed,
        truncated: output.truncated,
        failure: None,
    }
}

/// stderr when there is any, otherwise how the process ended
fn failure_text(output: &ProcessOutput, what: &str) -> String {
    if !output.stderr.trim().is_empty() {
        return output.stderr.clone();
    }
    match (output.exit_code, output.signal) {
        (Some(code), _) => format!("{} exited with code {}", what, code),
        (None, Some(signal)) => format!("{} killed by signal {}", what, signal),
        (None, None) => format!("{} failed", what),
    }
}

fn format_secs(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
