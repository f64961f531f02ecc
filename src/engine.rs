//! Orchestrates one execution request from preprocessing to result assembly.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               Engine                                  │
//! │                                                                       │
//! │   execute(request)                                                    │
//! │         │                                                             │
//! │         ▼                                                             │
//! │   ┌────────────┐   ┌────────────┐   ┌──────────┐   ┌──────────────┐  │
//! │   │ Workspace  │──▶│ Preprocess │──▶│  Runner  │──▶│   Collect    │  │
//! │   │ + token    │   │ plt.show() │   │(container│   │  artifacts   │  │
//! │   └────────────┘   └────────────┘   │ or render│   └──────────────┘  │
//! │                                     └──────────┘          │          │
//! │                                                           ▼          │
//! │                                                  ┌──────────────┐    │
//! │                                                  │   Assemble   │    │
//! │                                                  │    result    │    │
//! │                                                  └──────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Errors are data at this boundary: once the workspace exists, every
//! outcome — including a launch failure or timeout — comes back as a
//! well-formed [`ExecutionResult`].

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::artifacts;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::preprocess;
use crate::runner::{
    ContainerOutput, JsRenderer, PythonRunner, RunContext, RunOutcome, Runner, connect_docker,
};
use crate::types::{
    Artifact, ErrorKind, ExecutionRequest, ExecutionResult, Language, RuntimeError, split_lines,
};
use crate::workspace::WorkspaceManager;

/// The sandboxed code-execution engine.
///
/// An explicit resource handle: construct one, share it, and call
/// [`Engine::execute`] per request. Requests run concurrently up to the
/// configured container ceiling.
pub struct Engine {
    config: EngineConfig,
    workspaces: WorkspaceManager,
    python: PythonRunner,
    js: JsRenderer,
    permits: Arc<Semaphore>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let workspaces = WorkspaceManager::new(config.workspace_root.clone());
        let python = PythonRunner::new(&config);
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            config,
            workspaces,
            python,
            js: JsRenderer,
            permits,
        }
    }

    /// Construct from environment configuration.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(EngineConfig::from_env()?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check whether the isolation backend is reachable.
    pub async fn is_available(&self) -> bool {
        match connect_docker().await {
            Ok(docker) => docker.ping().await.is_ok(),
            Err(_) => false,
        }
    }

    /// Execute one request and return its result.
    ///
    /// Returns `Err` only when the workspace cannot be prepared (invalid
    /// identity, directory creation failure). Everything after that point —
    /// launch failures, non-zero exits, timeouts — is reported inside the
    /// result's `runtime_error`, and artifacts written before a failure are
    /// still collected.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        // Bound the number of simultaneously running containers.
        let _permit =
            self.permits
                .acquire()
                .await
                .map_err(|_| EngineError::Config {
                    reason: "worker pool closed".to_string(),
                })?;

        let workspace = self.workspaces.ensure_workspace(&request.identity).await?;
        let token = WorkspaceManager::new_token();

        tracing::debug!(
            "executing {:?} snippet for identity {} (token {})",
            request.language,
            request.identity,
            token
        );

        match request.language {
            Language::Javascript => {
                let ctx = RunContext {
                    workspace: &workspace,
                    token: &token,
                    code: &request.source_code,
                };
                let outcome = self.js.run(ctx).await?;
                Ok(assemble_rendered(outcome))
            }
            Language::Python => {
                let code = preprocess::rewrite_show_calls(&token, &request.source_code);
                let ctx = RunContext {
                    workspace: &workspace,
                    token: &token,
                    code: &code,
                };
                let run = self.python.run(ctx).await;

                // Collect whether the run succeeded or not: figures saved
                // before a later failure still belong to the caller.
                let artifacts = artifacts::collect(
                    &workspace,
                    &token,
                    &self.config.artifact_extensions,
                )
                .await;

                Ok(assemble_executed(run, artifacts))
            }
        }
    }
}

/// Build the result for the rendering path.
fn assemble_rendered(outcome: RunOutcome) -> ExecutionResult {
    let mut result = ExecutionResult::empty();
    if let RunOutcome::Rendered(source) = outcome {
        result.artifacts.push(Artifact::Html { source });
    }
    result
}

/// Build the result for the execution path.
fn assemble_executed(run: Result<RunOutcome>, artifacts: Vec<Artifact>) -> ExecutionResult {
    let mut result = ExecutionResult::empty();
    result.artifacts = artifacts;

    match run {
        Ok(RunOutcome::Executed(output)) => {
            apply_container_output(&mut result, output);
        }
        Ok(RunOutcome::Rendered(_)) => {
            // A computation runner never renders.
            result.runtime_error = Some(RuntimeError::new(
                ErrorKind::Infrastructure,
                "runner returned markup for an executed language",
            ));
        }
        Err(e) => {
            tracing::warn!("execution failed: {}", e);
            result.runtime_error = Some(RuntimeError::new(e.kind(), e.to_string()));
        }
    }

    result
}

fn apply_container_output(result: &mut ExecutionResult, output: ContainerOutput) {
    result.stdout = split_lines(&output.stdout);
    result.stderr = split_lines(&output.stderr);
    result.truncated = output.truncated;

    if output.exit_code != 0 {
        // Non-empty stderr with exit code zero is only a warning; a
        // non-zero exit is a failure of the executed code itself.
        let message = if output.stderr.trim().is_empty() {
            format!("process exited with status {}", output.exit_code)
        } else {
            output.stderr.trim_end().to_string()
        };
        result.runtime_error = Some(RuntimeError::new(ErrorKind::Runtime, message));
    }

    tracing::debug!(
        "run finished in {:?} (exit {}, {} artifact(s))",
        output.duration,
        output.exit_code,
        result.artifacts.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn executed(exit_code: i64, stdout: &str, stderr: &str) -> Result<RunOutcome> {
        Ok(RunOutcome::Executed(ContainerOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(5),
            truncated: false,
        }))
    }

    #[test]
    fn test_assemble_success() {
        let result = assemble_executed(executed(0, "hi\n", ""), Vec::new());
        assert_eq!(result.stdout, vec!["hi".to_string()]);
        assert_eq!(result.stderr, vec![String::new()]);
        assert!(result.runtime_error.is_none());
        assert!(result.artifacts.is_empty());
    }

    #[test]
    fn test_assemble_warning_stderr_is_success() {
        let result = assemble_executed(executed(0, "ok\n", "FutureWarning: soon\n"), Vec::new());
        assert!(result.runtime_error.is_none());
        assert_eq!(result.stderr, vec!["FutureWarning: soon".to_string()]);
    }

    #[test]
    fn test_assemble_nonzero_exit_is_runtime_error() {
        let traceback = "Traceback (most recent call last):\nZeroDivisionError: division by zero\n";
        let result = assemble_executed(executed(1, "", traceback), Vec::new());

        let err = result.runtime_error.expect("runtime error expected");
        assert_eq!(err.kind, ErrorKind::Runtime);
        assert!(err.message.contains("ZeroDivisionError"));
    }

    #[test]
    fn test_assemble_nonzero_exit_without_stderr() {
        let result = assemble_executed(executed(137, "", ""), Vec::new());
        let err = result.runtime_error.expect("runtime error expected");
        assert!(err.message.contains("137"));
    }

    #[test]
    fn test_assemble_launch_error_keeps_artifacts() {
        let artifacts = vec![Artifact::Image {
            name: "t_figure_1.png".to_string(),
            media_type: "image/png".to_string(),
            data: "aGk=".to_string(),
        }];
        let run = Err(EngineError::DockerNotAvailable {
            reason: "daemon unreachable".to_string(),
        });

        let result = assemble_executed(run, artifacts);
        let err = result.runtime_error.expect("runtime error expected");
        assert_eq!(err.kind, ErrorKind::Infrastructure);
        assert!(err.message.contains("daemon unreachable"));
        assert_eq!(result.artifacts.len(), 1);
    }

    #[test]
    fn test_assemble_timeout_kind() {
        let run = Err(EngineError::Timeout(Duration::from_secs(120)));
        let result = assemble_executed(run, Vec::new());
        assert_eq!(
            result.runtime_error.expect("runtime error expected").kind,
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_assemble_rendered() {
        let result = assemble_rendered(RunOutcome::Rendered("<p>hi</p>".to_string()));
        assert!(result.runtime_error.is_none());
        assert_eq!(
            result.artifacts,
            vec![Artifact::Html {
                source: "<p>hi</p>".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_execute_js_needs_no_docker() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig {
            workspace_root: dir.path().to_path_buf(),
            ..Default::default()
        });

        let request = ExecutionRequest::new(
            "alice",
            Language::Javascript,
            "<script>console.log('hi')</script>",
        );
        let result = engine.execute(&request).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.artifacts.len(), 1);
        assert!(dir.path().join("alice").is_dir());
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_identity() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig {
            workspace_root: dir.path().to_path_buf(),
            ..Default::default()
        });

        let request = ExecutionRequest::new("../escape", Language::Javascript, "x");
        assert!(matches!(
            engine.execute(&request).await,
            Err(EngineError::InvalidIdentity { .. })
        ));
    }
}
