//! Python execution in a throwaway container.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::{EngineConfig, ResourceLimits};
use crate::error::Result;
use crate::runner::container::{ContainerRunner, connect_docker};
use crate::runner::{RunContext, RunOutcome, Runner};
use crate::types::Language;
use crate::workspace::WorkspaceManager;

/// Runs a preprocessed Python script inside a fresh container per request.
pub struct PythonRunner {
    image: String,
    auto_pull_image: bool,
    limits: ResourceLimits,
}

impl PythonRunner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            image: config.python_image.clone(),
            auto_pull_image: config.auto_pull_image,
            limits: config.limits(),
        }
    }

    async fn container_runner(&self) -> Result<ContainerRunner> {
        let docker = connect_docker().await?;
        let runner = ContainerRunner::new(docker, self.image.clone());

        if !runner.image_exists().await {
            if self.auto_pull_image {
                runner.pull_image().await?;
            } else {
                return Err(crate::error::EngineError::ContainerCreationFailed {
                    reason: format!(
                        "image {} not found and auto_pull is disabled",
                        self.image
                    ),
                });
            }
        }

        Ok(runner)
    }
}

#[async_trait]
impl Runner for PythonRunner {
    async fn run(&self, ctx: RunContext<'_>) -> Result<RunOutcome> {
        // The token-prefixed filename, not a fixed name, is what makes
        // concurrent executions against one workspace safe.
        let script = ScriptFile::write(ctx.workspace, ctx.token, ctx.code).await?;

        let runner = self.container_runner().await?;
        let command = vec!["python".to_string(), script.name().to_string()];
        let output = runner.run(ctx.workspace, command, &self.limits).await;

        // `script` is dropped here on every path, deleting the temp file.
        output.map(RunOutcome::Executed)
    }
}

/// Temp script file, deleted when dropped.
///
/// Drop-based so the file disappears on every exit path: success, launch
/// failure, timeout, or a panic unwinding through the runner. Deleting an
/// already-deleted file is a no-op.
struct ScriptFile {
    path: PathBuf,
    name: String,
}

impl ScriptFile {
    async fn write(workspace: &Path, token: &str, code: &str) -> std::io::Result<Self> {
        let name = WorkspaceManager::script_name(token, Language::Python.extension());
        let path = workspace.join(&name);
        tokio::fs::write(&path, code).await?;
        Ok(Self { path, name })
    }

    /// Filename relative to the workspace, as the container sees it.
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                // Never propagated: cleanup must not mask the primary result.
                tracing::warn!("failed to delete temp script {}: {}", self.path.display(), e);
            }
        }
    }
}
