//! Docker container lifecycle for one-shot script execution.
//!
//! Every run launches a brand-new container instance: no variables, file
//! descriptors, or processes survive between requests. The workspace is
//! bind-mounted read-write at a fixed mount point and the script runs with
//! that mount point as its working directory.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Docker Container                        │
//! │                                                               │
//! │  Mounts:                                                      │
//! │    /workspace ─▶ per-identity workspace directory (rw)        │
//! │                                                               │
//! │  Command:                                                     │
//! │    <interpreter> <token>_script.<ext>   (cwd = /workspace)    │
//! │                                                               │
//! │  Limits:                                                      │
//! │    Memory + CPU shares from config, wall-clock deadline,      │
//! │    all capabilities dropped, no privilege escalation          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::time::Duration;

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use futures::StreamExt;

use crate::config::ResourceLimits;
use crate::error::{EngineError, Result};

/// Mount point of the workspace inside the container.
pub const WORKSPACE_MOUNT: &str = "/workspace";

/// Output from one container execution.
#[derive(Debug, Clone)]
pub struct ContainerOutput {
    /// Exit code of the script process.
    pub exit_code: i64,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// How long the run took, container launch included.
    pub duration: Duration,
    /// Whether output was cut off at the byte cap.
    pub truncated: bool,
}

/// Launches throwaway containers and collects their output.
pub struct ContainerRunner {
    docker: Docker,
    image: String,
}

impl ContainerRunner {
    pub fn new(docker: Docker, image: String) -> Self {
        Self { docker, image }
    }

    /// Check if the Docker daemon is responsive.
    pub async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    /// Check if the configured image exists locally.
    pub async fn image_exists(&self) -> bool {
        self.docker.inspect_image(&self.image).await.is_ok()
    }

    /// Pull the configured image.
    pub async fn pull_image(&self) -> Result<()> {
        use bollard::image::CreateImageOptions;

        tracing::info!("pulling runner image: {}", self.image);

        let options = CreateImageOptions {
            from_image: self.image.clone(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::debug!("pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(EngineError::ContainerCreationFailed {
                        reason: format!("image pull failed: {}", e),
                    });
                }
            }
        }

        tracing::info!("pulled runner image: {}", self.image);
        Ok(())
    }

    /// Run `command` in a fresh container with `workspace` mounted at
    /// [`WORKSPACE_MOUNT`], waiting for completion.
    ///
    /// The container is force-removed on every path, including timeout, so
    /// an expired deadline also kills the script.
    pub async fn run(
        &self,
        workspace: &Path,
        command: Vec<String>,
        limits: &ResourceLimits,
    ) -> Result<ContainerOutput> {
        let start_time = std::time::Instant::now();

        let container_id = self.create_container(workspace, command, limits).await?;

        let run_result = async {
            self.docker
                .start_container(&container_id, None::<StartContainerOptions<String>>)
                .await
                .map_err(|e| EngineError::ContainerStartFailed {
                    reason: e.to_string(),
                })?;

            tokio::time::timeout(limits.timeout, async {
                self.wait_for_container(&container_id, limits.max_output_bytes)
                    .await
            })
            .await
            .map_err(|_| EngineError::Timeout(limits.timeout))?
        }
        .await;

        // Always clean up the container, even after a timeout.
        let _ = self
            .docker
            .remove_container(
                &container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        let mut output = run_result?;
        output.duration = start_time.elapsed();
        Ok(output)
    }

    async fn create_container(
        &self,
        workspace: &Path,
        command: Vec<String>,
        limits: &ResourceLimits,
    ) -> Result<String> {
        let workspace_str = workspace.display().to_string();

        let host_config = HostConfig {
            binds: Some(vec![format!("{}:{}:rw", workspace_str, WORKSPACE_MOUNT)]),
            memory: Some(limits.memory_bytes as i64),
            cpu_shares: Some(limits.cpu_shares as i64),
            network_mode: Some("bridge".to_string()),
            // Untrusted code: drop all capabilities, forbid escalation.
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges:true".to_string()]),
            tmpfs: Some(
                [("/tmp".to_string(), "size=512M".to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };

        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(command),
            working_dir: Some(WORKSPACE_MOUNT.to_string()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: format!("codecell-{}", uuid::Uuid::new_v4()),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| EngineError::ContainerCreationFailed {
                reason: e.to_string(),
            })?;

        Ok(response.id)
    }

    /// Wait for a container to exit and collect its output.
    async fn wait_for_container(
        &self,
        container_id: &str,
        max_output: usize,
    ) -> Result<ContainerOutput> {
        let mut wait_stream = self.docker.wait_container(
            container_id,
            Some(WaitContainerOptions {
                condition: "not-running",
            }),
        );

        let exit_code = match wait_stream.next().await {
            Some(Ok(response)) => response.status_code,
            // bollard surfaces a non-zero exit as an error carrying the
            // status code; the code itself is still the outcome we want.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
            Some(Err(e)) => {
                return Err(EngineError::ExecutionFailed {
                    reason: format!("wait failed: {}", e),
                });
            }
            None => {
                return Err(EngineError::ExecutionFailed {
                    reason: "container wait stream ended unexpectedly".to_string(),
                });
            }
        };

        let (stdout, stderr, truncated) = self.collect_logs(container_id, max_output).await?;

        Ok(ContainerOutput {
            exit_code,
            stdout,
            stderr,
            duration: Duration::ZERO, // set by run()
            truncated,
        })
    }

    /// Collect stdout and stderr, capping each at half the output limit.
    async fn collect_logs(
        &self,
        container_id: &str,
        max_output: usize,
    ) -> Result<(String, String, bool)> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            ..Default::default()
        };

        let mut stream = self.docker.logs(container_id, Some(options));

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut truncated = false;
        let half_max = max_output / 2;

        while let Some(result) = stream.next().await {
            match result {
                Ok(LogOutput::StdOut { message }) => {
                    let text = String::from_utf8_lossy(&message);
                    truncated |= append_capped(&mut stdout, &text, half_max);
                }
                Ok(LogOutput::StdErr { message }) => {
                    let text = String::from_utf8_lossy(&message);
                    truncated |= append_capped(&mut stderr, &text, half_max);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("error reading container logs: {}", e);
                }
            }
        }

        Ok((stdout, stderr, truncated))
    }
}

/// Append `text` to `buf` without exceeding `cap` bytes; returns whether
/// anything was dropped.
fn append_capped(buf: &mut String, text: &str, cap: usize) -> bool {
    if buf.len() + text.len() <= cap {
        buf.push_str(text);
        return false;
    }
    let remaining = cap.saturating_sub(buf.len());
    let mut cut = remaining.min(text.len());
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    buf.push_str(&text[..cut]);
    true
}

/// Connect to the Docker daemon.
///
/// Tries these locations in order:
/// 1. `DOCKER_HOST` env var (bollard default)
/// 2. `/var/run/docker.sock` (Linux default)
/// 3. `~/.docker/run/docker.sock` (Docker Desktop on macOS)
pub async fn connect_docker() -> Result<Docker> {
    if let Ok(docker) = Docker::connect_with_local_defaults()
        && docker.ping().await.is_ok()
    {
        return Ok(docker);
    }

    if let Some(home) = std::env::var_os("HOME") {
        let desktop_sock = std::path::Path::new(&home).join(".docker/run/docker.sock");
        if desktop_sock.exists() {
            let sock_str = desktop_sock.to_string_lossy();
            if let Ok(docker) =
                Docker::connect_with_socket(&sock_str, 120, bollard::API_DEFAULT_VERSION)
                && docker.ping().await.is_ok()
            {
                return Ok(docker);
            }
        }
    }

    Err(EngineError::DockerNotAvailable {
        reason: "socket not found: /var/run/docker.sock".to_string(),
    })
}
