//! Configuration for the execution engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base directory under which per-identity workspaces are created.
    pub workspace_root: PathBuf,
    /// Docker image used for the Python runner. In practice this is a
    /// data-science image with matplotlib/pandas preinstalled.
    pub python_image: String,
    /// Whether to pull the image if it is not present locally.
    pub auto_pull_image: bool,
    /// Deadline for a single execution, container launch included.
    pub timeout: Duration,
    /// Container memory limit in megabytes.
    pub memory_limit_mb: u64,
    /// Container CPU shares (relative weight, Docker default 1024).
    pub cpu_shares: u32,
    /// Cap on captured stdout+stderr, in bytes.
    pub max_output_bytes: usize,
    /// File extensions collected as artifacts (lowercase, no dot).
    pub artifact_extensions: Vec<String>,
    /// Maximum number of containers running at once.
    pub max_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("workingdir"),
            python_image: "python:3.11-slim".to_string(),
            auto_pull_image: true,
            timeout: Duration::from_secs(120),
            memory_limit_mb: 2048,
            cpu_shares: 1024,
            max_output_bytes: 64 * 1024,
            artifact_extensions: vec!["png".to_string()],
            max_concurrency: 4,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment (reading `.env` if present).
    ///
    /// Recognized variables:
    /// - `PYTHON_DOCKER_IMAGE` — image for the Python runner
    /// - `CODECELL_WORKSPACE_ROOT` — base workspace directory
    /// - `CODECELL_TIMEOUT_SECS` — execution deadline
    /// - `CODECELL_MEMORY_LIMIT_MB` — container memory limit
    /// - `CODECELL_MAX_CONCURRENCY` — container ceiling
    /// - `CODECELL_AUTO_PULL` — "true"/"false"
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(image) = std::env::var("PYTHON_DOCKER_IMAGE") {
            config.python_image = image;
        }
        if let Ok(root) = std::env::var("CODECELL_WORKSPACE_ROOT") {
            config.workspace_root = PathBuf::from(root);
        }
        if let Ok(secs) = std::env::var("CODECELL_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| EngineError::Config {
                reason: format!("CODECELL_TIMEOUT_SECS is not a number: {}", secs),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(mb) = std::env::var("CODECELL_MEMORY_LIMIT_MB") {
            config.memory_limit_mb = mb.parse().map_err(|_| EngineError::Config {
                reason: format!("CODECELL_MEMORY_LIMIT_MB is not a number: {}", mb),
            })?;
        }
        if let Ok(n) = std::env::var("CODECELL_MAX_CONCURRENCY") {
            let n: usize = n.parse().map_err(|_| EngineError::Config {
                reason: format!("CODECELL_MAX_CONCURRENCY is not a number: {}", n),
            })?;
            if n == 0 {
                return Err(EngineError::Config {
                    reason: "CODECELL_MAX_CONCURRENCY must be at least 1".to_string(),
                });
            }
            config.max_concurrency = n;
        }
        if let Ok(v) = std::env::var("CODECELL_AUTO_PULL") {
            config.auto_pull_image = matches!(v.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        Ok(config)
    }

    /// Resource limits handed to the container layer.
    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_bytes: self.memory_limit_mb * 1024 * 1024,
            cpu_shares: self.cpu_shares,
            timeout: self.timeout,
            max_output_bytes: self.max_output_bytes,
        }
    }
}

/// Resource limits for a single container execution.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum memory in bytes.
    pub memory_bytes: u64,
    /// CPU shares (relative weight).
    pub cpu_shares: u32,
    /// Maximum execution time.
    pub timeout: Duration,
    /// Maximum combined output size in bytes.
    pub max_output_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 2 * 1024 * 1024 * 1024, // 2 GB
            cpu_shares: 1024,
            timeout: Duration::from_secs(120),
            max_output_bytes: 64 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.artifact_extensions, vec!["png".to_string()]);
        assert!(config.max_concurrency >= 1);
    }

    #[test]
    fn test_limits_from_config() {
        let config = EngineConfig {
            memory_limit_mb: 512,
            ..Default::default()
        };
        let limits = config.limits();
        assert_eq!(limits.memory_bytes, 512 * 1024 * 1024);
        assert_eq!(limits.timeout, config.timeout);
    }
}
