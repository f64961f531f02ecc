//! Per-language execution strategies.
//!
//! The engine dispatches on the request language to a [`Runner`]. The two
//! paths are deliberately different capability sets:
//!
//! - [`PythonRunner`] is a computation sandbox: it writes the preprocessed
//!   script into the workspace and executes it in a throwaway container,
//!   capturing output and leaving figure files for the collector.
//! - [`JsRenderer`] is a rendering sandbox: it executes nothing and hands
//!   the snippet back verbatim as markup for the client to render.
//!
//! New languages slot in as further [`Runner`] implementations without
//! touching the orchestration in [`crate::engine`].

pub mod container;
mod js;
mod python;

use std::path::Path;

use async_trait::async_trait;

pub use container::{ContainerOutput, ContainerRunner, WORKSPACE_MOUNT, connect_docker};
pub use js::JsRenderer;
pub use python::PythonRunner;

use crate::error::Result;

/// Everything a runner needs for one request.
pub struct RunContext<'a> {
    /// Absolute path of the per-identity workspace.
    pub workspace: &'a Path,
    /// The request's collision-avoidance token.
    pub token: &'a str,
    /// Source code, already preprocessed where the language calls for it.
    pub code: &'a str,
}

/// What a runner produced.
#[derive(Debug)]
pub enum RunOutcome {
    /// The snippet was executed in isolation; output and exit status follow.
    Executed(ContainerOutput),
    /// The snippet was not executed; it is returned as renderable markup.
    Rendered(String),
}

/// One language's execution strategy.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run one request to completion.
    async fn run(&self, ctx: RunContext<'_>) -> Result<RunOutcome>;
}
