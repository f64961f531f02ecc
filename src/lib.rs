//! codecell — sandboxed execution engine for model-generated code snippets.
//!
//! Takes untrusted Python or JavaScript source handed over by a chat/tool
//! layer, runs the Python path in a fresh Docker container per request with
//! a per-identity workspace mounted, and returns a structured
//! [`ExecutionResult`] (stdout/stderr lines, an optional tagged runtime
//! error, and encoded artifacts such as matplotlib figures). The JavaScript
//! path is a rendering sandbox: the snippet comes back verbatim as markup.
//!
//! The engine is a local orchestration library — it owns no ports and no
//! wire protocol, and it never decides *what* to run.
//!
//! # Example
//!
//! ```ignore
//! use codecell::{Engine, EngineConfig, ExecutionRequest, Language};
//!
//! let engine = Engine::new(EngineConfig::from_env()?);
//! let request = ExecutionRequest::new("user-42", Language::Python, "print('hi')");
//! let result = engine.execute(&request).await?;
//! assert_eq!(result.stdout, vec!["hi".to_string()]);
//! ```

pub mod artifacts;
pub mod config;
pub mod engine;
pub mod error;
pub mod preprocess;
pub mod runner;
pub mod types;
pub mod workspace;

pub use config::{EngineConfig, ResourceLimits};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use types::{
    Artifact, ErrorKind, ExecutionRequest, ExecutionResult, Language, RuntimeError,
};
pub use workspace::WorkspaceManager;
