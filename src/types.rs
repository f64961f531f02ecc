//! Request and result types exchanged with the chat/tool layer.

use serde::{Deserialize, Serialize};

/// Language of a submitted snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Executed inside a throwaway container; figures are captured as
    /// image artifacts.
    Python,
    /// Never executed; the snippet is returned verbatim as renderable
    /// markup for the client.
    Javascript,
}

impl Language {
    /// Script file extension for this language.
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Javascript => "js",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "html" => Ok(Language::Javascript),
            _ => Err(format!(
                "unsupported language '{}', expected 'python' or 'javascript'",
                s
            )),
        }
    }
}

/// A single request to execute a snippet.
///
/// Immutable once submitted. The identity is an opaque caller-provided name
/// used only to scope the workspace directory; it is not a security boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Opaque caller identity; one workspace per identity.
    pub identity: String,
    /// Language of the snippet.
    pub language: Language,
    /// The untrusted source code to run.
    pub source_code: String,
}

impl ExecutionRequest {
    pub fn new(identity: impl Into<String>, language: Language, source_code: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            language,
            source_code: source_code.into(),
        }
    }
}

/// A binary or markup artifact produced by an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Artifact {
    /// An image captured from the workspace, base64-encoded.
    Image {
        /// Filename the executed code wrote (token-prefixed).
        name: String,
        /// Media type guessed from the filename (e.g. `image/png`).
        media_type: String,
        /// Base64-encoded file contents.
        data: String,
    },
    /// Markup returned verbatim for client-side rendering.
    Html {
        /// The original snippet, untouched.
        source: String,
    },
}

/// How an execution failed, for caller-side rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The executed code itself failed (non-zero exit, unhandled
    /// exception). Render like a stack trace.
    Runtime,
    /// The execution environment failed (daemon unreachable, image
    /// missing). Render as "environment unavailable".
    Infrastructure,
    /// The execution exceeded its deadline and was killed.
    Timeout,
}

/// Structured error carried inside an [`ExecutionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The single result object returned to the caller for every request.
///
/// Errors are data at this boundary: a launch failure or a crash of the
/// executed code populates `runtime_error` rather than failing the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Captured standard output, split into lines.
    pub stdout: Vec<String>,
    /// Captured standard error, split into lines. Non-empty stderr with a
    /// zero exit code is warning text, not a failure.
    pub stderr: Vec<String>,
    /// Present when the code or the environment failed.
    pub runtime_error: Option<RuntimeError>,
    /// Artifacts collected from the workspace, in figure order. May be
    /// non-empty even when `runtime_error` is set (figures saved before a
    /// later crash are still returned).
    pub artifacts: Vec<Artifact>,
    /// Whether stdout/stderr were cut off at the output cap.
    pub truncated: bool,
}

impl ExecutionResult {
    /// A result with no output at all.
    pub(crate) fn empty() -> Self {
        Self {
            stdout: split_lines(""),
            stderr: split_lines(""),
            runtime_error: None,
            artifacts: Vec::new(),
            truncated: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.runtime_error.is_none()
    }
}

/// Split a captured stream into lines, dropping trailing newlines first.
///
/// An empty stream yields a single empty line, matching the shape the tool
/// layer has always received.
pub(crate) fn split_lines(stream: &str) -> Vec<String> {
    stream
        .trim_end_matches(['\n', '\r'])
        .split('\n')
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect()
}
