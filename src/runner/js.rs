//! JavaScript/HTML rendering path.

use async_trait::async_trait;

use crate::error::Result;
use crate::runner::{RunContext, RunOutcome, Runner};

/// Returns the snippet verbatim as renderable markup.
///
/// Nothing is executed and no container is involved: the client renders the
/// markup itself, which is its own sandbox. The workspace and token are
/// unused on this path.
pub struct JsRenderer;

#[async_trait]
impl Runner for JsRenderer {
    async fn run(&self, ctx: RunContext<'_>) -> Result<RunOutcome> {
        tracing::debug!("rendering {} byte(s) of markup", ctx.code.len());
        Ok(RunOutcome::Rendered(ctx.code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[tokio::test]
    async fn test_source_returned_verbatim() {
        let source = "<canvas id=\"c\"></canvas>\n<script>draw();</script>";
        let ctx = RunContext {
            workspace: Path::new("."),
            token: "tok",
            code: source,
        };

        match JsRenderer.run(ctx).await.unwrap() {
            RunOutcome::Rendered(markup) => assert_eq!(markup, source),
            other => panic!("expected rendered outcome, got {:?}", other),
        }
    }
}
