//! Collects artifact files from a workspace after execution.
//!
//! Runs once per request, whether the run succeeded or failed — figures
//! saved before a later crash are still worth returning. Collection only
//! considers files carrying the request's own token prefix, so concurrent
//! requests sharing one workspace never see each other's output.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::types::Artifact;

/// Collect, encode, and remove the artifacts a request produced.
///
/// Files qualify when their extension is in `extensions` and their name
/// starts with `<token>_`. Matching files are read fully, base64-encoded,
/// and deleted from the workspace. A failure on one file is logged and
/// skipped; it never aborts collection of the rest. Returns artifacts
/// ordered by their figure index.
pub async fn collect(workspace: &Path, token: &str, extensions: &[String]) -> Vec<Artifact> {
    let prefix = format!("{}_", token);

    let mut entries = match tokio::fs::read_dir(workspace).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("failed to list workspace {}: {}", workspace.display(), e);
            return Vec::new();
        }
    };

    // (figure index if parseable, name, encoded data)
    let mut collected: Vec<(Option<usize>, String, String)> = Vec::new();

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("error reading workspace entry: {}", e);
                break;
            }
        };

        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&prefix) || !has_artifact_extension(&name, extensions) {
            continue;
        }

        let path = entry.path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("failed to read artifact {}: {}", path.display(), e);
                continue;
            }
        };

        collected.push((figure_index(&name), name, BASE64.encode(&bytes)));

        // Deletion is unconditional once the read succeeded; a failure here
        // must not mask the artifact we already hold.
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("failed to remove artifact {}: {}", path.display(), e);
        }
    }

    // Figure index order within the request; name order as a fallback for
    // artifacts the code wrote under its own names.
    collected.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    tracing::debug!(
        "collected {} artifact(s) for token {}",
        collected.len(),
        token
    );

    collected
        .into_iter()
        .map(|(_, name, data)| {
            let media_type = mime_guess::from_path(&name)
                .first_or_octet_stream()
                .to_string();
            Artifact::Image {
                name,
                media_type,
                data,
            }
        })
        .collect()
}

fn has_artifact_extension(name: &str, extensions: &[String]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            extensions.iter().any(|x| *x == e)
        })
        .unwrap_or(false)
}

/// Parse the `<N>` out of `<token>_figure_<N>.<ext>`, if present.
fn figure_index(name: &str) -> Option<usize> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    stem.rsplit_once("_figure_")?.1.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_exts() -> Vec<String> {
        vec!["png".to_string()]
    }

    #[tokio::test]
    async fn test_collect_roundtrip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = b"\x89PNG\r\n\x1a\nfakeimagedata";
        let path = dir.path().join("tok_figure_1.png");
        tokio::fs::write(&path, bytes).await.unwrap();

        let artifacts = collect(dir.path(), "tok", &png_exts()).await;
        assert_eq!(artifacts.len(), 1);

        match &artifacts[0] {
            Artifact::Image {
                name,
                media_type,
                data,
            } => {
                assert_eq!(name, "tok_figure_1.png");
                assert_eq!(media_type, "image/png");
                assert_eq!(BASE64.decode(data).unwrap(), bytes);
            }
            other => panic!("unexpected artifact: {:?}", other),
        }

        // Consumed artifacts are removed from the workspace.
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_collect_is_token_scoped() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("mine_figure_1.png"), b"a")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("other_figure_1.png"), b"b")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("data.csv"), b"c").await.unwrap();
        tokio::fs::write(dir.path().join("mine_script.py"), b"d")
            .await
            .unwrap();

        let artifacts = collect(dir.path(), "mine", &png_exts()).await;
        assert_eq!(artifacts.len(), 1);

        // Another request's figure and the uploaded data file survive.
        assert!(dir.path().join("other_figure_1.png").exists());
        assert!(dir.path().join("data.csv").exists());
        assert!(dir.path().join("mine_script.py").exists());
    }

    #[tokio::test]
    async fn test_collect_figure_order() {
        let dir = tempfile::tempdir().unwrap();
        // Write out of order, including a double-digit index that would sort
        // wrong lexicographically.
        for i in [10, 2, 1] {
            tokio::fs::write(dir.path().join(format!("t_figure_{}.png", i)), b"x")
                .await
                .unwrap();
        }

        let artifacts = collect(dir.path(), "t", &png_exts()).await;
        let names: Vec<_> = artifacts
            .iter()
            .map(|a| match a {
                Artifact::Image { name, .. } => name.clone(),
                other => panic!("unexpected artifact: {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["t_figure_1.png", "t_figure_2.png", "t_figure_10.png"]);
    }

    #[tokio::test]
    async fn test_collect_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect(dir.path(), "t", &png_exts()).await.is_empty());
    }

    #[tokio::test]
    async fn test_collect_missing_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(collect(&gone, "t", &png_exts()).await.is_empty());
    }

    #[test]
    fn test_figure_index_parsing() {
        assert_eq!(figure_index("ab_figure_3.png"), Some(3));
        assert_eq!(figure_index("ab_figure_12.png"), Some(12));
        assert_eq!(figure_index("ab_chart.png"), None);
    }
}
