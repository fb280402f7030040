//! Tree Transformation
//!
//! Rewrites every markdown blob on the working branch, one commit per file,
//! then removes the injected script.
//!
//! Files are processed in the order the tree listing returns them. There
//! is no rollback: if a later update fails, files already committed stay
//! rewritten and [`TransformError::updated`] says which.

use thiserror::Error;
use tracing::{debug, info};

use super::script::SCRIPT_PATH;
use crate::github::{EntryKind, FileDelete, FileWrite, GitHubApi, GitHubError, RepoRef, TreeEntry};
use crate::uwu::TextTransform;

/// Extension selecting files to rewrite
pub const MARKDOWN_EXTENSION: &str = ".md";

/// Outcome of a completed transformation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// Paths rewritten, in processing order
    pub updated: Vec<String>,
}

/// Transformation stopped part way
#[derive(Debug, Error)]
#[error("transform stopped after {} file(s): {source}", updated.len())]
pub struct TransformError {
    /// Paths already committed when the failure happened
    pub updated: Vec<String>,
    #[source]
    pub source: GitHubError,
}

/// Blob entries whose path ends in `.md`, in listing order
pub fn markdown_entries(entries: &[TreeEntry]) -> impl Iterator<Item = &TreeEntry> {
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Blob && e.path.ends_with(MARKDOWN_EXTENSION))
}

/// Rewrite all markdown on `branch` with `transform`, then delete the script.
pub async fn transform_tree(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    branch: &str,
    transform: &dyn TextTransform,
) -> Result<TransformReport, TransformError> {
    let mut updated = Vec::new();

    match run(api, repo, branch, transform, &mut updated).await {
        Ok(()) => Ok(TransformReport { updated }),
        Err(source) => Err(TransformError { updated, source }),
    }
}

async fn run(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    branch: &str,
    transform: &dyn TextTransform,
    updated: &mut Vec<String>,
) -> Result<(), GitHubError> {
    let commit_sha = api.get_ref(repo, branch).await?;
    let tree_sha = api.get_commit_tree(repo, &commit_sha).await?;
    let tree = api.get_tree(repo, &tree_sha).await?;

    let targets: Vec<&TreeEntry> = markdown_entries(&tree.tree).collect();
    info!(repo = %repo, branch = %branch, files = targets.len(), "Rewriting markdown files");

    for entry in targets {
        let file = api.get_content(repo, &entry.path, branch).await?;
        let rewritten = transform.transform(&file.content);
        let message = format!("Uwuify {}", file.path);

        // The blob SHA read above is the concurrency token; a concurrent
        // edit makes this update fail rather than overwrite it.
        let sha = api
            .put_content(
                repo,
                FileWrite {
                    path: &file.path,
                    message: &message,
                    content: &rewritten,
                    branch,
                    sha: Some(&file.sha),
                },
            )
            .await?;

        debug!(path = %file.path, old_sha = %file.sha, new_sha = %sha, "Rewrote file");
        updated.push(file.path);
    }

    let script = api.get_content(repo, SCRIPT_PATH, branch).await?;
    api.delete_content(
        repo,
        FileDelete {
            path: SCRIPT_PATH,
            message: "Remove uwuify script",
            branch,
            sha: &script.sha,
        },
    )
    .await?;

    info!(
        repo = %repo,
        branch = %branch,
        rewritten = updated.len(),
        "Markdown rewritten and script removed"
    );
    Ok(())
}
