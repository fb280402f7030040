//! Script artifact injection
//!
//! The script is committed so the change can be reproduced by hand; it is
//! never run here and is removed again once the markdown is rewritten.

use tracing::info;

use crate::github::{FileWrite, GitHubApi, GitHubError, RepoRef};

/// Where the script lands in the working branch
pub const SCRIPT_PATH: &str = "uwuify_repo.py";

/// Script body committed to the branch
pub const SCRIPT_CONTENT: &str = include_str!("../../assets/uwuify_repo.py");

/// Create or update the script on `branch`.
pub async fn add_script(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    branch: &str,
) -> Result<String, GitHubError> {
    // A repository may already carry a copy; replacing it needs its blob SHA.
    let existing = match api.get_content(repo, SCRIPT_PATH, branch).await {
        Ok(file) => Some(file.sha),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    let sha = api
        .put_content(
            repo,
            FileWrite {
                path: SCRIPT_PATH,
                message: "Add uwuify script",
                content: SCRIPT_CONTENT,
                branch,
                sha: existing.as_deref(),
            },
        )
        .await?;

    info!(repo = %repo, branch = %branch, path = SCRIPT_PATH, sha = %sha, "Added uwuify script");
    Ok(sha)
}
