//! Working branch creation

use tracing::info;

use crate::github::{GitHubApi, GitHubError, RepoRef};

/// Branch cut for one triggering issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingBranch {
    pub name: String,
    /// Base branch commit the new branch points at
    pub base_sha: String,
}

/// Branch name for an issue. Re-triggering the same issue collides on it.
pub fn branch_name(issue_number: u64) -> String {
    format!("uwuify-issue-{issue_number}")
}

/// Snapshot the tip of `base` into a new `uwuify-issue-<n>` branch.
///
/// Fails with a 422 conflict if the branch already exists; there is no
/// rename or retry.
pub async fn create_branch(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    base: &str,
    issue_number: u64,
) -> Result<WorkingBranch, GitHubError> {
    let base_sha = api.get_ref(repo, base).await?;
    let name = branch_name(issue_number);

    api.create_ref(repo, &name, &base_sha).await?;
    info!(repo = %repo, branch = %name, base = %base, sha = %base_sha, "Created branch");

    Ok(WorkingBranch { name, base_sha })
}
