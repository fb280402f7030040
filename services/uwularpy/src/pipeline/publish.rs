//! Pull request publication and requester notification

use tracing::info;

use crate::github::{GitHubApi, GitHubError, NewPullRequest, PullRequest, RepoRef};

pub fn pull_title(issue_number: u64) -> String {
    format!("Uwuify markdown files (requested in #{issue_number})")
}

pub fn pull_body(issue_number: u64, requester: &str) -> String {
    format!(
        "This PR uwuifies all markdown files in the repository as requested by @{requester} in issue #{issue_number}."
    )
}

pub fn notification(requester: &str, pull: &PullRequest) -> String {
    format!(
        "@{requester} I've created a pull request with uwuified markdown files: {}",
        pull.html_url
    )
}

/// Open the pull request from `branch` into `base` and tell the requester.
///
/// Fails if a pull request already exists for the branch pair.
pub async fn publish(
    api: &dyn GitHubApi,
    repo: &RepoRef,
    branch: &str,
    base: &str,
    issue_number: u64,
    requester: &str,
) -> Result<PullRequest, GitHubError> {
    let pull = api
        .create_pull(
            repo,
            &NewPullRequest {
                title: pull_title(issue_number),
                body: pull_body(issue_number, requester),
                head: branch.to_string(),
                base: base.to_string(),
            },
        )
        .await?;
    info!(repo = %repo, pr = pull.number, url = %pull.html_url, "Opened pull request");

    api.create_issue_comment(repo, issue_number, &notification(requester, &pull))
        .await?;
    info!(repo = %repo, issue = issue_number, requester = %requester, "Notified requester");

    Ok(pull)
}
