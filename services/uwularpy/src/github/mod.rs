//! GitHub API Access
//!
//! The subset of the REST and Git Data APIs the pipeline needs, behind a
//! trait so pipeline steps can run against an in-memory repository in tests.

pub(crate) mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use client::RestClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Owner/name pair identifying a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Kind of object a tree entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

/// One entry of a recursive tree listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub sha: String,
}

/// Recursive tree listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tree {
    pub sha: String,
    pub tree: Vec<TreeEntry>,
    /// Set by GitHub when the listing exceeded its size limit
    #[serde(default)]
    pub truncated: bool,
}

/// A file read through the contents API, already decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub path: String,
    /// Blob SHA, the optimistic-concurrency token for updates and deletes
    pub sha: String,
    pub content: String,
}

/// Create-or-update request for a single file
#[derive(Debug, Clone)]
pub struct FileWrite<'a> {
    pub path: &'a str,
    pub message: &'a str,
    /// Plain content; the client handles transport encoding
    pub content: &'a str,
    pub branch: &'a str,
    /// Current blob SHA when replacing an existing file
    pub sha: Option<&'a str>,
}

/// Delete request for a single file
#[derive(Debug, Clone)]
pub struct FileDelete<'a> {
    pub path: &'a str,
    pub message: &'a str,
    pub branch: &'a str,
    pub sha: &'a str,
}

/// Pull request creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// Created pull request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

/// Errors from talking to GitHub
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid base64 content: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("File content is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("GitHub App authentication failed: {0}")]
    Auth(String),

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl GitHubError {
    /// GitHub reports an existing ref or pull request with 422, and a stale
    /// blob SHA with 409.
    pub fn is_conflict(&self) -> bool {
        matches!(self, GitHubError::Api { status: 409 | 422, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::Api { status: 404, .. })
    }
}

/// Operations the pipeline performs against one installation's repositories
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Commit SHA at the tip of `branch`
    async fn get_ref(&self, repo: &RepoRef, branch: &str) -> Result<String, GitHubError>;

    /// Create `refs/heads/<branch>` at `sha`
    async fn create_ref(&self, repo: &RepoRef, branch: &str, sha: &str)
        -> Result<(), GitHubError>;

    /// Tree SHA of a commit
    async fn get_commit_tree(&self, repo: &RepoRef, commit_sha: &str)
        -> Result<String, GitHubError>;

    /// Full recursive listing of a tree
    async fn get_tree(&self, repo: &RepoRef, tree_sha: &str) -> Result<Tree, GitHubError>;

    /// Read and decode a file at `git_ref`
    async fn get_content(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> Result<RepoFile, GitHubError>;

    /// Create or update a file, returning its new blob SHA
    async fn put_content(&self, repo: &RepoRef, write: FileWrite<'_>)
        -> Result<String, GitHubError>;

    async fn delete_content(&self, repo: &RepoRef, delete: FileDelete<'_>)
        -> Result<(), GitHubError>;

    async fn create_pull(
        &self,
        repo: &RepoRef,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError>;

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<(), GitHubError>;
}
