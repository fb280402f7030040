//! Webhook-to-Pull-Request Pipeline
//!
//! Four strictly sequential steps, each depending on the effect of the one
//! before it:
//!
//! 1. [`branch::create_branch`] cuts `uwuify-issue-<n>` from the base branch
//! 2. [`script::add_script`] commits the script artifact
//! 3. [`transform::transform_tree`] rewrites markdown and removes the script
//! 4. [`publish::publish`] opens the pull request and notifies the requester
//!
//! The first failure short-circuits the run. [`PipelineError`] records the
//! step that failed so cleanup can be attached later; nothing is undone here.

pub mod branch;
pub mod publish;
pub mod script;
pub mod transform;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::github::{GitHubApi, GitHubError, RepoRef};
use crate::uwu::TextTransform;

pub use branch::WorkingBranch;
pub use transform::TransformReport;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateBranch,
    AddScript,
    Transform,
    Publish,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::CreateBranch => write!(f, "create_branch"),
            Step::AddScript => write!(f, "add_script"),
            Step::Transform => write!(f, "transform"),
            Step::Publish => write!(f, "publish"),
        }
    }
}

/// A run stopped at `step`
#[derive(Debug, Error)]
#[error("{step} failed after {files_updated} markdown file(s) rewritten: {source}")]
pub struct PipelineError {
    pub step: Step,
    /// Markdown files already committed; non-zero means the branch is
    /// partially transformed
    pub files_updated: usize,
    #[source]
    pub source: GitHubError,
}

impl PipelineError {
    fn at(step: Step, files_updated: usize) -> impl FnOnce(GitHubError) -> Self {
        move |source| Self {
            step,
            files_updated,
            source,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.files_updated > 0
    }
}

/// One triggered request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub repo: RepoRef,
    pub issue_number: u64,
    pub requester: String,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub branch: String,
    pub pr_number: u64,
    pub pr_url: String,
    pub files_updated: Vec<String>,
}

/// Runs jobs against one installation's API client
pub struct Pipeline {
    base_branch: String,
    transform: Arc<dyn TextTransform>,
}

impl Pipeline {
    pub fn new(base_branch: impl Into<String>, transform: Arc<dyn TextTransform>) -> Self {
        Self {
            base_branch: base_branch.into(),
            transform,
        }
    }

    pub async fn run(
        &self,
        api: &dyn GitHubApi,
        job: &Job,
    ) -> Result<PipelineOutcome, PipelineError> {
        let repo = &job.repo;

        let branch = branch::create_branch(api, repo, &self.base_branch, job.issue_number)
            .await
            .map_err(PipelineError::at(Step::CreateBranch, 0))?;

        script::add_script(api, repo, &branch.name)
            .await
            .map_err(PipelineError::at(Step::AddScript, 0))?;

        let report = transform::transform_tree(api, repo, &branch.name, self.transform.as_ref())
            .await
            .map_err(|e| PipelineError::at(Step::Transform, e.updated.len())(e.source))?;

        let pull = publish::publish(
            api,
            repo,
            &branch.name,
            &self.base_branch,
            job.issue_number,
            &job.requester,
        )
        .await
        .map_err(PipelineError::at(Step::Publish, report.updated.len()))?;

        info!(
            repo = %repo,
            issue = job.issue_number,
            pr = pull.number,
            files = report.updated.len(),
            "Pipeline complete"
        );

        Ok(PipelineOutcome {
            branch: branch.name,
            pr_number: pull.number,
            pr_url: pull.html_url,
            files_updated: report.updated,
        })
    }
}
