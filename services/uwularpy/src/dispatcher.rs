//! Webhook Dispatcher
//!
//! Authenticates a delivery, decides whether it is a trigger, and runs the
//! pipeline for it. Anything that is not a freshly created comment
//! mentioning the trigger is acknowledged and ignored.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::InstallationClients;
use crate::github::{GitHubError, RepoRef};
use crate::pipeline::{Job, Pipeline, PipelineError, PipelineOutcome};
use crate::signature::{SignatureError, SignatureVerifier};

/// Header naming the event type of a delivery
pub const EVENT_HEADER: &str = "X-GitHub-Event";

/// Just enough of a delivery to filter on
#[derive(Debug, Deserialize)]
struct ActionPayload {
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueCommentPayload {
    issue: IssuePayload,
    comment: CommentPayload,
    repository: RepositoryPayload,
    installation: Option<InstallationPayload>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct CommentPayload {
    body: String,
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name: String,
    owner: UserPayload,
}

#[derive(Debug, Deserialize)]
struct InstallationPayload {
    id: u64,
}

/// An `issue_comment` delivery, flattened
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub issue_number: u64,
    pub requester_login: String,
    pub comment_body: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub installation_id: Option<u64>,
}

impl WebhookEvent {
    /// Parse an `issue_comment` payload
    pub fn issue_comment(body: &[u8]) -> Result<Self, serde_json::Error> {
        let payload: IssueCommentPayload = serde_json::from_slice(body)?;

        Ok(Self {
            issue_number: payload.issue.number,
            requester_login: payload.comment.user.login,
            comment_body: payload.comment.body,
            repo_owner: payload.repository.owner.login,
            repo_name: payload.repository.name,
            installation_id: payload.installation.map(|i| i.id),
        })
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new(&self.repo_owner, &self.repo_name)
    }
}

/// What happened to a delivery that was not an error
#[derive(Debug)]
pub enum Delivery {
    /// Acknowledged without doing anything
    Ignored(&'static str),
    Completed(PipelineOutcome),
}

/// Why a delivery failed
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Webhook signature verification failed: {0}")]
    Unauthorized(#[from] SignatureError),

    #[error("Failed to parse issue_comment payload: {0}")]
    BadPayload(#[from] serde_json::Error),

    #[error("Delivery for issue #{0} carries no installation")]
    MissingInstallation(u64),

    #[error("Failed to authenticate installation {installation_id}: {source}")]
    Installation {
        installation_id: u64,
        #[source]
        source: GitHubError,
    },

    #[error("A run for {repo}#{issue_number} is already in progress")]
    InFlight { repo: RepoRef, issue_number: u64 },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DispatchError::BadPayload(_)
            | DispatchError::MissingInstallation(_)
            | DispatchError::Installation { .. }
            | DispatchError::InFlight { .. }
            | DispatchError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

type IssueKey = (RepoRef, u64);

/// Issues with a run in progress
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<IssueKey>>>,
}

/// Releases its issue when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<IssueKey>>>,
    key: IssueKey,
}

impl InFlight {
    /// Claim `issue_number` on `repo`, or `None` if a run already holds it
    pub fn try_claim(&self, repo: &RepoRef, issue_number: u64) -> Option<InFlightGuard> {
        let key = (repo.clone(), issue_number);
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if !active.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.key);
    }
}

/// Routes authenticated deliveries into the pipeline
pub struct Dispatcher {
    verifier: SignatureVerifier,
    trigger: String,
    installations: Arc<dyn InstallationClients>,
    pipeline: Pipeline,
    in_flight: InFlight,
}

impl Dispatcher {
    pub fn new(
        verifier: SignatureVerifier,
        trigger: impl Into<String>,
        installations: Arc<dyn InstallationClients>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            verifier,
            trigger: trigger.into(),
            installations,
            pipeline,
            in_flight: InFlight::default(),
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Handle one delivery.
    ///
    /// The signature is checked before anything else is looked at.
    pub async fn handle(
        &self,
        event: Option<&str>,
        signature: Option<&str>,
        body: Bytes,
    ) -> Result<Delivery, DispatchError> {
        self.verifier.verify(&body, signature)?;

        match event {
            Some("issue_comment") => {}
            Some("ping") => {
                info!("Received ping event");
                return Ok(Delivery::Ignored("ping"));
            }
            other => {
                info!(event = other.unwrap_or("unknown"), "Ignoring GitHub event");
                return Ok(Delivery::Ignored("event type"));
            }
        }

        let ActionPayload { action } = serde_json::from_slice(&body)?;
        if action.as_deref() != Some("created") {
            info!(action = action.as_deref().unwrap_or("none"), "Ignoring comment action");
            return Ok(Delivery::Ignored("comment action"));
        }

        let event = WebhookEvent::issue_comment(&body)?;
        if !event.comment_body.contains(&self.trigger) {
            return Ok(Delivery::Ignored("no trigger"));
        }

        let repo = event.repo();
        info!(
            repo = %repo,
            issue = event.issue_number,
            requester = %event.requester_login,
            "Mention detected"
        );

        let installation_id = event
            .installation_id
            .ok_or(DispatchError::MissingInstallation(event.issue_number))?;

        let Some(_guard) = self.in_flight.try_claim(&repo, event.issue_number) else {
            warn!(repo = %repo, issue = event.issue_number, "Run already in progress");
            return Err(DispatchError::InFlight {
                repo,
                issue_number: event.issue_number,
            });
        };

        let api = self
            .installations
            .client_for(installation_id)
            .await
            .map_err(|source| DispatchError::Installation {
                installation_id,
                source,
            })?;

        let job = Job {
            repo,
            issue_number: event.issue_number,
            requester: event.requester_login,
        };

        match self.pipeline.run(api.as_ref(), &job).await {
            Ok(outcome) => Ok(Delivery::Completed(outcome)),
            Err(e) => {
                error!(
                    repo = %job.repo,
                    issue = job.issue_number,
                    step = %e.step,
                    files_updated = e.files_updated,
                    error = %e.source,
                    "Pipeline failed"
                );
                Err(e.into())
            }
        }
    }
}
