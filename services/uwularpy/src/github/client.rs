//! REST implementation of [`GitHubApi`] over `reqwest`.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    FileDelete, FileWrite, GitHubApi, GitHubError, NewPullRequest, PullRequest, RepoFile,
    RepoRef, Tree,
};

pub(crate) const USER_AGENT: &str = "uwularpy";
pub(crate) const API_VERSION: &str = "2022-11-28";

/// GitHub client bound to one installation token
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct GitCommit {
    tree: GitObject,
}

#[derive(Serialize)]
struct CreateRef<'a> {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: &'a str,
}

#[derive(Deserialize)]
struct ContentResponse {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Serialize)]
struct PutContent<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutContentResponse {
    content: GitObject,
}

#[derive(Serialize)]
struct DeleteContent<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Serialize)]
struct NewComment<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl RestClient {
    pub fn new(http: Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn repo_url(&self, repo: &RepoRef, rest: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            rest
        )
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        with_github_headers(builder).bearer_auth(&self.token)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GitHubError> {
        let response = check(self.authed(builder).send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<(), GitHubError> {
        check(self.authed(builder).send().await?).await?;
        Ok(())
    }
}

/// Headers every GitHub request carries
pub(crate) fn with_github_headers(builder: RequestBuilder) -> RequestBuilder {
    builder
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", USER_AGENT)
        .header("X-GitHub-Api-Version", API_VERSION)
}

/// Turn a non-2xx response into [`GitHubError::Api`].
pub(crate) async fn check(response: Response) -> Result<Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);

    Err(GitHubError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Percent-encode each segment of a repository path, keeping separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decode contents-API base64, which GitHub wraps at 60 columns.
fn decode_content(encoded: &str) -> Result<String, GitHubError> {
    let compact: String = encoded.split_whitespace().collect();
    let bytes = general_purpose::STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

#[async_trait]
impl GitHubApi for RestClient {
    async fn get_ref(&self, repo: &RepoRef, branch: &str) -> Result<String, GitHubError> {
        let url = self.repo_url(repo, &format!("git/ref/heads/{}", encode_path(branch)));
        let git_ref: GitRef = self.json(self.http.get(url)).await?;
        Ok(git_ref.object.sha)
    }

    async fn create_ref(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), GitHubError> {
        let body = CreateRef {
            git_ref: format!("refs/heads/{branch}"),
            sha,
        };
        self.send(self.http.post(self.repo_url(repo, "git/refs")).json(&body))
            .await
    }

    async fn get_commit_tree(
        &self,
        repo: &RepoRef,
        commit_sha: &str,
    ) -> Result<String, GitHubError> {
        let url = self.repo_url(repo, &format!("git/commits/{commit_sha}"));
        let commit: GitCommit = self.json(self.http.get(url)).await?;
        Ok(commit.tree.sha)
    }

    async fn get_tree(&self, repo: &RepoRef, tree_sha: &str) -> Result<Tree, GitHubError> {
        let url = self.repo_url(repo, &format!("git/trees/{tree_sha}"));
        let tree: Tree = self
            .json(self.http.get(url).query(&[("recursive", "1")]))
            .await?;

        if tree.truncated {
            warn!(
                repo = %repo,
                tree = %tree_sha,
                entries = tree.tree.len(),
                "Recursive tree listing was truncated by GitHub"
            );
        }
        Ok(tree)
    }

    async fn get_content(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> Result<RepoFile, GitHubError> {
        let url = self.repo_url(repo, &format!("contents/{}", encode_path(path)));
        let file: ContentResponse = self
            .json(self.http.get(url).query(&[("ref", git_ref)]))
            .await?;

        if file.encoding != "base64" {
            return Err(GitHubError::Unexpected(format!(
                "{} returned with encoding {:?}",
                file.path, file.encoding
            )));
        }

        debug!(path = %file.path, sha = %file.sha, "Fetched file content");
        Ok(RepoFile {
            content: decode_content(&file.content)?,
            path: file.path,
            sha: file.sha,
        })
    }

    async fn put_content(
        &self,
        repo: &RepoRef,
        write: FileWrite<'_>,
    ) -> Result<String, GitHubError> {
        let url = self.repo_url(repo, &format!("contents/{}", encode_path(write.path)));
        let body = PutContent {
            message: write.message,
            content: general_purpose::STANDARD.encode(write.content),
            branch: write.branch,
            sha: write.sha,
        };
        let response: PutContentResponse = self.json(self.http.put(url).json(&body)).await?;
        Ok(response.content.sha)
    }

    async fn delete_content(
        &self,
        repo: &RepoRef,
        delete: FileDelete<'_>,
    ) -> Result<(), GitHubError> {
        let url = self.repo_url(repo, &format!("contents/{}", encode_path(delete.path)));
        let body = DeleteContent {
            message: delete.message,
            sha: delete.sha,
            branch: delete.branch,
        };
        self.send(self.http.delete(url).json(&body)).await
    }

    async fn create_pull(
        &self,
        repo: &RepoRef,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError> {
        self.json(self.http.post(self.repo_url(repo, "pulls")).json(pull))
            .await
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let url = self.repo_url(repo, &format!("issues/{issue_number}/comments"));
        self.send(self.http.post(url).json(&NewComment { body }))
            .await
    }
}
