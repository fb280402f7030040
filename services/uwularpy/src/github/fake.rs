//! In-memory GitHub for pipeline and router tests.
//!
//! Every branch points at an immutable snapshot of `path -> blob`; each write
//! produces a new snapshot, so blob SHAs behave as concurrency tokens the way
//! they do on GitHub.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    EntryKind, FileDelete, FileWrite, GitHubApi, GitHubError, NewPullRequest, PullRequest,
    RepoFile, RepoRef, Tree, TreeEntry,
};

#[derive(Debug, Clone)]
struct Blob {
    sha: String,
    content: String,
}

type Snapshot = BTreeMap<String, Blob>;

#[derive(Default)]
struct State {
    branches: HashMap<String, String>,
    commits: HashMap<String, Snapshot>,
    pulls: Vec<NewPullRequest>,
    comments: Vec<(u64, String)>,
    calls: Vec<String>,
    writes: Vec<String>,
    fail_put_on: Option<String>,
    next_id: u64,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn head(&self, branch: &str) -> Result<Snapshot, GitHubError> {
        self.branches
            .get(branch)
            .and_then(|commit| self.commits.get(commit))
            .cloned()
            .ok_or_else(|| not_found(&format!("branch {branch}")))
    }

    fn commit(&mut self, branch: &str, snapshot: Snapshot) {
        let sha = self.id("commit-");
        self.commits.insert(sha.clone(), snapshot);
        self.branches.insert(branch.to_string(), sha);
    }
}

fn not_found(what: &str) -> GitHubError {
    GitHubError::Api {
        status: 404,
        message: format!("Not Found: {what}"),
    }
}

fn unprocessable(message: &str) -> GitHubError {
    GitHubError::Api {
        status: 422,
        message: message.to_string(),
    }
}

/// Single-repository fake; the `RepoRef` argument is recorded but not used
/// for lookup.
#[derive(Default)]
pub(crate) struct FakeGitHub {
    state: Mutex<State>,
}

impl FakeGitHub {
    /// Repository whose `main` branch holds `files`
    pub(crate) fn with_files(files: &[(&str, &str)]) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            let mut snapshot = Snapshot::new();
            for (path, content) in files {
                let sha = state.id("blob-");
                snapshot.insert(
                    path.to_string(),
                    Blob {
                        sha,
                        content: content.to_string(),
                    },
                );
            }
            state.commit("main", snapshot);
        }
        fake
    }

    /// Add an extra branch pointing at the current `main` commit
    pub(crate) fn with_branch(self, branch: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let main = state.branches["main"].clone();
            state.branches.insert(branch.to_string(), main);
        }
        self
    }

    /// Make the create-or-update call for `path` fail with a 409
    pub(crate) fn fail_put_on(self, path: &str) -> Self {
        self.state.lock().unwrap().fail_put_on = Some(path.to_string());
        self
    }

    pub(crate) fn files(&self, branch: &str) -> BTreeMap<String, String> {
        let state = self.state.lock().unwrap();
        state
            .head(branch)
            .map(|snapshot| {
                snapshot
                    .into_iter()
                    .map(|(path, blob)| (path, blob.content))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn has_branch(&self, branch: &str) -> bool {
        self.state.lock().unwrap().branches.contains_key(branch)
    }

    pub(crate) fn head_sha(&self, branch: &str) -> Option<String> {
        self.state.lock().unwrap().branches.get(branch).cloned()
    }

    pub(crate) fn pulls(&self) -> Vec<NewPullRequest> {
        self.state.lock().unwrap().pulls.clone()
    }

    pub(crate) fn comments(&self) -> Vec<(u64, String)> {
        self.state.lock().unwrap().comments.clone()
    }

    /// Names of every API operation invoked, in order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Paths written or deleted, in order
    pub(crate) fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    fn record(&self, call: &str) -> std::sync::MutexGuard<'_, State> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        state
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn get_ref(&self, _repo: &RepoRef, branch: &str) -> Result<String, GitHubError> {
        let state = self.record("get_ref");
        state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| not_found(&format!("heads/{branch}")))
    }

    async fn create_ref(
        &self,
        _repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), GitHubError> {
        let mut state = self.record("create_ref");
        if state.branches.contains_key(branch) {
            return Err(unprocessable("Reference already exists"));
        }
        if !state.commits.contains_key(sha) {
            return Err(unprocessable("Object does not exist"));
        }
        state.branches.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn get_commit_tree(
        &self,
        _repo: &RepoRef,
        commit_sha: &str,
    ) -> Result<String, GitHubError> {
        let state = self.record("get_commit_tree");
        if state.commits.contains_key(commit_sha) {
            Ok(format!("tree-of-{commit_sha}"))
        } else {
            Err(not_found(commit_sha))
        }
    }

    async fn get_tree(&self, _repo: &RepoRef, tree_sha: &str) -> Result<Tree, GitHubError> {
        let state = self.record("get_tree");
        let commit = tree_sha
            .strip_prefix("tree-of-")
            .ok_or_else(|| not_found(tree_sha))?;
        let snapshot = state.commits.get(commit).ok_or_else(|| not_found(tree_sha))?;

        let mut entries = Vec::new();
        let mut dirs = std::collections::BTreeSet::new();
        for (path, blob) in snapshot {
            let mut parent = path.as_str();
            while let Some((dir, _)) = parent.rsplit_once('/') {
                dirs.insert(dir.to_string());
                parent = dir;
            }
            entries.push(TreeEntry {
                path: path.clone(),
                kind: EntryKind::Blob,
                sha: blob.sha.clone(),
            });
        }
        for dir in dirs {
            entries.push(TreeEntry {
                path: dir.clone(),
                kind: EntryKind::Tree,
                sha: format!("dir-{dir}"),
            });
        }

        Ok(Tree {
            sha: tree_sha.to_string(),
            tree: entries,
            truncated: false,
        })
    }

    async fn get_content(
        &self,
        _repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> Result<RepoFile, GitHubError> {
        let state = self.record("get_content");
        let blob = state
            .head(git_ref)?
            .remove(path)
            .ok_or_else(|| not_found(path))?;
        Ok(RepoFile {
            path: path.to_string(),
            sha: blob.sha,
            content: blob.content,
        })
    }

    async fn put_content(
        &self,
        _repo: &RepoRef,
        write: FileWrite<'_>,
    ) -> Result<String, GitHubError> {
        let mut state = self.record("put_content");
        if state.fail_put_on.as_deref() == Some(write.path) {
            return Err(GitHubError::Api {
                status: 409,
                message: format!("{} does not match", write.path),
            });
        }

        let mut snapshot = state.head(write.branch)?;
        match (snapshot.get(write.path), write.sha) {
            (Some(existing), Some(sha)) if existing.sha != sha => {
                return Err(GitHubError::Api {
                    status: 409,
                    message: format!("{} does not match {sha}", write.path),
                })
            }
            (Some(_), None) => return Err(unprocessable("\"sha\" wasn't supplied.")),
            (None, Some(_)) => return Err(not_found(write.path)),
            _ => {}
        }

        let sha = state.id("blob-");
        snapshot.insert(
            write.path.to_string(),
            Blob {
                sha: sha.clone(),
                content: write.content.to_string(),
            },
        );
        state.commit(write.branch, snapshot);
        state.writes.push(write.path.to_string());
        Ok(sha)
    }

    async fn delete_content(
        &self,
        _repo: &RepoRef,
        delete: FileDelete<'_>,
    ) -> Result<(), GitHubError> {
        let mut state = self.record("delete_content");
        let mut snapshot = state.head(delete.branch)?;
        match snapshot.get(delete.path) {
            Some(existing) if existing.sha == delete.sha => {}
            Some(_) => {
                return Err(GitHubError::Api {
                    status: 409,
                    message: format!("{} does not match {}", delete.path, delete.sha),
                })
            }
            None => return Err(not_found(delete.path)),
        }

        snapshot.remove(delete.path);
        state.commit(delete.branch, snapshot);
        state.writes.push(delete.path.to_string());
        Ok(())
    }

    async fn create_pull(
        &self,
        _repo: &RepoRef,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError> {
        let mut state = self.record("create_pull");
        if !state.branches.contains_key(&pull.head) {
            return Err(unprocessable("head invalid"));
        }
        if state
            .pulls
            .iter()
            .any(|p| p.head == pull.head && p.base == pull.base)
        {
            return Err(unprocessable(&format!(
                "A pull request already exists for {}.",
                pull.head
            )));
        }

        state.pulls.push(pull.clone());
        let number = 100 + state.pulls.len() as u64;
        Ok(PullRequest {
            number,
            html_url: format!("https://github.com/acme/widgets/pull/{number}"),
        })
    }

    async fn create_issue_comment(
        &self,
        _repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let mut state = self.record("create_issue_comment");
        state.comments.push((issue_number, body.to_string()));
        Ok(())
    }
}
