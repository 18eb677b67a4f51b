//! Mock repository platform for testing.
//!
//! Holds issues, pull requests, contributors, comments and files per
//! repository in memory. Writes are visible to later reads, so an engine
//! run against it behaves like one against a quiet GitHub repository.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::platform::{
    CreatedIssue, FileUpdate, Issue, IssueComment, IssueState, PullRequest, RepoRef,
};
use crate::domain::ports::RepositoryPlatform;

/// A comment posted through the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedComment {
    pub repo: RepoRef,
    pub issue: u64,
    pub body: String,
}

#[derive(Debug, Default)]
struct RepoState {
    issues: BTreeMap<u64, Issue>,
    pulls: Vec<PullRequest>,
    contributors: Vec<String>,
    comments: HashMap<u64, Vec<IssueComment>>,
    files: HashMap<String, (String, String)>,
    next_number: u64,
}

impl RepoState {
    fn allocate_number(&mut self) -> u64 {
        let used = self.issues.keys().copied().max().unwrap_or(0);
        let pulls = self.pulls.iter().map(|p| p.number).max().unwrap_or(0);
        self.next_number = self.next_number.max(used).max(pulls) + 1;
        self.next_number
    }
}

#[derive(Debug, Default)]
struct State {
    repos: HashMap<RepoRef, RepoState>,
    posted: Vec<RecordedComment>,
    state_changes: Vec<(RepoRef, u64, IssueState)>,
    file_writes: u64,
}

/// Mock platform for testing.
#[derive(Clone, Default)]
pub struct MockPlatform {
    state: Arc<RwLock<State>>,
    read_delay: Option<Duration>,
    fail_reads: bool,
    bot_login: String,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            bot_login: "questbuddy[bot]".to_string(),
            ..Self::default()
        }
    }

    /// Every read fails with a platform error.
    pub fn failing() -> Self {
        Self {
            fail_reads: true,
            ..Self::new()
        }
    }

    /// Every read sleeps for `delay` before answering.
    pub fn with_read_delay(delay: Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..Self::new()
        }
    }

    /// Seed an open issue authored by `author`. Returns its number.
    pub async fn add_issue(&self, repo: &RepoRef, title: &str, author: &str, assignees: &[&str]) -> u64 {
        let mut state = self.state.write().await;
        let repo_state = state.repos.entry(repo.clone()).or_default();
        let number = repo_state.allocate_number();
        repo_state.issues.insert(
            number,
            Issue {
                number,
                title: title.to_string(),
                body: None,
                state: IssueState::Open,
                author: author.to_string(),
                assignees: assignees.iter().map(|a| (*a).to_string()).collect(),
                is_pull_request: false,
            },
        );
        number
    }

    pub async fn set_issue_body(&self, repo: &RepoRef, number: u64, body: &str) {
        let mut state = self.state.write().await;
        if let Some(issue) = state
            .repos
            .get_mut(repo)
            .and_then(|r| r.issues.get_mut(&number))
        {
            issue.body = Some(body.to_string());
        }
    }

    pub async fn assign(&self, repo: &RepoRef, number: u64, login: &str) {
        let mut state = self.state.write().await;
        if let Some(issue) = state
            .repos
            .get_mut(repo)
            .and_then(|r| r.issues.get_mut(&number))
        {
            issue.assignees.push(login.to_string());
        }
    }

    /// Seed an open pull request. It also shows up in the issues listing.
    pub async fn add_pull_request(&self, repo: &RepoRef, author: &str) -> u64 {
        let mut state = self.state.write().await;
        let repo_state = state.repos.entry(repo.clone()).or_default();
        let number = repo_state.allocate_number();
        repo_state.pulls.push(PullRequest {
            number,
            author: author.to_string(),
        });
        repo_state.issues.insert(
            number,
            Issue {
                number,
                title: format!("Pull request #{number}"),
                body: None,
                state: IssueState::Open,
                author: author.to_string(),
                assignees: Vec::new(),
                is_pull_request: true,
            },
        );
        number
    }

    pub async fn add_contributor(&self, repo: &RepoRef, login: &str) {
        let mut state = self.state.write().await;
        state
            .repos
            .entry(repo.clone())
            .or_default()
            .contributors
            .push(login.to_string());
    }

    /// Seed a comment without recording it as posted by the bot.
    pub async fn add_comment(&self, repo: &RepoRef, number: u64, author: &str, body: &str) {
        let mut state = self.state.write().await;
        state
            .repos
            .entry(repo.clone())
            .or_default()
            .comments
            .entry(number)
            .or_default()
            .push(IssueComment {
                author: author.to_string(),
                body: body.to_string(),
            });
    }

    /// Comments posted through the port, in order.
    pub async fn posted_comments(&self) -> Vec<RecordedComment> {
        self.state.read().await.posted.clone()
    }

    pub async fn issues(&self, repo: &RepoRef) -> Vec<Issue> {
        self.state
            .read()
            .await
            .repos
            .get(repo)
            .map(|r| r.issues.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn state_changes(&self) -> Vec<(RepoRef, u64, IssueState)> {
        self.state.read().await.state_changes.clone()
    }

    pub async fn file(&self, repo: &RepoRef, path: &str) -> Option<String> {
        self.state
            .read()
            .await
            .repos
            .get(repo)
            .and_then(|r| r.files.get(path))
            .map(|(content, _)| content.clone())
    }

    pub async fn file_writes(&self) -> u64 {
        self.state.read().await.file_writes
    }

    async fn before_read(&self) -> DomainResult<()> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads {
            return Err(DomainError::PlatformError("mock platform read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryPlatform for MockPlatform {
    async fn list_open_issues(&self, repo: &RepoRef) -> DomainResult<Vec<Issue>> {
        self.before_read().await?;
        Ok(self
            .issues(repo)
            .await
            .into_iter()
            .filter(|i| i.state == IssueState::Open)
            .collect())
    }

    async fn list_open_pull_requests(&self, repo: &RepoRef) -> DomainResult<Vec<PullRequest>> {
        self.before_read().await?;
        let state = self.state.read().await;
        let Some(repo_state) = state.repos.get(repo) else {
            return Ok(Vec::new());
        };
        Ok(repo_state
            .pulls
            .iter()
            .filter(|p| {
                repo_state
                    .issues
                    .get(&p.number)
                    .map_or(true, |i| i.state == IssueState::Open)
            })
            .cloned()
            .collect())
    }

    async fn list_contributors(&self, repo: &RepoRef) -> DomainResult<Vec<String>> {
        self.before_read().await?;
        Ok(self
            .state
            .read()
            .await
            .repos
            .get(repo)
            .map(|r| r.contributors.clone())
            .unwrap_or_default())
    }

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> DomainResult<Issue> {
        self.before_read().await?;
        self.state
            .read()
            .await
            .repos
            .get(repo)
            .and_then(|r| r.issues.get(&number))
            .cloned()
            .ok_or_else(|| DomainError::PlatformError(format!("GitHub get_issue returned 404 Not Found: #{number}")))
    }

    async fn list_issue_comments(&self, repo: &RepoRef, number: u64) -> DomainResult<Vec<IssueComment>> {
        self.before_read().await?;
        Ok(self
            .state
            .read()
            .await
            .repos
            .get(repo)
            .and_then(|r| r.comments.get(&number))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> DomainResult<CreatedIssue> {
        let mut state = self.state.write().await;
        let repo_state = state.repos.entry(repo.clone()).or_default();
        let number = repo_state.allocate_number();
        repo_state.issues.insert(
            number,
            Issue {
                number,
                title: title.to_string(),
                body: Some(body.to_string()),
                state: IssueState::Open,
                author: self.bot_login.clone(),
                assignees: Vec::new(),
                is_pull_request: false,
            },
        );
        Ok(CreatedIssue {
            number,
            html_url: format!("{}/issues/{number}", repo.html_url()),
        })
    }

    async fn update_issue_state(&self, repo: &RepoRef, number: u64, new_state: IssueState) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let issue = state
            .repos
            .get_mut(repo)
            .and_then(|r| r.issues.get_mut(&number))
            .ok_or_else(|| DomainError::PlatformError(format!("GitHub update_issue_state returned 404 Not Found: #{number}")))?;
        issue.state = new_state;
        state.state_changes.push((repo.clone(), number, new_state));
        Ok(())
    }

    async fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let bot = self.bot_login.clone();
        state
            .repos
            .entry(repo.clone())
            .or_default()
            .comments
            .entry(number)
            .or_default()
            .push(IssueComment {
                author: bot,
                body: body.to_string(),
            });
        state.posted.push(RecordedComment {
            repo: repo.clone(),
            issue: number,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn get_file_sha(&self, repo: &RepoRef, path: &str) -> DomainResult<Option<String>> {
        self.before_read().await?;
        Ok(self
            .state
            .read()
            .await
            .repos
            .get(repo)
            .and_then(|r| r.files.get(path))
            .map(|(_, sha)| sha.clone()))
    }

    async fn put_file(&self, repo: &RepoRef, update: &FileUpdate) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let revision = state.file_writes + 1;
        let files = &mut state.repos.entry(repo.clone()).or_default().files;

        let existing = files.get(&update.path).map(|(_, sha)| sha.clone());
        if existing != update.sha {
            return Err(DomainError::PlatformError(format!(
                "GitHub put_content returned 409 Conflict: {} does not match",
                update.path
            )));
        }
        files.insert(
            update.path.clone(),
            (update.content.clone(), format!("sha-{revision}")),
        );
        state.file_writes = revision;
        Ok(())
    }
}
