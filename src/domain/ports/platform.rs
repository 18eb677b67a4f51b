//! Repository-hosting platform port.
//!
//! Everything the bot reads from or writes to the hosting platform goes
//! through this trait. All calls are fallible remote calls.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::platform::{
    CreatedIssue, FileUpdate, Issue, IssueComment, IssueState, PullRequest, RepoRef,
};

#[async_trait]
pub trait RepositoryPlatform: Send + Sync {
    /// Open issues of a repository. Pull requests are included and flagged.
    async fn list_open_issues(&self, repo: &RepoRef) -> DomainResult<Vec<Issue>>;

    /// Open pull requests of a repository.
    async fn list_open_pull_requests(&self, repo: &RepoRef) -> DomainResult<Vec<PullRequest>>;

    /// Logins of the repository's contributors.
    async fn list_contributors(&self, repo: &RepoRef) -> DomainResult<Vec<String>>;

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> DomainResult<Issue>;

    async fn list_issue_comments(&self, repo: &RepoRef, number: u64) -> DomainResult<Vec<IssueComment>>;

    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> DomainResult<CreatedIssue>;

    async fn update_issue_state(&self, repo: &RepoRef, number: u64, state: IssueState) -> DomainResult<()>;

    async fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> DomainResult<()>;

    /// Blob sha of a file on the default branch, `None` if it does not exist.
    async fn get_file_sha(&self, repo: &RepoRef, path: &str) -> DomainResult<Option<String>>;

    /// Create or replace a file on the default branch.
    async fn put_file(&self, repo: &RepoRef, update: &FileUpdate) -> DomainResult<()>;
}
