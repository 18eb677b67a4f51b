//! GitHub HTTP client with rate limiting and retries.
//!
//! Wraps the GitHub REST API v3 and implements the [`RepositoryPlatform`]
//! port. Requests share a `governor` limiter; idempotent reads are retried
//! with exponential backoff on network errors, 5xx and 429 responses.
//! Writes are sent once.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use base64::Engine;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::platform::{
    CreatedIssue, FileUpdate, Issue, IssueComment, IssueState, PullRequest, RepoRef,
};
use crate::domain::models::GitHubConfig;
use crate::domain::ports::RepositoryPlatform;

use super::models::{
    GitHubComment, GitHubCommentRequest, GitHubCommitter, GitHubContent, GitHubCreateIssueRequest,
    GitHubCreateIssueResponse, GitHubIssue, GitHubIssueUpdateRequest, GitHubPull,
    GitHubPutContentRequest, GitHubUser,
};

const USER_AGENT: &str = "questbuddy";

/// HTTP client for the GitHub REST API v3.
///
/// Remote failures map to [`DomainError::PlatformError`], request timeouts
/// to [`DomainError::Timeout`].
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    token: String,
    base_url: String,
    timeout_secs: u64,
    max_retry_elapsed: Duration,
    committer: GitHubCommitter,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Build a client from configuration. The token falls back to the
    /// `GITHUB_TOKEN` environment variable.
    pub fn from_config(config: &GitHubConfig) -> DomainResult<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
            .ok_or_else(|| {
                DomainError::ValidationFailed(
                    "no GitHub token: set github.token or GITHUB_TOKEN".to_string(),
                )
            })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DomainError::PlatformError(format!("failed to build HTTP client: {e}")))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            token,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
            max_retry_elapsed: Duration::from_millis(config.max_retry_elapsed_ms),
            committer: GitHubCommitter {
                name: config.committer_name.clone(),
                email: config.committer_email.clone(),
            },
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    fn repo_url(&self, repo: &RepoRef, rest: &str) -> String {
        format!("{}/repos/{}/{}/{rest}", self.base_url, repo.owner, repo.name)
    }

    /// Wait for a rate-limit slot and build an authorized request.
    async fn rate_limited_request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.limiter.until_ready().await;
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn transport_error(&self, op: &str, err: &reqwest::Error) -> DomainError {
        if err.is_timeout() {
            DomainError::Timeout(self.timeout_secs)
        } else {
            DomainError::PlatformError(format!("GitHub {op} request failed: {err}"))
        }
    }

    async fn status_error(op: &str, resp: Response) -> DomainError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        DomainError::PlatformError(format!("GitHub {op} returned {status}: {body}"))
    }

    /// GET with retries. Any non-transient response is handed back,
    /// including 4xx, so callers can interpret it.
    async fn get_response(&self, op: &str, url: &str) -> DomainResult<Response> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, move || async move {
            let resp = self
                .rate_limited_request(Method::GET, url)
                .await
                .send()
                .await
                .map_err(|e| backoff::Error::transient(self.transport_error(op, &e)))?;

            let status = resp.status();
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                tracing::debug!(op, %status, "transient GitHub response, retrying");
                return Err(backoff::Error::transient(Self::status_error(op, resp).await));
            }
            Ok(resp)
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, op: &str, url: &str) -> DomainResult<T> {
        let resp = self.get_response(op, url).await?;
        if !resp.status().is_success() {
            return Err(Self::status_error(op, resp).await);
        }
        resp.json::<T>()
            .await
            .map_err(|e| DomainError::PlatformError(format!("GitHub {op} parse failed: {e}")))
    }

    async fn send_json<B: Serialize + Sync>(
        &self,
        op: &str,
        method: Method,
        url: &str,
        body: &B,
    ) -> DomainResult<Response> {
        let resp = self
            .rate_limited_request(method, url)
            .await
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(op, &e))?;

        if !resp.status().is_success() {
            return Err(Self::status_error(op, resp).await);
        }
        Ok(resp)
    }
}

#[async_trait]
impl RepositoryPlatform for GitHubClient {
    async fn list_open_issues(&self, repo: &RepoRef) -> DomainResult<Vec<Issue>> {
        let url = self.repo_url(repo, "issues?state=open&per_page=100");
        let issues: Vec<GitHubIssue> = self.get_json("list_issues", &url).await?;
        Ok(issues.into_iter().map(Issue::from).collect())
    }

    async fn list_open_pull_requests(&self, repo: &RepoRef) -> DomainResult<Vec<PullRequest>> {
        let url = self.repo_url(repo, "pulls?state=open&per_page=100");
        let pulls: Vec<GitHubPull> = self.get_json("list_pulls", &url).await?;
        Ok(pulls.into_iter().map(PullRequest::from).collect())
    }

    async fn list_contributors(&self, repo: &RepoRef) -> DomainResult<Vec<String>> {
        let url = self.repo_url(repo, "contributors?per_page=100");
        let resp = self.get_response("list_contributors", &url).await?;
        // Empty repositories answer 204 with no body.
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(Self::status_error("list_contributors", resp).await);
        }
        let users: Vec<GitHubUser> = resp.json().await.map_err(|e| {
            DomainError::PlatformError(format!("GitHub list_contributors parse failed: {e}"))
        })?;
        Ok(users.into_iter().map(|u| u.login).collect())
    }

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> DomainResult<Issue> {
        let url = self.repo_url(repo, &format!("issues/{number}"));
        let issue: GitHubIssue = self.get_json("get_issue", &url).await?;
        Ok(issue.into())
    }

    async fn list_issue_comments(&self, repo: &RepoRef, number: u64) -> DomainResult<Vec<IssueComment>> {
        let url = self.repo_url(repo, &format!("issues/{number}/comments?per_page=100"));
        let comments: Vec<GitHubComment> = self.get_json("list_comments", &url).await?;
        Ok(comments.into_iter().map(IssueComment::from).collect())
    }

    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> DomainResult<CreatedIssue> {
        let url = self.repo_url(repo, "issues");
        let request = GitHubCreateIssueRequest {
            title: title.to_string(),
            body: body.to_string(),
        };
        let resp = self.send_json("create_issue", Method::POST, &url, &request).await?;
        let created: GitHubCreateIssueResponse = resp
            .json()
            .await
            .map_err(|e| DomainError::PlatformError(format!("GitHub create_issue parse failed: {e}")))?;
        Ok(CreatedIssue {
            number: created.number,
            html_url: created.html_url,
        })
    }

    async fn update_issue_state(&self, repo: &RepoRef, number: u64, state: IssueState) -> DomainResult<()> {
        let url = self.repo_url(repo, &format!("issues/{number}"));
        let request = GitHubIssueUpdateRequest {
            state: state.as_str().to_string(),
        };
        self.send_json("update_issue_state", Method::PATCH, &url, &request).await?;
        Ok(())
    }

    async fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> DomainResult<()> {
        let url = self.repo_url(repo, &format!("issues/{number}/comments"));
        let request = GitHubCommentRequest {
            body: body.to_string(),
        };
        self.send_json("post_comment", Method::POST, &url, &request).await?;
        Ok(())
    }

    async fn get_file_sha(&self, repo: &RepoRef, path: &str) -> DomainResult<Option<String>> {
        let url = self.repo_url(repo, &format!("contents/{path}"));
        let resp = self.get_response("get_content", &url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::status_error("get_content", resp).await);
        }
        let content: GitHubContent = resp
            .json()
            .await
            .map_err(|e| DomainError::PlatformError(format!("GitHub get_content parse failed: {e}")))?;
        Ok(Some(content.sha))
    }

    async fn put_file(&self, repo: &RepoRef, update: &FileUpdate) -> DomainResult<()> {
        let url = self.repo_url(repo, &format!("contents/{}", update.path));
        let request = GitHubPutContentRequest {
            message: update.message.clone(),
            content: base64::engine::general_purpose::STANDARD.encode(update.content.as_bytes()),
            sha: update.sha.clone(),
            committer: self.committer.clone(),
            author: self.committer.clone(),
        };
        self.send_json("put_content", Method::PUT, &url, &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> GitHubConfig {
        GitHubConfig {
            token: token.map(str::to_string),
            api_base_url: "https://ghe.example.com/api/v3/".to_string(),
            ..GitHubConfig::default()
        }
    }

    #[test]
    fn test_from_config_uses_configured_token() {
        let client = GitHubClient::from_config(&config(Some("ghp_test_token"))).unwrap();
        assert_eq!(client.token, "ghp_test_token");
        assert_eq!(client.base_url, "https://ghe.example.com/api/v3");
    }

    #[test]
    fn test_from_config_falls_back_to_env() {
        temp_env::with_var("GITHUB_TOKEN", Some("ghp_from_env"), || {
            let client = GitHubClient::from_config(&config(None)).unwrap();
            assert_eq!(client.token, "ghp_from_env");
        });
    }

    #[test]
    fn test_from_config_without_any_token() {
        temp_env::with_var_unset("GITHUB_TOKEN", || {
            let err = GitHubClient::from_config(&config(Some(""))).unwrap_err();
            assert!(matches!(err, DomainError::ValidationFailed(_)));
        });
    }

    #[test]
    fn test_repo_url() {
        let client = GitHubClient::from_config(&config(Some("t"))).unwrap();
        let repo = RepoRef::new("octo", "hello");
        assert_eq!(
            client.repo_url(&repo, "issues/3"),
            "https://ghe.example.com/api/v3/repos/octo/hello/issues/3"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let client = GitHubClient::from_config(&config(Some("ghp_secret"))).unwrap();
        assert!(!format!("{client:?}").contains("ghp_secret"));
    }
}
