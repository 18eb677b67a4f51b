//! GitHub REST API v3 request and response payloads.
//!
//! Only the fields the bot reads are modelled. Conversion into the
//! platform value types happens here so the client stays transport-only.

use serde::{Deserialize, Serialize};

use crate::domain::models::platform::{Issue, IssueComment, IssueState, PullRequest};

/// Account reference embedded in most GitHub payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// An issue returned by the GitHub API.
///
/// Issues and pull requests share the issues endpoint; pull requests carry
/// a non-null `pull_request` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    /// "open" or "closed".
    pub state: String,
    pub user: GitHubUser,
    #[serde(default)]
    pub assignees: Vec<GitHubUser>,
    #[serde(default)]
    pub pull_request: Option<GitHubPullRequestRef>,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPullRequestRef {
    pub url: String,
}

impl From<GitHubIssue> for Issue {
    fn from(issue: GitHubIssue) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            body: issue.body,
            state: if issue.state.eq_ignore_ascii_case("closed") {
                IssueState::Closed
            } else {
                IssueState::Open
            },
            author: issue.user.login,
            assignees: issue.assignees.into_iter().map(|a| a.login).collect(),
            is_pull_request: issue.pull_request.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPull {
    pub number: u64,
    pub user: GitHubUser,
}

impl From<GitHubPull> for PullRequest {
    fn from(pull: GitHubPull) -> Self {
        Self {
            number: pull.number,
            author: pull.user.login,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubComment {
    #[serde(default)]
    pub body: Option<String>,
    pub user: GitHubUser,
}

impl From<GitHubComment> for IssueComment {
    fn from(comment: GitHubComment) -> Self {
        Self {
            author: comment.user.login,
            body: comment.body.unwrap_or_default(),
        }
    }
}

/// Request body for posting a comment on an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommentRequest {
    pub body: String,
}

/// Request body for creating a new GitHub issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCreateIssueRequest {
    pub title: String,
    pub body: String,
}

/// Response from the create-issue endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCreateIssueResponse {
    pub number: u64,
    pub html_url: String,
}

/// Request body for patching an issue's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssueUpdateRequest {
    /// "open" or "closed".
    pub state: String,
}

/// Metadata of a file returned by the contents endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubContent {
    pub sha: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommitter {
    pub name: String,
    pub email: String,
}

/// Request body for creating or replacing a file via the contents endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPutContentRequest {
    pub message: String,
    /// Base64-encoded file content.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    pub committer: GitHubCommitter,
    pub author: GitHubCommitter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_with_assignees_converts() {
        let json = r#"{
            "number": 7,
            "title": "Typo in README",
            "body": null,
            "state": "open",
            "user": { "login": "octocat", "type": "User" },
            "assignees": [{ "login": "hubot" }],
            "html_url": "https://github.com/o/r/issues/7"
        }"#;
        let issue: Issue = serde_json::from_str::<GitHubIssue>(json).unwrap().into();
        assert_eq!(issue.number, 7);
        assert_eq!(issue.author, "octocat");
        assert_eq!(issue.assignees, vec!["hubot".to_string()]);
        assert_eq!(issue.state, IssueState::Open);
        assert!(!issue.is_pull_request);
    }

    #[test]
    fn test_pull_request_flag_and_closed_state() {
        let json = r#"{
            "number": 8,
            "title": "Fix typo",
            "state": "closed",
            "user": { "login": "octocat" },
            "pull_request": { "url": "https://api.github.com/repos/o/r/pulls/8" }
        }"#;
        let issue: Issue = serde_json::from_str::<GitHubIssue>(json).unwrap().into();
        assert!(issue.is_pull_request);
        assert_eq!(issue.state, IssueState::Closed);
        assert!(issue.assignees.is_empty());
    }

    #[test]
    fn test_put_content_omits_missing_sha() {
        let committer = GitHubCommitter {
            name: "QuestBuddy".into(),
            email: "bot@example.com".into(),
        };
        let req = GitHubPutContentRequest {
            message: "Update README".into(),
            content: "aGk=".into(),
            sha: None,
            committer: committer.clone(),
            author: committer,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("sha").is_none());
        assert_eq!(value["committer"]["name"], "QuestBuddy");
    }
}
