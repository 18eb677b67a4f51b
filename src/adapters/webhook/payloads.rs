//! Webhook payloads for the `issues` and `issue_comment` events.

use serde::Deserialize;

use crate::adapters::github::models::GitHubUser;
use crate::domain::models::platform::RepoRef;
use crate::services::command_router::Sender;
use crate::services::progression_engine::Origin;

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub name: String,
    pub owner: GitHubUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuePayload {
    pub number: u64,
    pub user: GitHubUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentPayload {
    #[serde(default)]
    pub body: Option<String>,
    pub user: GitHubUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: IssuePayload,
    pub repository: RepositoryPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: IssuePayload,
    pub comment: CommentPayload,
    pub repository: RepositoryPayload,
}

/// A delivery reduced to what the bot acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    IssueOpened {
        origin: Origin,
        sender: Sender,
    },
    CommentCreated {
        origin: Origin,
        sender: Sender,
        body: String,
    },
    Ignored(String),
}

fn origin(repository: &RepositoryPayload, issue: u64) -> Origin {
    Origin::new(
        RepoRef::new(repository.owner.login.clone(), repository.name.clone()),
        Some(issue),
    )
}

fn sender(user: &GitHubUser) -> Sender {
    Sender {
        login: user.login.clone(),
        kind: user.kind.clone(),
    }
}

/// Decode a delivery given its `X-GitHub-Event` name.
pub fn parse_event(event: &str, body: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    match event {
        "issues" => {
            let payload: IssuesEvent = serde_json::from_slice(body)?;
            if payload.action != "opened" {
                return Ok(WebhookEvent::Ignored(format!("issues.{}", payload.action)));
            }
            Ok(WebhookEvent::IssueOpened {
                origin: origin(&payload.repository, payload.issue.number),
                sender: sender(&payload.issue.user),
            })
        }
        "issue_comment" => {
            let payload: IssueCommentEvent = serde_json::from_slice(body)?;
            if payload.action != "created" {
                return Ok(WebhookEvent::Ignored(format!("issue_comment.{}", payload.action)));
            }
            Ok(WebhookEvent::CommentCreated {
                origin: origin(&payload.repository, payload.issue.number),
                sender: sender(&payload.comment.user),
                body: payload.comment.body.unwrap_or_default(),
            })
        }
        other => Ok(WebhookEvent::Ignored(other.to_string())),
    }
}
