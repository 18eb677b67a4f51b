//! Validation oracle: read-only predicates deciding whether a task's
//! external condition holds.
//!
//! Each [`TaskCheck`] maps to one predicate over live platform state and
//! the user's comment. Predicates never mutate the platform. A predicate
//! that errors or runs past the configured timeout counts as failed; the
//! failure is logged here and never reaches the caller.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::platform::{IssueState, RepoRef};
use crate::domain::models::TaskCheck;
use crate::domain::ports::RepositoryPlatform;

/// Result of evaluating one task check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    /// Passed, and the user picked this issue as their working issue.
    Claimed(u64),
    Failed,
}

impl CheckOutcome {
    pub fn is_passed(self) -> bool {
        !matches!(self, Self::Failed)
    }

    fn from_bool(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// What the user submitted, plus the progress state checks may consult.
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    pub user: &'a str,
    pub comment: &'a str,
    pub selected_issue: Option<u64>,
}

/// The whole comment read as a non-negative integer.
pub fn parse_number(comment: &str) -> Option<u64> {
    comment.trim().parse().ok()
}

pub struct ValidationOracle<P: RepositoryPlatform> {
    platform: Arc<P>,
    repo: RepoRef,
    timeout: Duration,
}

impl<P: RepositoryPlatform> ValidationOracle<P> {
    /// `repo` is the practice repository every check reads from.
    pub fn new(platform: Arc<P>, repo: RepoRef, timeout: Duration) -> Self {
        Self {
            platform,
            repo,
            timeout,
        }
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// Evaluate `check` against `evidence` within the configured timeout.
    #[tracing::instrument(skip(self, check, evidence), fields(check = check.as_str(), user = evidence.user))]
    pub async fn check(&self, check: &TaskCheck, evidence: &Evidence<'_>) -> CheckOutcome {
        match tokio::time::timeout(self.timeout, self.evaluate(check, evidence)).await {
            Ok(Ok(outcome)) => {
                tracing::debug!(?outcome, "task check evaluated");
                outcome
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "task check failed, treating as not satisfied");
                CheckOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "task check timed out");
                CheckOutcome::Failed
            }
        }
    }

    async fn evaluate(&self, check: &TaskCheck, evidence: &Evidence<'_>) -> DomainResult<CheckOutcome> {
        if check.needs_selected_issue() && evidence.selected_issue.is_none() {
            let err = DomainError::DataInconsistency {
                user: evidence.user.to_string(),
                reason: format!("{} check without a selected issue", check.as_str()),
            };
            tracing::warn!(error = %err, "cannot evaluate check");
            return Ok(CheckOutcome::Failed);
        }
        let selected = evidence.selected_issue.unwrap_or_default();

        let outcome = match check {
            TaskCheck::OpenIssueCount => {
                CheckOutcome::from_bool(self.open_issue_count_matches(evidence.comment).await?)
            }
            TaskCheck::PullRequestCount => {
                CheckOutcome::from_bool(self.pull_request_count_matches(evidence.comment).await?)
            }
            TaskCheck::ContainsText { answer } => {
                CheckOutcome::from_bool(contains_answer(evidence.comment, answer))
            }
            TaskCheck::ContributorCount => {
                CheckOutcome::from_bool(self.contributor_count_matches(evidence.comment).await?)
            }
            TaskCheck::ClaimOpenIssue => self.claim_open_issue(evidence.user, evidence.comment).await?,
            TaskCheck::AssignedToSelectedIssue => {
                CheckOutcome::from_bool(self.is_assigned(selected, evidence.user).await?)
            }
            TaskCheck::CommentedOnSelectedIssue => {
                CheckOutcome::from_bool(self.has_commented(selected, evidence.user).await?)
            }
            TaskCheck::ContributorMentioned => {
                CheckOutcome::from_bool(self.contributor_mentioned(selected).await?)
            }
            TaskCheck::PullRequestWithComment => {
                CheckOutcome::from_bool(self.pull_request_with_comment(evidence.user).await?)
            }
            TaskCheck::SelectedIssueClosed => {
                CheckOutcome::from_bool(self.issue_closed(selected).await?)
            }
        };
        Ok(outcome)
    }

    /// The comment equals the number of open issues, pull requests excluded.
    pub async fn open_issue_count_matches(&self, comment: &str) -> DomainResult<bool> {
        let Some(answer) = parse_number(comment) else {
            return Ok(false);
        };
        let issues = self.platform.list_open_issues(&self.repo).await?;
        let count = issues.iter().filter(|i| !i.is_pull_request).count() as u64;
        Ok(answer == count)
    }

    pub async fn pull_request_count_matches(&self, comment: &str) -> DomainResult<bool> {
        let Some(answer) = parse_number(comment) else {
            return Ok(false);
        };
        let pulls = self.platform.list_open_pull_requests(&self.repo).await?;
        Ok(answer == pulls.len() as u64)
    }

    pub async fn contributor_count_matches(&self, comment: &str) -> DomainResult<bool> {
        let Some(answer) = parse_number(comment) else {
            return Ok(false);
        };
        let contributors = self.platform.list_contributors(&self.repo).await?;
        Ok(answer == contributors.len() as u64)
    }

    /// The comment names an open issue that nobody else is assigned to.
    pub async fn claim_open_issue(&self, user: &str, comment: &str) -> DomainResult<CheckOutcome> {
        let Some(number) = parse_number(comment) else {
            return Ok(CheckOutcome::Failed);
        };
        let issues = self.platform.list_open_issues(&self.repo).await?;
        let Some(issue) = issues.iter().find(|i| i.number == number && !i.is_pull_request) else {
            return Ok(CheckOutcome::Failed);
        };

        let free = match issue.assignees.as_slice() {
            [] => true,
            [only] => only == user,
            _ => false,
        };
        Ok(if free {
            CheckOutcome::Claimed(number)
        } else {
            CheckOutcome::Failed
        })
    }

    pub async fn is_assigned(&self, issue: u64, user: &str) -> DomainResult<bool> {
        let issue = self.platform.get_issue(&self.repo, issue).await?;
        Ok(issue.assignees.iter().any(|a| a == user))
    }

    pub async fn has_commented(&self, issue: u64, user: &str) -> DomainResult<bool> {
        let comments = self.platform.list_issue_comments(&self.repo, issue).await?;
        Ok(comments.iter().any(|c| c.author == user))
    }

    /// Some contributor is `@`-mentioned in the issue body or its comments.
    pub async fn contributor_mentioned(&self, issue: u64) -> DomainResult<bool> {
        let (contributors, issue, comments) = futures::try_join!(
            self.platform.list_contributors(&self.repo),
            self.platform.get_issue(&self.repo, issue),
            self.platform.list_issue_comments(&self.repo, issue),
        )?;

        let mut text = issue.body.unwrap_or_default();
        for comment in comments {
            text.push(' ');
            text.push_str(&comment.body);
        }
        Ok(contributors
            .iter()
            .any(|login| text.contains(&format!("@{login}"))))
    }

    /// The user has an open pull request and commented on it.
    pub async fn pull_request_with_comment(&self, user: &str) -> DomainResult<bool> {
        let pulls = self.platform.list_open_pull_requests(&self.repo).await?;
        let Some(pull) = pulls.iter().find(|p| p.author == user) else {
            return Ok(false);
        };
        self.has_commented(pull.number, user).await
    }

    pub async fn issue_closed(&self, issue: u64) -> DomainResult<bool> {
        let issue = self.platform.get_issue(&self.repo, issue).await?;
        Ok(issue.state == IssueState::Closed)
    }
}

/// Case-insensitive substring match.
pub fn contains_answer(comment: &str, answer: &str) -> bool {
    comment.to_lowercase().contains(&answer.to_lowercase())
}
