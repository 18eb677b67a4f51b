//! Quest catalog domain model.
//!
//! The catalog is the static, ordered definition table of quests and their
//! tasks. Order is significant: task position drives the completion fraction
//! and "next task" lookup, so the catalog is immutable once loaded and shared
//! by reference with every service.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Name reserved by the legacy document layout for quest-level metadata.
const RESERVED_ID: &str = "metadata";

fn validate_id(kind: &str, raw: &str) -> DomainResult<()> {
    if raw.is_empty() {
        return Err(DomainError::ValidationFailed(format!("{kind} id cannot be empty")));
    }
    if raw.eq_ignore_ascii_case(RESERVED_ID) {
        return Err(DomainError::ValidationFailed(format!(
            "'{raw}' is reserved and cannot be used as a {kind} id"
        )));
    }
    if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(DomainError::ValidationFailed(format!(
            "{kind} id '{raw}' must be alphanumeric"
        )));
    }
    Ok(())
}

/// Identifier of a quest (e.g. `Q1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestId(String);

impl QuestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for QuestId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        validate_id("quest", trimmed)?;
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for QuestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a task within a quest (e.g. `T3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TaskId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        validate_id("task", trimmed)?;
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Points and XP granted when a task flips to completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub points: u64,
    pub xp: u64,
}

/// The external condition a task is gated on.
///
/// Each variant maps to one predicate of the validation oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskCheck {
    /// Comment equals the number of open issues (pull requests excluded).
    OpenIssueCount,
    /// Comment equals the number of open pull requests.
    PullRequestCount,
    /// Comment contains the answer, case-insensitively.
    ContainsText { answer: String },
    /// Comment equals the number of contributors.
    ContributorCount,
    /// Comment names an open issue that is unassigned or assigned only to the user.
    ClaimOpenIssue,
    /// The user is among the assignees of the selected issue.
    AssignedToSelectedIssue,
    /// The user commented on the selected issue.
    CommentedOnSelectedIssue,
    /// A contributor is `@`-mentioned in the selected issue or its comments.
    ContributorMentioned,
    /// The user opened a pull request and commented on it.
    PullRequestWithComment,
    /// The selected issue has been closed.
    SelectedIssueClosed,
}

impl TaskCheck {
    /// Whether the check reads the issue the user picked earlier in the quest line.
    pub fn needs_selected_issue(&self) -> bool {
        matches!(
            self,
            Self::AssignedToSelectedIssue
                | Self::CommentedOnSelectedIssue
                | Self::ContributorMentioned
                | Self::SelectedIssueClosed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenIssueCount => "open_issue_count",
            Self::PullRequestCount => "pull_request_count",
            Self::ContainsText { .. } => "contains_text",
            Self::ContributorCount => "contributor_count",
            Self::ClaimOpenIssue => "claim_open_issue",
            Self::AssignedToSelectedIssue => "assigned_to_selected_issue",
            Self::CommentedOnSelectedIssue => "commented_on_selected_issue",
            Self::ContributorMentioned => "contributor_mentioned",
            Self::PullRequestWithComment => "pull_request_with_comment",
            Self::SelectedIssueClosed => "selected_issue_closed",
        }
    }
}

/// One task of a quest, with its reward, oracle check and prompt texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub xp: u64,
    pub check: TaskCheck,
    /// Body of the issue opened when the task becomes active.
    pub prompt: String,
    /// Reply posted when the oracle accepts the evidence.
    pub success: String,
    /// Reply posted when the oracle rejects the evidence.
    pub failure: String,
}

impl TaskDefinition {
    pub fn reward(&self) -> Reward {
        Reward {
            points: self.points,
            xp: self.xp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDefinition {
    pub id: QuestId,
    pub title: String,
    pub tasks: Vec<TaskDefinition>,
    /// Quest accepted automatically once this one completes.
    #[serde(default)]
    pub next: Option<QuestId>,
}

impl QuestDefinition {
    pub fn task(&self, task: &TaskId) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| &t.id == task)
    }

    pub fn task_index(&self, task: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == task)
    }

    pub fn first_task(&self) -> Option<&TaskId> {
        self.tasks.first().map(|t| &t.id)
    }
}

/// Canned replies used outside of task validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMessages {
    pub welcome: String,
    pub new_user: String,
    pub already_registered: String,
    pub unknown_command: String,
    pub not_provisioned: String,
    pub reset: String,
    /// README restored on reset.
    pub default_readme: String,
    /// Heading placed above the stats card when progress is published.
    pub readme_intro: String,
    /// Reply to a comment once every quest is finished.
    pub all_complete: String,
    /// Reply when a request could not be processed.
    pub internal_error: String,
}

/// The immutable quest/task definition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestCatalog {
    /// `owner/name` of the practice repository the oracle inspects.
    pub oss_repo: String,
    /// Base URL holding the quest map images.
    pub map_base_url: String,
    pub quests: Vec<QuestDefinition>,
    pub messages: CatalogMessages,
}

impl QuestCatalog {
    pub fn exists(&self, quest: &QuestId) -> bool {
        self.quest(quest).is_some()
    }

    pub fn quest(&self, quest: &QuestId) -> Option<&QuestDefinition> {
        self.quests.iter().find(|q| &q.id == quest)
    }

    pub fn task(&self, quest: &QuestId, task: &TaskId) -> Option<&TaskDefinition> {
        self.quest(quest).and_then(|q| q.task(task))
    }

    /// Ordered task ids of a quest; empty for an unknown quest.
    pub fn tasks_of(&self, quest: &QuestId) -> Vec<TaskId> {
        self.quest(quest)
            .map(|q| q.tasks.iter().map(|t| t.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn reward_of(&self, quest: &QuestId, task: &TaskId) -> Option<Reward> {
        self.task(quest, task).map(TaskDefinition::reward)
    }

    /// The task following `task` in catalog order, `None` if `task` is last.
    pub fn next_task(&self, quest: &QuestId, task: &TaskId) -> Option<&TaskId> {
        let def = self.quest(quest)?;
        let idx = def.task_index(task)?;
        def.tasks.get(idx + 1).map(|t| &t.id)
    }

    pub fn successor(&self, quest: &QuestId) -> Option<&QuestId> {
        self.quest(quest).and_then(|q| q.next.as_ref())
    }

    /// Parse a catalog from YAML and check its structure.
    pub fn from_yaml_str(yaml: &str) -> DomainResult<Self> {
        let catalog: Self = serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quests.is_empty() {
            return Err(DomainError::ValidationFailed(
                "catalog must define at least one quest".to_string(),
            ));
        }
        if !self.oss_repo.contains('/') {
            return Err(DomainError::ValidationFailed(format!(
                "oss_repo must be 'owner/name', got '{}'",
                self.oss_repo
            )));
        }

        let mut quest_ids = HashSet::new();
        for quest in &self.quests {
            validate_id("quest", quest.id.as_str())?;
            if !quest_ids.insert(&quest.id) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate quest id {}",
                    quest.id
                )));
            }
            if quest.tasks.is_empty() {
                return Err(DomainError::ValidationFailed(format!(
                    "quest {} has no tasks",
                    quest.id
                )));
            }
            let mut task_ids = HashSet::new();
            for task in &quest.tasks {
                validate_id("task", task.id.as_str())?;
                if !task_ids.insert(&task.id) {
                    return Err(DomainError::ValidationFailed(format!(
                        "duplicate task id {} in quest {}",
                        task.id, quest.id
                    )));
                }
            }
        }

        for quest in &self.quests {
            if let Some(next) = &quest.next {
                if !quest_ids.contains(next) {
                    return Err(DomainError::ValidationFailed(format!(
                        "quest {} chains to unknown quest {next}",
                        quest.id
                    )));
                }
            }
        }

        // Following `next` from any quest must terminate.
        for quest in &self.quests {
            let mut seen = HashSet::new();
            let mut cursor = Some(&quest.id);
            while let Some(id) = cursor {
                if !seen.insert(id) {
                    return Err(DomainError::ValidationFailed(format!(
                        "quest chain starting at {} loops back to {id}",
                        quest.id
                    )));
                }
                cursor = self.successor(id);
            }
        }

        Ok(())
    }
}
