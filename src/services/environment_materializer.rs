//! Environment materializer: opens the issue that presents a task.
//!
//! Issues are opened in the user's home repository. The body is the task's
//! prompt followed by a link to the practice repository.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::platform::{CreatedIssue, RepoRef};
use crate::domain::models::{QuestCatalog, QuestId, TaskId};
use crate::domain::ports::RepositoryPlatform;

/// Title and body of a task issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIssue {
    pub title: String,
    pub body: String,
}

pub struct EnvironmentMaterializer<P: RepositoryPlatform> {
    platform: Arc<P>,
    catalog: Arc<QuestCatalog>,
}

impl<P: RepositoryPlatform> EnvironmentMaterializer<P> {
    pub fn new(platform: Arc<P>, catalog: Arc<QuestCatalog>) -> Self {
        Self { platform, catalog }
    }

    /// Render the issue for `(quest, task)`, `None` when the pair is unknown.
    pub fn render(&self, quest: &QuestId, task: &TaskId) -> Option<TaskIssue> {
        let definition = self.catalog.task(quest, task)?;
        Some(TaskIssue {
            title: format!("❗ {quest} {task}: {}", definition.title),
            body: format!(
                "{}\n\n[Click here to start](https://github.com/{})",
                definition.prompt.trim_end(),
                self.catalog.oss_repo
            ),
        })
    }

    /// Open the task issue in `home`.
    ///
    /// Unknown pairs are skipped and yield `Ok(None)`.
    pub async fn materialize(&self, home: &RepoRef, quest: &QuestId, task: &TaskId) -> DomainResult<Option<CreatedIssue>> {
        let Some(issue) = self.render(quest, task) else {
            tracing::debug!(%quest, %task, "no environment for task, skipping");
            return Ok(None);
        };

        let created = self.platform.create_issue(home, &issue.title, &issue.body).await?;
        tracing::info!(
            repo = %home,
            %quest,
            %task,
            issue = created.number,
            "opened task issue"
        );
        Ok(Some(created))
    }
}
