//! Progression engine: the per-user quest state machine.
//!
//! Every public operation loads the user's document, applies the pure
//! transitions from [`UserProgress`], saves once, and only then performs
//! platform side effects (closing the answered issue, opening the next task
//! issue, republishing the README). Side effects are best effort; a failed
//! side effect never undoes a saved transition.
//!
//! Operations on the same user are serialized through an in-process keyed
//! mutex. The store's version check catches writers outside this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::platform::{IssueState, RepoRef};
use crate::domain::models::{
    CurrentPointer, OracleConfig, ProgressState, ProgressionConfig, QuestCatalog, QuestId,
    TaskCompletion, TaskId, UserProgress,
};
use crate::domain::ports::{ProgressRepository, RepositoryPlatform};
use crate::services::environment_materializer::EnvironmentMaterializer;
use crate::services::progress_renderer::ProgressPublisher;
use crate::services::validation_oracle::{CheckOutcome, Evidence, ValidationOracle};

/// Where a request came from: the home repository the bot is installed in
/// and the issue the triggering comment was posted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub repo: RepoRef,
    pub issue: Option<u64>,
}

impl Origin {
    pub fn new(repo: RepoRef, issue: Option<u64>) -> Self {
        Self { repo, issue }
    }
}

/// Side effects collected while applying transitions, run after the save.
#[derive(Debug, Default)]
struct Effects {
    materialize: Vec<(QuestId, TaskId)>,
    close_origin: bool,
    publish: bool,
}

type UserLocks = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Holds one user's operation lock. On drop the map entry is removed unless
/// another caller is already waiting for it.
struct UserGuard<'a> {
    user: String,
    locks: &'a UserLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        // Waiters hold their own clone of the lock; the map holds the last one.
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&self.user).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.user);
        }
    }
}

pub struct ProgressionEngine<R: ProgressRepository, P: RepositoryPlatform> {
    repository: Arc<R>,
    platform: Arc<P>,
    catalog: Arc<QuestCatalog>,
    oracle: ValidationOracle<P>,
    materializer: EnvironmentMaterializer<P>,
    publisher: ProgressPublisher<P>,
    reaward_completed_tasks: bool,
    locks: UserLocks,
}

impl<R: ProgressRepository, P: RepositoryPlatform> ProgressionEngine<R, P> {
    pub fn new(
        repository: Arc<R>,
        platform: Arc<P>,
        catalog: Arc<QuestCatalog>,
        progression: &ProgressionConfig,
        oracle: &OracleConfig,
    ) -> DomainResult<Self> {
        let oss_repo: RepoRef = catalog.oss_repo.parse()?;
        Ok(Self {
            oracle: ValidationOracle::new(
                Arc::clone(&platform),
                oss_repo,
                Duration::from_secs(oracle.timeout_secs),
            ),
            materializer: EnvironmentMaterializer::new(Arc::clone(&platform), Arc::clone(&catalog)),
            publisher: ProgressPublisher::new(Arc::clone(&platform), Arc::clone(&catalog)),
            repository,
            platform,
            catalog,
            reaward_completed_tasks: progression.reaward_completed_tasks,
            locks: StdMutex::new(HashMap::new()),
        })
    }

    pub fn catalog(&self) -> &QuestCatalog {
        &self.catalog
    }

    /// Read a user's document without modifying it.
    pub async fn get_progress(&self, user: &str) -> DomainResult<Option<UserProgress>> {
        self.repository.get(user).await
    }

    /// Create a zeroed record for `user` and accept the first quest.
    #[tracing::instrument(skip(self, origin), fields(repo = %origin.repo))]
    pub async fn register_user(&self, origin: &Origin, user: &str) -> DomainResult<UserProgress> {
        let _guard = self.lock_user(user).await;

        let mut progress = UserProgress::new(user);
        progress.version = self.repository.create(&progress).await?;
        tracing::info!("registered user");

        let mut effects = Effects::default();
        if let Some(first) = self.catalog.quests.first().map(|q| q.id.clone()) {
            self.apply_accept_quest(&mut progress, &first, &mut effects)?;
            self.save(&mut progress).await?;
        }
        self.run_effects(origin, &progress, effects).await;
        Ok(progress)
    }

    /// Delete the user's record, close the other open issues of the home
    /// repository and restore its README. Returns whether a record existed.
    #[tracing::instrument(skip(self, origin), fields(repo = %origin.repo))]
    pub async fn reset_user(&self, origin: &Origin, user: &str) -> DomainResult<bool> {
        let existed = {
            let _guard = self.lock_user(user).await;
            self.repository.delete(user).await?
        };
        tracing::info!(existed, "reset user");

        match self.platform.list_open_issues(&origin.repo).await {
            Ok(issues) => {
                for issue in issues
                    .iter()
                    .filter(|i| !i.is_pull_request && Some(i.number) != origin.issue)
                {
                    if let Err(e) = self
                        .platform
                        .update_issue_state(&origin.repo, issue.number, IssueState::Closed)
                        .await
                    {
                        tracing::warn!(issue = issue.number, error = %e, "failed to close issue during reset");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to list issues during reset"),
        }
        self.publisher.reset_readme(&origin.repo).await;
        Ok(existed)
    }

    /// Accept `quest` if the user's single quest slot is free.
    ///
    /// Returns `false` without mutating when the quest is unknown, the slot
    /// is taken, or the quest was already completed.
    #[tracing::instrument(skip(self, origin), fields(repo = %origin.repo))]
    pub async fn accept_quest(&self, origin: &Origin, user: &str, quest: &QuestId) -> DomainResult<bool> {
        let _guard = self.lock_user(user).await;
        let mut progress = self.load(user).await?;

        let mut effects = Effects::default();
        if let Err(e) = self.apply_accept_quest(&mut progress, quest, &mut effects) {
            return Self::rejected(e);
        }
        self.save(&mut progress).await?;
        self.run_effects(origin, &progress, effects).await;
        Ok(true)
    }

    /// Mark `task` of `quest` completed and advance, cascading into quest
    /// completion and chaining when it was the last task.
    #[tracing::instrument(skip(self, origin), fields(repo = %origin.repo))]
    pub async fn complete_task(&self, origin: &Origin, user: &str, quest: &QuestId, task: &TaskId) -> DomainResult<bool> {
        let _guard = self.lock_user(user).await;
        let mut progress = self.load(user).await?;

        let mut effects = Effects::default();
        if let Err(e) = self.apply_complete_task(&mut progress, quest, task, &mut effects) {
            return Self::rejected(e);
        }
        self.save(&mut progress).await?;
        self.run_effects(origin, &progress, effects).await;
        Ok(true)
    }

    /// Finalize `quest` when all of its tasks are done. A second call is a
    /// no-op returning `false`.
    #[tracing::instrument(skip(self, origin), fields(repo = %origin.repo))]
    pub async fn complete_quest(&self, origin: &Origin, user: &str, quest: &QuestId) -> DomainResult<bool> {
        let _guard = self.lock_user(user).await;
        let mut progress = self.load(user).await?;

        let mut effects = Effects::default();
        match self.apply_complete_quest(&mut progress, quest, &mut effects) {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) => return Self::rejected(e),
        }
        self.save(&mut progress).await?;
        self.run_effects(origin, &progress, effects).await;
        Ok(true)
    }

    /// Clear the quest slot and current pointer. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn remove_quest(&self, user: &str) -> DomainResult<bool> {
        let _guard = self.lock_user(user).await;
        let mut progress = self.load(user).await?;

        if !progress.remove_quest() {
            return Ok(false);
        }
        self.save(&mut progress).await?;
        Ok(true)
    }

    /// Validate `comment` as the answer to the user's current task and
    /// advance on success. Returns the reply to post.
    ///
    /// Fails with `NotProvisioned` when the user has no record or no active
    /// quest; nothing is written in that case. A quest whose task pointer was
    /// cleared while tasks are still open resumes at the first open task, and
    /// one with every task done is finalized instead of validated.
    #[tracing::instrument(skip(self, origin, comment), fields(repo = %origin.repo))]
    pub async fn validate_and_advance(&self, origin: &Origin, user: &str, comment: &str) -> DomainResult<String> {
        let _guard = self.lock_user(user).await;
        let mut progress = self.load(user).await?;

        let (quest, task) = match progress.state(&self.catalog) {
            ProgressState::QuestActive { quest, task } => (quest, task),
            ProgressState::AllComplete => {
                return Ok(self.with_home_link(&self.catalog.messages.all_complete, origin));
            }
            ProgressState::PendingCompletion { quest } => match self.resume_pending(&mut progress, &quest)? {
                Some(task) => (quest, task),
                None => return self.finish_pending_quest(origin, &mut progress, &quest).await,
            },
            ProgressState::NoQuest => return Err(DomainError::NotProvisioned(user.to_string())),
        };

        let definition = self
            .catalog
            .task(&quest, &task)
            .ok_or_else(|| DomainError::DataInconsistency {
                user: user.to_string(),
                reason: format!("current task {quest}/{task} is not in the catalog"),
            })?;

        let evidence = Evidence {
            user,
            comment,
            selected_issue: progress.selected_issue,
        };
        let outcome = self.oracle.check(&definition.check, &evidence).await;
        if !outcome.is_passed() {
            tracing::info!(%quest, %task, "answer rejected");
            return Ok(self.with_home_link(&definition.failure, origin));
        }

        if let CheckOutcome::Claimed(issue) = outcome {
            progress.selected_issue = Some(issue);
        }
        let mut effects = Effects::default();
        self.apply_complete_task(&mut progress, &quest, &task, &mut effects)?;
        self.save(&mut progress).await?;
        tracing::info!(%quest, %task, points = progress.points, xp = progress.xp, "task completed");

        let created = self.run_effects(origin, &progress, effects).await;

        let mut reply = definition.success.trim_end().to_string();
        if let Some((title, url)) = created.first() {
            reply.push_str(&format!("\n\n➡️ Next up: [{title}]({url})"));
        }
        Ok(self.with_home_link(&reply, origin))
    }

    /// Point a cleared task pointer back at the first open task of the
    /// accepted quest. `None` means every task is done.
    fn resume_pending(&self, progress: &mut UserProgress, quest: &QuestId) -> DomainResult<Option<TaskId>> {
        if progress.accepted.as_ref().map(|a| &a.quest) != Some(quest) {
            return Err(DomainError::DataInconsistency {
                user: progress.id.clone(),
                reason: format!("pending quest {quest} is not the accepted quest"),
            });
        }
        let Some(task) = progress.first_open_task(&self.catalog) else {
            return Ok(None);
        };

        tracing::warn!(%quest, %task, "task pointer cleared while tasks are open, resuming at the first open task");
        progress.current = Some(CurrentPointer {
            quest: quest.clone(),
            task: Some(task.clone()),
        });
        Ok(Some(task))
    }

    async fn finish_pending_quest(&self, origin: &Origin, progress: &mut UserProgress, quest: &QuestId) -> DomainResult<String> {
        let mut effects = Effects::default();
        if !self.apply_complete_quest(progress, quest, &mut effects)? {
            return Err(DomainError::DataInconsistency {
                user: progress.id.clone(),
                reason: format!("quest {quest} has no open task but cannot be completed"),
            });
        }
        self.save(progress).await?;
        tracing::info!(%quest, "finalized pending quest");

        let created = self.run_effects(origin, progress, effects).await;
        let reply = match created.first() {
            Some((title, url)) => format!("✅ Quest {quest} is complete.\n\n➡️ Next up: [{title}]({url})"),
            None if progress.state(&self.catalog) == ProgressState::AllComplete => {
                self.catalog.messages.all_complete.clone()
            }
            None => format!("✅ Quest {quest} is complete."),
        };
        Ok(self.with_home_link(&reply, origin))
    }

    fn with_home_link(&self, message: &str, origin: &Origin) -> String {
        format!("{}\n\nReturn [Home]({})", message.trim_end(), origin.repo.html_url())
    }

    /// Precondition failures become `Ok(false)`; anything else propagates.
    fn rejected(err: DomainError) -> DomainResult<bool> {
        match err {
            DomainError::PreconditionFailed(_)
            | DomainError::QuestNotFound(_)
            | DomainError::TaskNotFound { .. } => {
                tracing::info!(reason = %err, "request rejected");
                Ok(false)
            }
            other => Err(other),
        }
    }

    fn apply_accept_quest(&self, progress: &mut UserProgress, quest: &QuestId, effects: &mut Effects) -> DomainResult<()> {
        let first = progress.accept_quest(&self.catalog, quest)?;
        tracing::info!(user = %progress.id, %quest, "accepted quest");
        effects.materialize.push((quest.clone(), first));
        effects.publish = true;
        Ok(())
    }

    fn apply_complete_task(
        &self,
        progress: &mut UserProgress,
        quest: &QuestId,
        task: &TaskId,
        effects: &mut Effects,
    ) -> DomainResult<TaskCompletion> {
        let completion = progress.complete_task(&self.catalog, quest, task, self.reaward_completed_tasks)?;
        effects.close_origin = true;
        effects.publish = true;

        match &completion.next_task {
            Some(next) => effects.materialize.push((quest.clone(), next.clone())),
            None => {
                self.apply_complete_quest(progress, quest, effects)?;
            }
        }
        Ok(completion)
    }

    fn apply_complete_quest(&self, progress: &mut UserProgress, quest: &QuestId, effects: &mut Effects) -> DomainResult<bool> {
        if !progress.complete_quest(quest) {
            return Ok(false);
        }
        tracing::info!(user = %progress.id, %quest, "completed quest");
        effects.publish = true;

        if let Some(next) = self.catalog.successor(quest).cloned() {
            if progress.has_completed(&next) {
                tracing::debug!(user = %progress.id, %next, "successor already completed, not chaining");
            } else {
                self.apply_accept_quest(progress, &next, effects)?;
            }
        }
        Ok(true)
    }

    async fn lock_user(&self, user: &str) -> UserGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(user.to_string()).or_default())
        };
        UserGuard {
            user: user.to_string(),
            locks: &self.locks,
            guard: Some(lock.lock_owned().await),
        }
    }

    async fn load(&self, user: &str) -> DomainResult<UserProgress> {
        let progress = self
            .repository
            .get(user)
            .await?
            .ok_or_else(|| DomainError::NotProvisioned(user.to_string()))?;

        for problem in progress.inconsistencies() {
            let err = DomainError::DataInconsistency {
                user: user.to_string(),
                reason: problem,
            };
            tracing::warn!(error = %err, "inconsistent progress document");
        }
        Ok(progress)
    }

    async fn save(&self, progress: &mut UserProgress) -> DomainResult<()> {
        progress.version = self.repository.upsert(progress).await?;
        Ok(())
    }

    /// Run collected side effects. Returns `(title, url)` of every issue
    /// opened for a newly active task.
    async fn run_effects(&self, origin: &Origin, progress: &UserProgress, effects: Effects) -> Vec<(String, String)> {
        if effects.close_origin {
            if let Some(issue) = origin.issue {
                if let Err(e) = self
                    .platform
                    .update_issue_state(&origin.repo, issue, IssueState::Closed)
                    .await
                {
                    tracing::warn!(issue, error = %e, "failed to close answered issue");
                }
            }
        }

        let mut created = Vec::new();
        for (quest, task) in &effects.materialize {
            let title = self
                .materializer
                .render(quest, task)
                .map(|i| i.title)
                .unwrap_or_default();
            match self.materializer.materialize(&origin.repo, quest, task).await {
                Ok(Some(issue)) => created.push((title, issue.html_url)),
                Ok(None) => {}
                Err(e) => tracing::warn!(%quest, %task, error = %e, "failed to open task issue"),
            }
        }

        if effects.publish {
            let active_url = created.last().map(|(_, url)| url.as_str());
            self.publisher.publish(&origin.repo, progress, active_url).await;
        }
        created
    }
}
