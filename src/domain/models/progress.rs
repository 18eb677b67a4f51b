//! User progress domain model.
//!
//! One `UserProgress` document exists per registered user. All state machine
//! transitions live here as pure methods so they can be exercised without a
//! store; the progression engine wraps them with persistence and side effects.
//!
//! States per user:
//! - `NoQuest`: nothing accepted
//! - `QuestActive`: a quest is accepted and `current.task` points at a task
//! - `PendingCompletion`: every task is done, `current.task` is null
//! - `AllComplete`: every catalog quest sits in `completed`

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::quest::{QuestCatalog, QuestId, Reward, TaskId};

/// Completion flag of a single accepted task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    pub completed: bool,
}

/// The single quest slot a user may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedQuest {
    pub quest: QuestId,
    pub tasks: BTreeMap<TaskId, TaskState>,
}

impl AcceptedQuest {
    pub fn all_completed(&self) -> bool {
        self.tasks.values().all(|t| t.completed)
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.values().filter(|t| t.completed).count()
    }
}

/// Pointer at the active quest and task. `task == None` means the quest's
/// tasks are exhausted and completion is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPointer {
    pub quest: QuestId,
    pub task: Option<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressState {
    NoQuest,
    QuestActive { quest: QuestId, task: TaskId },
    PendingCompletion { quest: QuestId },
    AllComplete,
}

/// Result of flipping one task to completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion {
    pub quest: QuestId,
    pub task: TaskId,
    /// Reward actually added; zero when a repeat completion was not re-awarded.
    pub awarded: Reward,
    /// The task now active, `None` when the completed task was the last one.
    pub next_task: Option<TaskId>,
}

/// Persisted progress of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    /// User login, primary key of the document.
    pub id: String,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub xp: u64,
    #[serde(
        default,
        with = "accepted_shape",
        skip_serializing_if = "Option::is_none"
    )]
    pub accepted: Option<AcceptedQuest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentPointer>,
    #[serde(default)]
    pub completed: Vec<QuestId>,
    #[serde(default)]
    pub completion: f64,
    #[serde(
        default,
        rename = "selectedIssue",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_issue: Option<u64>,
    /// Optimistic concurrency token, owned by the store.
    #[serde(skip)]
    pub version: u64,
    #[serde(skip, default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// `round((index + 1) / total, 2)`; zero for an empty quest.
pub fn completion_fraction(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let raw = (index + 1) as f64 / total as f64;
    (raw * 100.0).round() / 100.0
}

impl UserProgress {
    /// Zeroed record created on registration.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            points: 0,
            xp: 0,
            accepted: None,
            current: None,
            completed: Vec::new(),
            completion: 0.0,
            selected_issue: None,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn level(&self) -> u64 {
        self.xp / 100 + 1
    }

    pub fn has_completed(&self, quest: &QuestId) -> bool {
        self.completed.contains(quest)
    }

    pub fn state(&self, catalog: &QuestCatalog) -> ProgressState {
        match &self.current {
            Some(CurrentPointer {
                quest,
                task: Some(task),
            }) => ProgressState::QuestActive {
                quest: quest.clone(),
                task: task.clone(),
            },
            Some(CurrentPointer { quest, task: None }) => ProgressState::PendingCompletion {
                quest: quest.clone(),
            },
            None if catalog.quests.iter().all(|q| self.has_completed(&q.id)) => {
                ProgressState::AllComplete
            }
            None => ProgressState::NoQuest,
        }
    }

    /// Accept `quest`, marking every task incomplete and pointing at the first.
    ///
    /// Only one quest slot exists: any accepted quest blocks the request,
    /// whatever its id.
    pub fn accept_quest(&mut self, catalog: &QuestCatalog, quest: &QuestId) -> DomainResult<TaskId> {
        let definition = catalog
            .quest(quest)
            .ok_or_else(|| DomainError::QuestNotFound(quest.to_string()))?;

        if let Some(held) = &self.accepted {
            return Err(DomainError::PreconditionFailed(format!(
                "{} already holds quest {}",
                self.id, held.quest
            )));
        }
        if self.has_completed(quest) {
            return Err(DomainError::PreconditionFailed(format!(
                "{} already completed quest {quest}",
                self.id
            )));
        }

        let first = definition
            .first_task()
            .cloned()
            .ok_or_else(|| DomainError::ValidationFailed(format!("quest {quest} has no tasks")))?;

        let tasks = definition
            .tasks
            .iter()
            .map(|t| (t.id.clone(), TaskState::default()))
            .collect();

        self.accepted = Some(AcceptedQuest {
            quest: quest.clone(),
            tasks,
        });
        self.current = Some(CurrentPointer {
            quest: quest.clone(),
            task: Some(first.clone()),
        });
        self.completion = 0.0;
        Ok(first)
    }

    /// Mark `task` completed, award its reward and advance the pointer.
    ///
    /// With `reaward_repeats` false, a task that was already completed does
    /// not grant its reward a second time.
    pub fn complete_task(
        &mut self,
        catalog: &QuestCatalog,
        quest: &QuestId,
        task: &TaskId,
        reaward_repeats: bool,
    ) -> DomainResult<TaskCompletion> {
        let definition = catalog
            .quest(quest)
            .ok_or_else(|| DomainError::QuestNotFound(quest.to_string()))?;
        let index = definition.task_index(task).ok_or_else(|| DomainError::TaskNotFound {
            quest: quest.to_string(),
            task: task.to_string(),
        })?;
        let reward = definition.tasks[index].reward();

        let state = self
            .accepted
            .as_mut()
            .filter(|a| &a.quest == quest)
            .and_then(|a| a.tasks.get_mut(task))
            .ok_or_else(|| {
                DomainError::PreconditionFailed(format!(
                    "{} has not accepted {quest}/{task}",
                    self.id
                ))
            })?;

        let first_time = !state.completed;
        state.completed = true;

        let awarded = if first_time || reaward_repeats {
            self.points += reward.points;
            self.xp += reward.xp;
            reward
        } else {
            Reward::default()
        };

        self.completion = completion_fraction(index, definition.tasks.len());

        let next_task = definition.tasks.get(index + 1).map(|t| t.id.clone());
        match &mut self.current {
            Some(current) if &current.quest == quest => current.task.clone_from(&next_task),
            _ => {
                tracing::warn!(
                    user = %self.id,
                    quest = %quest,
                    task = %task,
                    "current pointer did not reference the completed quest, resetting it"
                );
                self.current = Some(CurrentPointer {
                    quest: quest.clone(),
                    task: next_task.clone(),
                });
            }
        }

        Ok(TaskCompletion {
            quest: quest.clone(),
            task: task.clone(),
            awarded,
            next_task,
        })
    }

    /// Finalise `quest` when all of its tasks are done.
    ///
    /// Moves the quest to `completed` and clears the quest slot. Returns
    /// `false` without mutating when the quest is not held or unfinished.
    pub fn complete_quest(&mut self, quest: &QuestId) -> bool {
        let finished = self
            .accepted
            .as_ref()
            .is_some_and(|a| &a.quest == quest && a.all_completed());
        if !finished {
            return false;
        }

        self.accepted = None;
        if !self.has_completed(quest) {
            self.completed.push(quest.clone());
        }
        self.remove_quest();
        true
    }

    /// First task of the accepted quest, in catalog order, that is still open.
    pub fn first_open_task(&self, catalog: &QuestCatalog) -> Option<TaskId> {
        let accepted = self.accepted.as_ref()?;
        catalog
            .quest(&accepted.quest)?
            .tasks
            .iter()
            .find(|t| accepted.tasks.get(&t.id).is_some_and(|s| !s.completed))
            .map(|t| t.id.clone())
    }

    /// Drop the quest slot and the current pointer. Idempotent.
    pub fn remove_quest(&mut self) -> bool {
        let removed = self.accepted.is_some() || self.current.is_some();
        self.accepted = None;
        self.current = None;
        removed
    }

    /// Consistency problems a reader should log rather than act on.
    pub fn inconsistencies(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(current) = &self.current {
            match &self.accepted {
                Some(accepted) if accepted.quest == current.quest => {
                    if let Some(task) = &current.task {
                        if !accepted.tasks.contains_key(task) {
                            problems.push(format!(
                                "current task {task} is not part of accepted quest {}",
                                accepted.quest
                            ));
                        }
                    }
                }
                _ if current.task.is_none() => {}
                _ => problems.push(format!(
                    "current quest {} is not the accepted quest",
                    current.quest
                )),
            }
        }
        if let Some(accepted) = &self.accepted {
            if self.has_completed(&accepted.quest) {
                problems.push(format!(
                    "quest {} is both accepted and completed",
                    accepted.quest
                ));
            }
        }
        problems
    }
}

/// Serde bridge keeping the stored `{quest: {task: {completed}}}` shape.
mod accepted_shape {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{AcceptedQuest, TaskState};
    use crate::domain::models::quest::{QuestId, TaskId};

    type Shape = BTreeMap<QuestId, BTreeMap<TaskId, TaskState>>;

    pub fn serialize<S: Serializer>(value: &Option<AcceptedQuest>, s: S) -> Result<S::Ok, S::Error> {
        let mut shape = Shape::new();
        if let Some(accepted) = value {
            shape.insert(accepted.quest.clone(), accepted.tasks.clone());
        }
        shape.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<AcceptedQuest>, D::Error> {
        let shape = Option::<Shape>::deserialize(d)?.unwrap_or_default();
        if shape.len() > 1 {
            return Err(D::Error::custom(format!(
                "expected at most one accepted quest, found {}",
                shape.len()
            )));
        }
        Ok(shape
            .into_iter()
            .next()
            .map(|(quest, tasks)| AcceptedQuest { quest, tasks }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::templates::catalog_loader::default_catalog;

    fn q(id: &str) -> QuestId {
        QuestId::from(id)
    }

    fn t(id: &str) -> TaskId {
        TaskId::from(id)
    }

    #[test]
    fn test_completion_fraction_rounding() {
        assert!((completion_fraction(2, 5) - 0.6).abs() < f64::EPSILON);
        assert!((completion_fraction(0, 3) - 0.33).abs() < f64::EPSILON);
        assert!((completion_fraction(1, 3) - 0.67).abs() < f64::EPSILON);
        assert!((completion_fraction(3, 4) - 1.0).abs() < f64::EPSILON);
        assert!(completion_fraction(0, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_accept_quest_initialises_every_task() {
        let catalog = default_catalog().unwrap();
        let mut progress = UserProgress::new("octocat");

        let first = progress.accept_quest(&catalog, &q("Q1")).unwrap();
        assert_eq!(first, t("T1"));

        let accepted = progress.accepted.as_ref().unwrap();
        assert_eq!(accepted.tasks.len(), catalog.tasks_of(&q("Q1")).len());
        assert!(accepted.tasks.values().all(|s| !s.completed));
        assert_eq!(
            progress.state(&catalog),
            ProgressState::QuestActive {
                quest: q("Q1"),
                task: t("T1")
            }
        );
    }

    #[test]
    fn test_single_slot_blocks_any_second_quest() {
        let catalog = default_catalog().unwrap();
        let mut progress = UserProgress::new("octocat");
        progress.accept_quest(&catalog, &q("Q1")).unwrap();
        let before = progress.clone();

        for quest in ["Q1", "Q2", "Q3"] {
            let err = progress.accept_quest(&catalog, &q(quest)).unwrap_err();
            assert!(matches!(err, DomainError::PreconditionFailed(_)));
        }
        assert_eq!(progress, before);
    }

    #[test]
    fn test_unknown_quest_rejected() {
        let catalog = default_catalog().unwrap();
        let mut progress = UserProgress::new("octocat");
        assert!(matches!(
            progress.accept_quest(&catalog, &q("Q9")),
            Err(DomainError::QuestNotFound(_))
        ));
        assert!(progress.accepted.is_none());
    }

    #[test]
    fn test_repeat_completion_is_not_reawarded_by_default() {
        let catalog = default_catalog().unwrap();
        let mut progress = UserProgress::new("octocat");
        progress.accept_quest(&catalog, &q("Q1")).unwrap();

        let first = progress.complete_task(&catalog, &q("Q1"), &t("T1"), false).unwrap();
        let points = progress.points;
        assert_eq!(first.awarded, catalog.reward_of(&q("Q1"), &t("T1")).unwrap());

        let again = progress.complete_task(&catalog, &q("Q1"), &t("T1"), false).unwrap();
        assert_eq!(again.awarded, Reward::default());
        assert_eq!(progress.points, points);

        progress.complete_task(&catalog, &q("Q1"), &t("T1"), true).unwrap();
        assert!(progress.points > points);
    }

    #[test]
    fn test_last_task_leaves_pending_completion() {
        let catalog = default_catalog().unwrap();
        let mut progress = UserProgress::new("octocat");
        progress.accept_quest(&catalog, &q("Q3")).unwrap();
        for task in catalog.tasks_of(&q("Q3")) {
            progress.complete_task(&catalog, &q("Q3"), &task, false).unwrap();
        }
        assert_eq!(
            progress.state(&catalog),
            ProgressState::PendingCompletion { quest: q("Q3") }
        );
        assert!((progress.completion - 1.0).abs() < f64::EPSILON);

        assert!(progress.complete_quest(&q("Q3")));
        assert_eq!(progress.completed, vec![q("Q3")]);
        assert!(progress.accepted.is_none());
        assert!(progress.current.is_none());
        assert!(!progress.complete_quest(&q("Q3")));
    }

    #[test]
    fn test_complete_quest_requires_all_tasks() {
        let catalog = default_catalog().unwrap();
        let mut progress = UserProgress::new("octocat");
        progress.accept_quest(&catalog, &q("Q2")).unwrap();
        progress.complete_task(&catalog, &q("Q2"), &t("T1"), false).unwrap();
        assert!(!progress.complete_quest(&q("Q2")));
        assert!(progress.accepted.is_some());
    }

    #[test]
    fn test_first_open_task_follows_catalog_order() {
        let catalog = default_catalog().unwrap();
        let mut progress = UserProgress::new("octocat");
        assert_eq!(progress.first_open_task(&catalog), None);

        progress.accept_quest(&catalog, &q("Q1")).unwrap();
        progress.complete_task(&catalog, &q("Q1"), &t("T1"), false).unwrap();
        progress.complete_task(&catalog, &q("Q1"), &t("T5"), false).unwrap();
        assert_eq!(progress.first_open_task(&catalog), Some(t("T2")));

        for task in ["T2", "T3", "T4"] {
            progress.complete_task(&catalog, &q("Q1"), &t(task), false).unwrap();
        }
        assert_eq!(progress.first_open_task(&catalog), None);
    }

    #[test]
    fn test_remove_then_accept_matches_fresh_accept() {
        let catalog = default_catalog().unwrap();
        let mut fresh = UserProgress::new("octocat");
        fresh.accept_quest(&catalog, &q("Q1")).unwrap();

        let mut reused = fresh.clone();
        reused.complete_task(&catalog, &q("Q1"), &t("T1"), false).unwrap();
        assert!(reused.remove_quest());
        assert!(!reused.remove_quest());
        reused.accept_quest(&catalog, &q("Q1")).unwrap();

        assert_eq!(reused.accepted, fresh.accepted);
        assert_eq!(reused.current, fresh.current);
        assert!(reused.completion.abs() < f64::EPSILON);
    }

    #[test]
    fn test_document_shape_round_trips_legacy_layout() {
        let json = r#"{
            "id": "octocat",
            "points": 20,
            "xp": 100,
            "accepted": {"Q2": {"T1": {"completed": true}, "T2": {"completed": false}}},
            "current": {"quest": "Q2", "task": "T2"},
            "completed": ["Q1"],
            "completion": 0.25,
            "selectedIssue": 7
        }"#;
        let progress: UserProgress = serde_json::from_str(json).unwrap();
        let accepted = progress.accepted.as_ref().unwrap();
        assert_eq!(accepted.quest, q("Q2"));
        assert_eq!(accepted.completed_count(), 1);
        assert_eq!(progress.selected_issue, Some(7));
        assert_eq!(progress.level(), 2);

        let value = serde_json::to_value(&progress).unwrap();
        assert_eq!(value["accepted"]["Q2"]["T1"]["completed"], true);
        assert_eq!(value["selectedIssue"], 7);
        assert!(value.get("version").is_none());
    }

    #[test]
    fn test_document_rejects_multiple_accepted_quests() {
        let json = r#"{"id": "x", "accepted": {"Q1": {}, "Q2": {}}}"#;
        assert!(serde_json::from_str::<UserProgress>(json).is_err());
    }

    #[test]
    fn test_inconsistencies_detected() {
        let mut progress = UserProgress::new("octocat");
        progress.current = Some(CurrentPointer {
            quest: q("Q1"),
            task: Some(t("T2")),
        });
        assert_eq!(progress.inconsistencies().len(), 1);

        progress.current = Some(CurrentPointer {
            quest: q("Q1"),
            task: None,
        });
        assert!(progress.inconsistencies().is_empty());
    }
}
