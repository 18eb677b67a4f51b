//! End-to-end progression scenarios driven through `validate_and_advance`.

mod common;

use common::{engine, engine_with, home, origin, practice, q, seed_practice, t, USER};
use questbuddy::domain::models::{IssueState, ProgressionConfig};
use questbuddy::domain::DomainError;

#[tokio::test]
async fn test_fork_answer_advances_to_readme_task() {
    let (engine, platform) = engine().await;
    engine.register_user(&origin(1), USER).await.unwrap();
    for task in ["T1", "T2"] {
        assert!(engine.complete_task(&origin(1), USER, &q("Q1"), &t(task)).await.unwrap());
    }

    let reply = engine
        .validate_and_advance(&origin(7), USER, "the fork button is c")
        .await
        .unwrap();

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    let current = progress.current.unwrap();
    assert_eq!(current.quest, q("Q1"));
    assert_eq!(current.task, Some(t("T4")));

    let opened = platform
        .issues(&home())
        .await
        .into_iter()
        .find(|i| i.title.contains("Q1 T4"))
        .expect("the next task issue is opened");
    assert!(reply.contains("Next up:"));
    assert!(reply.contains(&format!("/issues/{}", opened.number)));
    assert!(reply.ends_with("Return [Home](https://github.com/octocat/home)"));
    assert!(platform
        .state_changes()
        .await
        .contains(&(home(), 7, IssueState::Closed)));
}

#[tokio::test]
async fn test_completion_after_three_of_five_tasks() {
    let (engine, _) = engine().await;
    engine.register_user(&origin(1), USER).await.unwrap();
    for task in ["T1", "T2", "T3"] {
        engine.complete_task(&origin(1), USER, &q("Q1"), &t(task)).await.unwrap();
    }

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert!((progress.completion - 0.6).abs() < f64::EPSILON);
    assert_eq!(progress.points, 30);
    assert_eq!(progress.xp, 60);
}

#[tokio::test]
async fn test_first_quest_answered_by_comments_chains_into_second() {
    let (engine, platform) = engine().await;
    seed_practice(&platform).await;
    engine.register_user(&origin(1), USER).await.unwrap();

    // Open issues exclude pull requests.
    for answer in ["2", "1", "c", "The answer is D", "3"] {
        let reply = engine.validate_and_advance(&origin(1), USER, answer).await.unwrap();
        assert!(!reply.is_empty());
    }

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.completed, vec![q("Q1")]);
    let current = progress.current.as_ref().unwrap();
    assert_eq!(current.quest, q("Q2"));
    assert_eq!(current.task, Some(t("T1")));
    assert_eq!(progress.accepted.as_ref().unwrap().quest, q("Q2"));
    assert_eq!(progress.points, 60);
    assert_eq!(progress.xp, 120);
    assert_eq!(progress.level(), 2);
    assert!(progress.completion.abs() < f64::EPSILON);

    assert!(platform
        .issues(&home())
        .await
        .iter()
        .any(|i| i.title.contains("Q2 T1")));
}

#[tokio::test]
async fn test_claiming_an_issue_records_it() {
    let (engine, platform) = engine().await;
    seed_practice(&platform).await;
    engine.register_user(&origin(1), USER).await.unwrap();
    for task in ["T1", "T2", "T3", "T4", "T5"] {
        engine.complete_task(&origin(1), USER, &q("Q1"), &t(task)).await.unwrap();
    }

    // Issue 2 is assigned to someone else.
    let reply = engine.validate_and_advance(&origin(1), USER, "2").await.unwrap();
    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.selected_issue, None);
    assert!(reply.ends_with("Return [Home](https://github.com/octocat/home)"));

    engine.validate_and_advance(&origin(1), USER, "1").await.unwrap();
    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.selected_issue, Some(1));
    assert_eq!(progress.current.unwrap().task, Some(t("T2")));

    // Assignment is checked against the recorded issue.
    engine.validate_and_advance(&origin(1), USER, "done").await.unwrap();
    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.current.unwrap().task, Some(t("T2")));

    platform.assign(&practice(), 1, USER).await;
    engine.validate_and_advance(&origin(1), USER, "done").await.unwrap();
    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.current.unwrap().task, Some(t("T3")));
}

#[tokio::test]
async fn test_answer_after_out_of_order_last_task_resumes_quest() {
    let (engine, platform) = engine().await;
    seed_practice(&platform).await;
    engine.register_user(&origin(1), USER).await.unwrap();
    assert!(engine.complete_task(&origin(1), USER, &q("Q1"), &t("T5")).await.unwrap());

    let reply = engine.validate_and_advance(&origin(1), USER, "2").await.unwrap();

    assert!(!reply.contains(engine.catalog().messages.not_provisioned.trim_end()));
    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.current.unwrap().task, Some(t("T2")));
    assert_eq!(progress.points, 30);
}

#[tokio::test]
async fn test_unregistered_comment_creates_nothing() {
    let (engine, platform) = engine().await;

    let err = engine
        .validate_and_advance(&origin(1), "stranger", "42")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::NotProvisioned(ref u) if u == "stranger"));
    assert!(engine.get_progress("stranger").await.unwrap().is_none());
    assert!(platform.issues(&home()).await.is_empty());
    assert_eq!(platform.file_writes().await, 0);
}

#[tokio::test]
async fn test_remove_then_accept_restores_fresh_quest_state() {
    let (engine, _) = engine().await;
    let registered = engine.register_user(&origin(1), USER).await.unwrap();
    engine.complete_task(&origin(1), USER, &q("Q1"), &t("T1")).await.unwrap();

    assert!(engine.remove_quest(USER).await.unwrap());
    assert!(engine.accept_quest(&origin(1), USER, &q("Q1")).await.unwrap());

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.accepted, registered.accepted);
    assert_eq!(progress.current, registered.current);
    assert!(progress.completion.abs() < f64::EPSILON);
    // Rewards already granted are kept.
    assert_eq!(progress.points, 10);
}

#[tokio::test]
async fn test_single_quest_slot() {
    let (engine, _) = engine().await;
    engine.register_user(&origin(1), USER).await.unwrap();

    assert!(!engine.accept_quest(&origin(1), USER, &q("Q3")).await.unwrap());
    assert!(!engine.accept_quest(&origin(1), USER, &q("Q1")).await.unwrap());

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.accepted.unwrap().quest, q("Q1"));
}

#[tokio::test]
async fn test_complete_quest_is_idempotent() {
    let (engine, _) = engine().await;
    engine.register_user(&origin(1), USER).await.unwrap();
    for task in ["T1", "T2", "T3", "T4", "T5"] {
        engine.complete_task(&origin(1), USER, &q("Q1"), &t(task)).await.unwrap();
    }
    let after_chain = engine.get_progress(USER).await.unwrap().unwrap();

    assert!(!engine.complete_quest(&origin(1), USER, &q("Q1")).await.unwrap());

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.completed, vec![q("Q1")]);
    assert_eq!(progress.points, after_chain.points);
    assert_eq!(progress.version, after_chain.version);
}

#[tokio::test]
async fn test_reaward_switch_reproduces_repeat_rewards() {
    let (engine, _) = engine_with(ProgressionConfig {
        reaward_completed_tasks: true,
    })
    .await;
    engine.register_user(&origin(1), USER).await.unwrap();

    engine.complete_task(&origin(1), USER, &q("Q1"), &t("T1")).await.unwrap();
    engine.complete_task(&origin(1), USER, &q("Q1"), &t("T1")).await.unwrap();

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.points, 20);
}

#[tokio::test]
async fn test_concurrent_answers_are_serialized() {
    let (engine, _) = engine().await;
    engine.register_user(&origin(1), USER).await.unwrap();
    let engine = std::sync::Arc::new(engine);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = std::sync::Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .complete_task(&origin(1), USER, &q("Q1"), &t("T1"))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.points, 10, "a completed task is rewarded once");
    assert_eq!(progress.current.unwrap().task, Some(t("T2")));
}

#[tokio::test]
async fn test_all_quests_complete_reply() {
    let (engine, _) = engine().await;
    engine.register_user(&origin(1), USER).await.unwrap();
    let quests = [("Q1", 5), ("Q2", 4), ("Q3", 3)];
    for (quest, tasks) in quests {
        for n in 1..=tasks {
            let task = format!("T{n}");
            assert!(engine.complete_task(&origin(1), USER, &q(quest), &t(&task)).await.unwrap());
        }
    }

    let progress = engine.get_progress(USER).await.unwrap().unwrap();
    assert_eq!(progress.completed, vec![q("Q1"), q("Q2"), q("Q3")]);
    assert!(progress.accepted.is_none());
    assert!(progress.current.is_none());

    let reply = engine.validate_and_advance(&origin(1), USER, "anything").await.unwrap();
    assert!(reply.starts_with(engine.catalog().messages.all_complete.trim_end()));
}
