//! Shared fixtures for integration tests: an engine over in-memory SQLite
//! and the in-memory platform.

use std::sync::Arc;

use questbuddy::adapters::mock::MockPlatform;
use questbuddy::adapters::sqlite::{create_migrated_test_pool, SqliteProgressRepository};
use questbuddy::domain::models::{OracleConfig, ProgressionConfig, QuestId, RepoRef, TaskId};
use questbuddy::infrastructure::templates::default_catalog;
use questbuddy::services::{Origin, ProgressionEngine};

pub type TestEngine = ProgressionEngine<SqliteProgressRepository, MockPlatform>;

pub const USER: &str = "octocat";

/// Engine with the built-in catalog and default progression rules.
pub async fn engine() -> (TestEngine, MockPlatform) {
    engine_with(ProgressionConfig::default()).await
}

pub async fn engine_with(progression: ProgressionConfig) -> (TestEngine, MockPlatform) {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create test database");
    let platform = MockPlatform::new();
    let engine = ProgressionEngine::new(
        Arc::new(SqliteProgressRepository::new(pool)),
        Arc::new(platform.clone()),
        default_catalog().expect("built-in catalog should parse"),
        &progression,
        &OracleConfig::default(),
    )
    .expect("engine should build");
    (engine, platform)
}

pub fn home() -> RepoRef {
    RepoRef::new(USER, "home")
}

/// The practice repository named by the built-in catalog.
pub fn practice() -> RepoRef {
    RepoRef::new("ossdoorway", "practice-project")
}

pub fn origin(issue: u64) -> Origin {
    Origin::new(home(), Some(issue))
}

pub fn q(id: &str) -> QuestId {
    QuestId::from(id)
}

pub fn t(id: &str) -> TaskId {
    TaskId::from(id)
}

/// Seed the practice repository with 2 issues, 1 pull request and
/// 3 contributors.
#[allow(dead_code)]
pub async fn seed_practice(platform: &MockPlatform) {
    let repo = practice();
    platform.add_issue(&repo, "Fix typo in docs", "maintainer", &[]).await;
    platform
        .add_issue(&repo, "Add dark mode", "maintainer", &["someone"])
        .await;
    platform.add_pull_request(&repo, "maintainer").await;
    for login in ["maintainer", "alice", "bob"] {
        platform.add_contributor(&repo, login).await;
    }
}
