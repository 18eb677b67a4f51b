pub mod config;
pub mod platform;
pub mod progress;
pub mod quest;

pub use config::{
    Config, DatabaseConfig, GitHubConfig, LoggingConfig, OracleConfig, ProgressionConfig,
    ServerConfig,
};
pub use platform::{
    CreatedIssue, FileUpdate, Issue, IssueComment, IssueState, PullRequest, RepoRef,
};
pub use progress::{
    completion_fraction, AcceptedQuest, CurrentPointer, ProgressState, TaskCompletion, TaskState,
    UserProgress,
};
pub use quest::{
    CatalogMessages, QuestCatalog, QuestDefinition, QuestId, Reward, TaskCheck, TaskDefinition,
    TaskId,
};
