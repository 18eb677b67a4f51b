//! QuestBuddy - open-source onboarding quests on GitHub
//!
//! A GitHub bot that walks newcomers through a chain of quests. Each task is
//! materialized as an issue in the user's home repository, answers arrive as
//! issue comments, and a validation oracle checks them against a shared
//! practice repository before points, XP and the next task are granted.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): quest catalog, progress state machine, ports
//! - **Service Layer** (`services`): progression engine, oracle, materializer,
//!   progress publishing and command routing
//! - **Adapters** (`adapters`): SQLite store, GitHub REST client, webhook server
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, catalog loading
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, DatabaseConfig, GitHubConfig, LoggingConfig, QuestCatalog, QuestId, RepoRef, TaskId,
    UserProgress,
};
pub use domain::ports::{ProgressRepository, RepositoryPlatform};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CommandRouter, Origin, ProgressionEngine, ValidationOracle};
