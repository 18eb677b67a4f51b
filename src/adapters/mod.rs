//! Adapters for external systems: the progress store, the GitHub API,
//! the webhook receiver and an in-memory platform for tests.

pub mod github;
pub mod mock;
pub mod sqlite;
pub mod webhook;
