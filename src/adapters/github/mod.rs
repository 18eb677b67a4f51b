//! GitHub adapter.
//!
//! Implements the repository platform port over the GitHub REST API:
//! issue and pull request reads for the validation oracle, issue creation
//! and comments for the bot's replies, and contents writes for the
//! progress README and stats card.

pub mod client;
pub mod models;

pub use client::GitHubClient;
