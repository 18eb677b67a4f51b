//! User progress repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::UserProgress;

/// Repository interface for per-user progress documents, keyed by login.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert a fresh record. Fails with `AlreadyRegistered` if the user exists.
    async fn create(&self, progress: &UserProgress) -> DomainResult<u64>;

    /// Get a user's record.
    async fn get(&self, user: &str) -> DomainResult<Option<UserProgress>>;

    /// Save a record, returning the new version.
    ///
    /// Version 0 inserts a record that was never stored. Any other version
    /// replaces the stored record only if it still carries that version, so a
    /// deleted record is never brought back. Otherwise `ConcurrencyConflict`
    /// is returned.
    async fn upsert(&self, progress: &UserProgress) -> DomainResult<u64>;

    /// Delete a user's record. Returns whether a record existed.
    async fn delete(&self, user: &str) -> DomainResult<bool>;

    /// List all records ordered by login.
    async fn list(&self) -> DomainResult<Vec<UserProgress>>;
}
