//! Domain errors for the QuestBuddy progression system.

use thiserror::Error;

/// Domain-level errors that can occur while tracking quest progress.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("User not provisioned: {0}")]
    NotProvisioned(String),

    #[error("User already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Quest not found: {0}")]
    QuestNotFound(String),

    #[error("Task {task} not found in quest {quest}")]
    TaskNotFound { quest: String, task: String },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Inconsistent progress for {user}: {reason}")]
    DataInconsistency { user: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Platform request failed: {0}")]
    PlatformError(String),

    #[error("Platform request timed out after {0}s")]
    Timeout(u64),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Errors raised by remote collaborators rather than by the progression rules.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_)
                | Self::PlatformError(_)
                | Self::Timeout(_)
                | Self::ConcurrencyConflict { .. }
        )
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DomainError::PlatformError("502".into()).is_transient());
        assert!(DomainError::Timeout(10).is_transient());
        assert!(!DomainError::NotProvisioned("octocat".into()).is_transient());
        assert!(!DomainError::PreconditionFailed("busy".into()).is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = DomainError::TaskNotFound {
            quest: "Q1".into(),
            task: "T9".into(),
        };
        assert_eq!(err.to_string(), "Task T9 not found in quest Q1");
        assert_eq!(
            DomainError::NotProvisioned("octocat".into()).to_string(),
            "User not provisioned: octocat"
        );
    }
}
