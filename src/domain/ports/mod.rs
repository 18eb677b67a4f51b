//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - ProgressRepository: Persistence of per-user progress documents
//! - RepositoryPlatform: Issue, pull request, contributor and file operations on the host
//!
//! These traits keep the progression engine independent of the document store
//! and of the hosting platform's API.

pub mod platform;
pub mod progress_repository;

pub use platform::RepositoryPlatform;
pub use progress_repository::ProgressRepository;
