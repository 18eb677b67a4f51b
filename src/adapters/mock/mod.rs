//! In-memory adapters for tests and local dry runs.

pub mod platform;

pub use platform::{MockPlatform, RecordedComment};
