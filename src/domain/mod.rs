//! Domain layer for the QuestBuddy progression system
//!
//! This module contains the quest catalog, the user progress state machine,
//! domain errors and the ports implemented by adapters.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
