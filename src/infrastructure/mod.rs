//! Infrastructure layer module
//!
//! - Configuration management
//! - Logging infrastructure
//! - Quest catalog loading

pub mod config;
pub mod logging;
pub mod templates;
