//! CLI command implementations.

pub mod check_config;
pub mod serve;
pub mod show_user;
