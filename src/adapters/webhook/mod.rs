//! GitHub webhook receiver.
//!
//! Accepts `issues` and `issue_comment` deliveries over HTTP and hands them
//! to the command router.

pub mod payloads;
pub mod server;

pub use payloads::{parse_event, WebhookEvent};
pub use server::{dispatch, WebhookServer, WebhookServerConfig};
