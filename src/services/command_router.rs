//! Command routing for issue and comment events.
//!
//! Slash commands are handled directly; any other comment is treated as an
//! answer to the commenter's current task. Every handled comment gets a
//! reply, including failures.

use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::ports::{ProgressRepository, RepositoryPlatform};
use crate::services::progression_engine::{Origin, ProgressionEngine};

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/new_user [login]`; `None` registers the commenter.
    NewUser(Option<String>),
    Reset,
    Unknown(String),
}

/// Parse a leading-`/` comment. Free text yields `None`.
pub fn parse_command(body: &str) -> Option<Command> {
    let body = body.trim();
    let rest = body.strip_prefix('/')?;
    let (action, argument) = match rest.split_once(char::is_whitespace) {
        Some((action, argument)) => (action, Some(argument.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };

    Some(match action {
        "new_user" => Command::NewUser(argument.map(|a| a.trim_start_matches('@').to_string())),
        "reset" => Command::Reset,
        other => Command::Unknown(other.to_string()),
    })
}

/// Bot accounts are never answered.
pub fn is_bot(login: &str, kind: Option<&str>) -> bool {
    kind == Some("Bot") || login.contains("[bot]")
}

/// Account that triggered an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub login: String,
    pub kind: Option<String>,
}

impl Sender {
    pub fn is_bot(&self) -> bool {
        is_bot(&self.login, self.kind.as_deref())
    }
}

pub struct CommandRouter<R: ProgressRepository, P: RepositoryPlatform> {
    engine: Arc<ProgressionEngine<R, P>>,
    platform: Arc<P>,
}

impl<R: ProgressRepository, P: RepositoryPlatform> CommandRouter<R, P> {
    pub fn new(engine: Arc<ProgressionEngine<R, P>>, platform: Arc<P>) -> Self {
        Self { engine, platform }
    }

    /// Greet the author of a newly opened issue with the command list.
    pub async fn handle_issue_opened(&self, origin: &Origin, sender: &Sender) {
        if sender.is_bot() {
            tracing::debug!(sender = %sender.login, "ignoring issue opened by bot");
            return;
        }
        let welcome = self.engine.catalog().messages.welcome.clone();
        self.reply(origin, &welcome).await;
    }

    /// Handle a new comment and post the reply. Returns the reply, `None`
    /// when the comment was ignored.
    pub async fn handle_comment(&self, origin: &Origin, sender: &Sender, body: &str) -> Option<String> {
        if sender.is_bot() {
            tracing::debug!(sender = %sender.login, "ignoring comment by bot");
            return None;
        }

        let reply = self.route(origin, &sender.login, body).await;
        self.reply(origin, &reply).await;
        Some(reply)
    }

    async fn route(&self, origin: &Origin, user: &str, body: &str) -> String {
        let messages = &self.engine.catalog().messages;

        match parse_command(body) {
            Some(Command::NewUser(login)) => {
                let login = login.unwrap_or_else(|| user.to_string());
                match self.engine.register_user(origin, &login).await {
                    Ok(_) => messages.new_user.clone(),
                    Err(DomainError::AlreadyRegistered(_)) => messages.already_registered.clone(),
                    Err(e) => self.internal_error(&e),
                }
            }
            Some(Command::Reset) => match self.engine.reset_user(origin, user).await {
                Ok(_) => messages.reset.clone(),
                Err(e) => self.internal_error(&e),
            },
            Some(Command::Unknown(action)) => {
                tracing::info!(%action, "unknown command");
                messages.unknown_command.clone()
            }
            None => match self.engine.validate_and_advance(origin, user, body).await {
                Ok(reply) => reply,
                Err(DomainError::NotProvisioned(_)) => {
                    tracing::info!(user, "comment from unregistered user");
                    messages.not_provisioned.clone()
                }
                Err(e) => self.internal_error(&e),
            },
        }
    }

    fn internal_error(&self, err: &DomainError) -> String {
        if err.is_transient() {
            tracing::warn!(error = %err, "request failed");
        } else {
            tracing::error!(error = %err, "request failed");
        }
        self.engine.catalog().messages.internal_error.clone()
    }

    async fn reply(&self, origin: &Origin, body: &str) {
        let Some(issue) = origin.issue else {
            tracing::warn!(repo = %origin.repo, "no issue to reply on");
            return;
        };
        if let Err(e) = self.platform.post_comment(&origin.repo, issue, body).await {
            tracing::error!(repo = %origin.repo, issue, error = %e, "failed to post reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockPlatform;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteProgressRepository};
    use crate::domain::models::platform::RepoRef;
    use crate::domain::models::{OracleConfig, ProgressionConfig};
    use crate::infrastructure::templates::catalog_loader::default_catalog;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("/new_user octocat"),
            Some(Command::NewUser(Some("octocat".to_string())))
        );
        assert_eq!(
            parse_command("  /new_user   @octocat \n"),
            Some(Command::NewUser(Some("octocat".to_string())))
        );
        assert_eq!(parse_command("/new_user"), Some(Command::NewUser(None)));
        assert_eq!(parse_command("/reset"), Some(Command::Reset));
        assert_eq!(parse_command("/dance now"), Some(Command::Unknown("dance".to_string())));
        assert_eq!(parse_command("the fork button is c"), None);
    }

    #[test]
    fn test_bot_detection() {
        assert!(is_bot("questbuddy", Some("Bot")));
        assert!(is_bot("dependabot[bot]", Some("User")));
        assert!(!is_bot("octocat", Some("User")));
        assert!(!is_bot("octocat", None));
    }

    async fn router() -> (CommandRouter<SqliteProgressRepository, MockPlatform>, MockPlatform) {
        let pool = create_migrated_test_pool().await.unwrap();
        let platform = MockPlatform::new();
        let engine = ProgressionEngine::new(
            Arc::new(SqliteProgressRepository::new(pool)),
            Arc::new(platform.clone()),
            default_catalog().unwrap(),
            &ProgressionConfig::default(),
            &OracleConfig::default(),
        )
        .unwrap();
        (
            CommandRouter::new(Arc::new(engine), Arc::new(platform.clone())),
            platform,
        )
    }

    fn user(login: &str) -> Sender {
        Sender {
            login: login.to_string(),
            kind: Some("User".to_string()),
        }
    }

    fn origin() -> Origin {
        Origin::new(RepoRef::new("octocat", "home"), Some(100))
    }

    #[tokio::test]
    async fn test_every_comment_gets_a_reply() {
        let (router, platform) = router().await;
        let catalog = default_catalog().unwrap();
        let sender = user("octocat");

        let reply = router.handle_comment(&origin(), &sender, "42").await.unwrap();
        assert_eq!(reply, catalog.messages.not_provisioned);

        let reply = router.handle_comment(&origin(), &sender, "/new_user").await.unwrap();
        assert_eq!(reply, catalog.messages.new_user);

        let reply = router.handle_comment(&origin(), &sender, "/new_user octocat").await.unwrap();
        assert_eq!(reply, catalog.messages.already_registered);

        let reply = router.handle_comment(&origin(), &sender, "/levelup").await.unwrap();
        assert_eq!(reply, catalog.messages.unknown_command);

        let reply = router.handle_comment(&origin(), &sender, "/reset").await.unwrap();
        assert_eq!(reply, catalog.messages.reset);

        let posted = platform.posted_comments().await;
        assert_eq!(posted.len(), 5);
        assert!(posted.iter().all(|c| c.issue == 100));
    }

    #[tokio::test]
    async fn test_bots_are_ignored() {
        let (router, platform) = router().await;
        let bot = Sender {
            login: "questbuddy[bot]".to_string(),
            kind: Some("Bot".to_string()),
        };

        assert!(router.handle_comment(&origin(), &bot, "/reset").await.is_none());
        router.handle_issue_opened(&origin(), &bot).await;
        assert!(platform.posted_comments().await.is_empty());
    }

    #[tokio::test]
    async fn test_issue_opened_posts_welcome() {
        let (router, platform) = router().await;
        router.handle_issue_opened(&origin(), &user("octocat")).await;

        let posted = platform.posted_comments().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].body, default_catalog().unwrap().messages.welcome);
    }
}
