//! Implementation of the `questbuddy show-user` command.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::adapters::sqlite::{initialize_database, SqliteProgressRepository};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::UserProgress;
use crate::domain::ports::ProgressRepository;
use crate::infrastructure::config::ConfigLoader;

#[derive(Debug, Serialize)]
pub struct ShowUserOutput {
    pub login: String,
    pub progress: Option<UserProgress>,
    pub level: Option<u64>,
}

impl CommandOutput for ShowUserOutput {
    fn to_human(&self) -> String {
        let Some(progress) = &self.progress else {
            return format!("{} is not registered", self.login);
        };

        let mut lines = vec![
            format!("User:       {}", progress.id),
            format!("Points:     {}", progress.points),
            format!("XP:         {} (level {})", progress.xp, progress.level()),
            format!("Completion: {:.0}%", progress.completion * 100.0),
        ];
        if !progress.completed.is_empty() {
            let done: Vec<String> = progress.completed.iter().map(ToString::to_string).collect();
            lines.push(format!("Completed:  {}", done.join(", ")));
        }
        match &progress.current {
            Some(current) => lines.push(format!(
                "Current:    {} {}",
                current.quest,
                current.task.as_ref().map_or("(all tasks done)".to_string(), ToString::to_string)
            )),
            None => lines.push("Current:    none".to_string()),
        }
        if let Some(issue) = progress.selected_issue {
            lines.push(format!("Selected:   #{issue}"));
        }
        lines.join("\n")
    }
}

pub async fn execute(login: String, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to open database")?;
    let repository = SqliteProgressRepository::new(pool);

    let progress = repository
        .get(&login)
        .await
        .context(format!("Failed to load progress for {login}"))?;

    let result = ShowUserOutput {
        level: progress.as_ref().map(UserProgress::level),
        login,
        progress,
    };
    output(&result, json_mode);
    Ok(())
}
