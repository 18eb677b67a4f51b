//! Implementation of the `questbuddy check-config` command.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::templates::CatalogLoader;

#[derive(Debug, Serialize)]
pub struct CheckConfigOutput {
    pub listen: String,
    pub database: String,
    pub api_base_url: String,
    pub token_configured: bool,
    pub oss_repo: String,
    pub quests: Vec<String>,
    pub reaward_completed_tasks: bool,
}

impl CommandOutput for CheckConfigOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            "Configuration OK".to_string(),
            format!("  listen:       {}", self.listen),
            format!("  database:     {}", self.database),
            format!("  github api:   {}", self.api_base_url),
            format!(
                "  token:        {}",
                if self.token_configured { "configured" } else { "missing (set GITHUB_TOKEN)" }
            ),
            format!("  practice repo: {}", self.oss_repo),
            format!("  quests:       {}", self.quests.join(" -> ")),
        ];
        if self.reaward_completed_tasks {
            lines.push("  re-awarding completed tasks is enabled".to_string());
        }
        lines.join("\n")
    }
}

pub fn execute(json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let catalog = CatalogLoader::resolve(config.catalog_path.as_deref())?;

    let result = CheckConfigOutput {
        listen: format!("{}:{}", config.server.host, config.server.port),
        database: config.database.path.clone(),
        api_base_url: config.github.api_base_url.clone(),
        token_configured: config.github.token.is_some() || std::env::var("GITHUB_TOKEN").is_ok(),
        oss_repo: catalog.oss_repo.clone(),
        quests: catalog.quests.iter().map(|q| q.id.to_string()).collect(),
        reaward_completed_tasks: config.progression.reaward_completed_tasks,
    };
    output(&result, json_mode);
    Ok(())
}
