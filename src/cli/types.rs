//! CLI type definitions

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "questbuddy")]
#[command(about = "QuestBuddy - open-source onboarding quests on GitHub", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server
    Serve(crate::cli::commands::serve::ServeArgs),

    /// Load and validate configuration and the quest catalog
    CheckConfig,

    /// Print a user's stored progress
    ShowUser {
        /// GitHub login
        login: String,
    },
}
