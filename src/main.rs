//! QuestBuddy CLI entry point.

use clap::Parser;

use questbuddy::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => questbuddy::cli::commands::serve::execute(args).await,
        Commands::CheckConfig => questbuddy::cli::commands::check_config::execute(cli.json),
        Commands::ShowUser { login } => {
            questbuddy::cli::commands::show_user::execute(login, cli.json).await
        }
    };

    if let Err(err) = result {
        questbuddy::cli::handle_error(err, cli.json);
    }
}
