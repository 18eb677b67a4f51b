//! Implementation of the `questbuddy serve` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::github::GitHubClient;
use crate::adapters::sqlite::{initialize_database, SqliteProgressRepository};
use crate::adapters::webhook::{WebhookServer, WebhookServerConfig};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::infrastructure::templates::CatalogLoader;
use crate::services::{CommandRouter, ProgressionEngine};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Configuration file to use instead of .questbuddy/
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port
    #[arg(long, short)]
    pub port: Option<u16>,
}

pub(crate) fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;

    let catalog = CatalogLoader::resolve(config.catalog_path.as_deref())?;
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    let platform = Arc::new(GitHubClient::from_config(&config.github)?);

    let engine = ProgressionEngine::new(
        Arc::new(SqliteProgressRepository::new(pool)),
        Arc::clone(&platform),
        catalog,
        &config.progression,
        &config.oracle,
    )?;
    let router = Arc::new(CommandRouter::new(Arc::new(engine), platform));

    let server = WebhookServer::new(router, WebhookServerConfig::from(&config.server));
    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Webhook server failed")
}
