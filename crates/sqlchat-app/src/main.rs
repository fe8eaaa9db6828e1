//! sqlchat binary - composition root.
//!
//! 1. Resolve configuration (CLI > env > TOML file > defaults)
//! 2. Open the SQLite dataset and run conversation-log migrations
//! 3. Build the completion provider and the query pipeline
//! 4. Serve the axum REST API

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use sqlchat_api::routes;
use sqlchat_api::state::AppState;
use sqlchat_chat::QueryOrchestrator;
use sqlchat_core::config::SqlchatConfig;
use sqlchat_storage::{ConversationStore, Database, QueryExecutor};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = SqlchatConfig::load_or_default(&config_file);
    config.apply_env();
    args.apply_to(&mut config);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting sqlchat v{}", env!("CARGO_PKG_VERSION"));
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No configuration file, using defaults");
    }

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    // Storage.
    let db_path = Path::new(&config.storage.database_path);
    let db = Arc::new(
        Database::new(db_path)?
            .with_busy_timeout(Duration::from_millis(config.storage.busy_timeout_ms)),
    );
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Pipeline.
    let completion = sqlchat_chat::from_config(&config.llm)?;
    tracing::info!(
        provider = completion.name(),
        model = %config.llm.model,
        "Completion provider ready"
    );

    let orchestrator = QueryOrchestrator::new(
        ConversationStore::new(Arc::clone(&db)),
        QueryExecutor::new(db),
        completion,
        &config.query,
    );

    // API.
    let state = AppState::new(orchestrator);
    routes::start_server(&config.server, state).await?;

    Ok(())
}
