pub mod agent;
pub mod ai;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod recipe;
pub mod selection;
pub mod session;
pub mod state;
pub mod transfer;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agent::rules::ReferenceTables;
use ai::openai::OpenAiProvider;
use catalog::StaticCatalog;
use config::AppConfig;
use engine::{EngineOptions, RecipeEngine};
use error::AppError;
use session::{FileStore, SessionStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();

    // Load persisted config (or use defaults)
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "config unreadable, using defaults");
        AppConfig::default()
    });
    // First run: write the defaults out so there is a file to edit.
    if AppConfig::config_path().is_ok_and(|p| !p.exists()) {
        match config.save() {
            Ok(()) => info!("wrote default config"),
            Err(e) => warn!(error = %e, "could not write default config"),
        }
    }

    let provider = OpenAiProvider::from_config(&config)?;
    let catalog = Arc::new(StaticCatalog::embedded()?);
    let tables =
        ReferenceTables::resolve(config.rules_preset.as_deref(), config.rules_path.as_deref())?;
    let session = SessionStore::new(
        Box::new(FileStore::new(config.storage_path()?)),
        config.state_key.clone(),
    );

    let engine = RecipeEngine::new(
        Box::new(provider),
        session,
        catalog,
        tables,
        EngineOptions::from_config(&config),
    );
    let phase = engine.restore()?;
    info!(?phase, model = %config.model, "ready");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    commands::shell::run_shell(&engine, stdin, tokio::io::stdout()).await
}
