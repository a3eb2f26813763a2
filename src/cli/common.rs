//! Shared CLI helpers used across multiple command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use sqlmatic::agent::AgentLoop;
use sqlmatic::config::Config;
use sqlmatic::db::Database;
use sqlmatic::dictionary::DataDictionary;
use sqlmatic::providers::{configured_provider_names, create_provider};
use sqlmatic::session::{SessionManager, SessionRouter};
use sqlmatic::tools::{database_registry, ToolRegistry};
use sqlmatic::utils::logging::init_logging;

/// The config file in effect: `--config` if given, else [`Config::path`].
pub(crate) fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::path)
}

/// Load configuration and start logging from its `logging` section.
pub(crate) fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_from_path(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Warning: {}", e);
    }
    Ok(config)
}

/// Open the database and dictionary and register the three tools.
pub(crate) fn build_tools(config: &Config) -> Result<ToolRegistry> {
    let db_path = config.database_path();
    let db = Database::open(&db_path, &config.database)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let dict_path = config.dictionary_path();
    let dictionary = DataDictionary::load(&dict_path)
        .with_context(|| format!("Failed to load data dictionary {}", dict_path.display()))?;
    if dictionary.is_missing() {
        warn!(path = %dict_path.display(), "Data dictionary not found; field lookups will report it");
    } else {
        info!(path = %dict_path.display(), entries = dictionary.len(), "Loaded data dictionary");
    }

    Ok(database_registry(&db, &config.database, Arc::new(dictionary)))
}

/// Build the agent: session store, tools and provider.
pub(crate) async fn create_agent(config: &Config) -> Result<Arc<AgentLoop>> {
    let store = SessionManager::from_storage(config.sessions_path())
        .with_context(|| "Failed to open session storage")?;
    let router = SessionRouter::new(Arc::new(store), config.sessions.busy_policy);

    let agent = AgentLoop::new(config, Arc::new(router)).with_tools(build_tools(config)?);

    match create_provider(config) {
        Ok(provider) => agent.set_provider(provider).await,
        Err(e) => {
            // Requests fail with ModelUnavailable until a provider is configured.
            eprintln!("Warning: {}", e);
            eprintln!("Add an API key to {}", Config::path().display());
            eprintln!();
        }
    }
    info!(
        providers = ?configured_provider_names(config),
        tools = agent.tool_count().await,
        "Agent ready"
    );

    Ok(Arc::new(agent))
}

/// Pretty-print a JSON value to stdout.
pub(crate) fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_prefers_explicit() {
        let explicit = Path::new("/tmp/sqlmatic-test.json");
        assert_eq!(config_path(Some(explicit)), explicit.to_path_buf());
    }
}
