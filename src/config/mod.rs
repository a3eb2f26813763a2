//! Configuration management for SQLMatic
//!
//! Configuration is loaded from `~/.sqlmatic/config.json` (or an explicit
//! path) with environment variable overrides applied on top.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::Result;

impl Config {
    /// Returns the SQLMatic configuration directory path (~/.sqlmatic)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sqlmatic")
    }

    /// Returns the config file path.
    ///
    /// `SQLMATIC_CONFIG` takes precedence over `~/.sqlmatic/config.json`.
    pub fn path() -> PathBuf {
        match std::env::var("SQLMATIC_CONFIG") {
            Ok(p) if !p.is_empty() => expand_home(&p),
            _ => Self::dir().join("config.json"),
        }
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables follow the pattern: SQLMATIC_SECTION_KEY
    fn apply_env_overrides(&mut self) {
        // Agent defaults
        if let Ok(val) = std::env::var("SQLMATIC_AGENTS_DEFAULTS_MODEL") {
            self.agents.defaults.model = val;
        }
        if let Ok(val) = std::env::var("SQLMATIC_AGENTS_DEFAULTS_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.agents.defaults.max_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("SQLMATIC_AGENTS_DEFAULTS_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                self.agents.defaults.temperature = v;
            }
        }
        if let Ok(val) = std::env::var("SQLMATIC_AGENTS_DEFAULTS_MAX_TOOL_ROUNDS") {
            if let Ok(v) = val.parse() {
                self.agents.defaults.max_tool_rounds = v;
            }
        }
        if let Ok(val) = std::env::var("SQLMATIC_AGENTS_DEFAULTS_ROUND_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.agents.defaults.round_timeout_secs = v;
            }
        }

        // Database and dictionary
        if let Ok(val) = std::env::var("SQLMATIC_DATABASE_PATH") {
            self.database.path = val;
        }
        if let Ok(val) = std::env::var("SQLMATIC_DATABASE_READ_ONLY") {
            if let Ok(v) = val.parse() {
                self.database.read_only = v;
            }
        }
        if let Ok(val) = std::env::var("SQLMATIC_DICTIONARY_PATH") {
            self.dictionary.path = val;
        }

        // Gateway
        if let Ok(val) = std::env::var("SQLMATIC_GATEWAY_HOST") {
            self.gateway.host = val;
        }
        if let Ok(val) = std::env::var("SQLMATIC_GATEWAY_PORT") {
            if let Ok(v) = val.parse() {
                self.gateway.port = v;
            }
        }

        // Logging
        if let Ok(val) = std::env::var("SQLMATIC_LOGGING_LEVEL") {
            self.logging.level = val;
        }

        self.apply_provider_env_overrides();
    }

    /// Apply provider-specific environment variable overrides
    fn apply_provider_env_overrides(&mut self) {
        let slots: [(&str, &mut Option<ProviderConfig>); 4] = [
            ("OPENAI", &mut self.providers.openai),
            ("OPENROUTER", &mut self.providers.openrouter),
            ("VLLM", &mut self.providers.vllm),
            ("OLLAMA", &mut self.providers.ollama),
        ];

        for (name, slot) in slots {
            if let Ok(val) = std::env::var(format!("SQLMATIC_PROVIDERS_{}_API_KEY", name)) {
                slot.get_or_insert_with(ProviderConfig::default).api_key = Some(val);
            }
            if let Ok(val) = std::env::var(format!("SQLMATIC_PROVIDERS_{}_API_BASE", name)) {
                slot.get_or_insert_with(ProviderConfig::default).api_base = Some(val);
            }
        }

        // The conventional variable used by OpenAI tooling.
        if self
            .providers
            .openai
            .as_ref()
            .and_then(|p| p.api_key.as_ref())
            .is_none()
        {
            if let Ok(val) = std::env::var("OPENAI_API_KEY") {
                if !val.is_empty() {
                    self.providers
                        .openai
                        .get_or_insert_with(ProviderConfig::default)
                        .api_key = Some(val);
                }
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Expanded SQLite database path.
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.database.path)
    }

    /// Expanded data dictionary path.
    pub fn dictionary_path(&self) -> PathBuf {
        expand_home(&self.dictionary.path)
    }

    /// Expanded evaluation question set path.
    pub fn questions_path(&self) -> PathBuf {
        expand_home(&self.evaluation.questions_path)
    }

    /// Session storage directory, or `None` when persistence is off.
    pub fn sessions_path(&self) -> Option<PathBuf> {
        if !self.sessions.persist {
            return None;
        }
        Some(
            self.sessions
                .path
                .as_deref()
                .map(expand_home)
                .unwrap_or_else(|| Self::dir().join("sessions")),
        )
    }
}

/// Expand ~ to home directory in a path string
pub fn expand_home(path: &str) -> PathBuf {
    if path.is_empty() {
        return PathBuf::from(path);
    }

    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            if let Some(stripped) = rest.strip_prefix('/') {
                return home.join(stripped);
            }
            if rest.is_empty() {
                return home;
            }
        }
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.agents.defaults.model, "gpt-4o-mini");
        assert_eq!(config.agents.defaults.max_tool_rounds, 10);
        assert_eq!(config.agents.defaults.round_timeout_secs, 120);
        assert_eq!(config.agents.defaults.max_history_messages, 0);
        assert!(config.database.read_only);
        assert_eq!(config.database.schema.max_tables, 100);
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.sessions.busy_policy, BusyPolicy::Queue);
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{"gateway": {"port": 9090}, "agents": {"defaults": {"model": "llama3"}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.gateway.port, 9090);
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.agents.defaults.model, "llama3");
        assert_eq!(config.agents.defaults.max_tokens, 4096);
    }

    #[test]
    fn test_prompts_default_differ() {
        let config = Config::default();
        assert!(!config.agents.prompts.regular.is_empty());
        assert!(!config.agents.prompts.evaluator.is_empty());
        assert_ne!(config.agents.prompts.regular, config.agents.prompts.evaluator);
    }

    #[test]
    fn test_busy_policy_deserialize() {
        let config: Config =
            serde_json::from_str(r#"{"sessions": {"busy_policy": "reject"}}"#).unwrap();
        assert_eq!(config.sessions.busy_policy, BusyPolicy::Reject);
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~/.sqlmatic"), home.join(".sqlmatic"));
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
        assert_eq!(expand_home(""), PathBuf::from(""));
    }

    #[test]
    fn test_sessions_path_respects_persist_flag() {
        let mut config = Config::default();
        assert!(config.sessions_path().is_none());

        config.sessions.persist = true;
        assert_eq!(config.sessions_path(), Some(Config::dir().join("sessions")));

        config.sessions.path = Some("/tmp/sqlmatic-sessions".to_string());
        assert_eq!(
            config.sessions_path(),
            Some(PathBuf::from("/tmp/sqlmatic-sessions"))
        );
    }

    #[test]
    fn test_env_override() {
        env::set_var("SQLMATIC_AGENTS_DEFAULTS_MAX_TOOL_ROUNDS", "4");
        env::set_var("SQLMATIC_PROVIDERS_OLLAMA_API_BASE", "http://localhost:11434/v1");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.agents.defaults.max_tool_rounds, 4);
        assert_eq!(
            config.providers.ollama.unwrap().api_base.as_deref(),
            Some("http://localhost:11434/v1")
        );

        env::remove_var("SQLMATIC_AGENTS_DEFAULTS_MAX_TOOL_ROUNDS");
        env::remove_var("SQLMATIC_PROVIDERS_OLLAMA_API_BASE");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.agents.defaults.model = "test-model".to_string();
        config.database.max_rows = 42;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.agents.defaults.model, "test-model");
        assert_eq!(loaded.database.max_rows, 42);
    }

    #[test]
    fn test_load_nonexistent() {
        let config = Config::load_from_path(Path::new("/nonexistent/path/config.json")).unwrap();
        assert_eq!(config.database.max_rows, 500);
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }
}
