//! Configuration types for SQLMatic
//!
//! Every struct is `#[serde(default)]` so that partial config files work:
//! unspecified fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::agent::{EVALUATOR_SYSTEM_PROMPT, REGULAR_SYSTEM_PROMPT};

/// Main configuration struct for SQLMatic
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Agent configuration (model parameters, prompts, loop bounds)
    pub agents: AgentConfig,
    /// LLM provider configurations (OpenAI-compatible endpoints)
    pub providers: ProvidersConfig,
    /// SQLite database and schema-tool options
    pub database: DatabaseConfig,
    /// Business glossary (data dictionary) location
    pub dictionary: DictionaryConfig,
    /// Session storage and concurrency policy
    pub sessions: SessionsConfig,
    /// HTTP/websocket gateway configuration
    pub gateway: GatewayConfig,
    /// Evaluation harness configuration
    pub evaluation: EvaluationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Model parameters and loop bounds shared by both agent purposes
    pub defaults: AgentDefaults,
    /// System prompts for the regular and evaluator purposes
    pub prompts: PromptsConfig,
}

/// Default agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Model identifier sent to the provider
    pub model: String,
    /// Maximum tokens for responses
    pub max_tokens: u32,
    /// Temperature for generation
    pub temperature: f32,
    /// Carried for completeness; requests are sent non-streaming.
    pub streaming: bool,
    /// Maximum model -> tools rounds per run
    pub max_tool_rounds: u32,
    /// Timeout (seconds) applied to each model call
    pub round_timeout_secs: u64,
    /// Most recent messages sent to the model. 0 = unbounded.
    pub max_history_messages: usize,
    /// Session the CLI uses when `--session` is not given
    pub default_session_id: String,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            streaming: false,
            max_tool_rounds: 10,
            round_timeout_secs: 120,
            max_history_messages: 0,
            default_session_id: "default".to_string(),
        }
    }
}

/// System prompts keyed by agent purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Prompt for live user chat
    pub regular: String,
    /// Prompt for batch grading runs
    pub evaluator: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            regular: REGULAR_SYSTEM_PROMPT.to_string(),
            evaluator: EVALUATOR_SYSTEM_PROMPT.to_string(),
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// All provider configurations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenAI configuration
    pub openai: Option<ProviderConfig>,
    /// OpenRouter configuration
    pub openrouter: Option<ProviderConfig>,
    /// vLLM (self-hosted OpenAI-compatible server) configuration
    pub vllm: Option<ProviderConfig>,
    /// Ollama configuration (no API key required)
    pub ollama: Option<ProviderConfig>,
    /// Retry policy applied to every model call
    pub retry: RetryConfig,
}

/// Individual provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

/// Retry policy for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retry attempts after the first call
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay_ms: u64,
    /// Delay cap
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// SQLite database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file (`~` is expanded)
    pub path: String,
    /// Open the connection read-only
    pub read_only: bool,
    /// Maximum rows returned by `execute_sql_query`
    pub max_rows: usize,
    /// SQLite busy timeout
    pub busy_timeout_ms: u64,
    /// Options for the `get_schema` tool
    pub schema: SchemaToolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.sqlmatic/data/database.db".to_string(),
            read_only: true,
            max_rows: 500,
            busy_timeout_ms: 5000,
            schema: SchemaToolConfig::default(),
        }
    }
}

/// Options controlling schema introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaToolConfig {
    /// Skip `sqlite_%` internal tables
    pub exclude_system_tables: bool,
    /// Maximum tables reported
    pub max_tables: usize,
    /// Include foreign keys per table
    pub include_relationships: bool,
    /// Include index list
    pub include_indexes: bool,
}

impl Default for SchemaToolConfig {
    fn default() -> Self {
        Self {
            exclude_system_tables: true,
            max_tables: 100,
            include_relationships: true,
            include_indexes: true,
        }
    }
}

/// Data dictionary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// CSV file with `Domain,Table,Column,Key_Type,Description` columns
    pub path: String,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: "~/.sqlmatic/files/simplified_data_dictionary_with_keys.csv".to_string(),
        }
    }
}

// ============================================================================
// Session Configuration
// ============================================================================

/// What happens when a message arrives for a session that is already running.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Wait for the in-flight run to finish, then proceed.
    #[default]
    Queue,
    /// Fail immediately with `SessionBusy`.
    Reject,
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionsConfig {
    /// Persist sessions as JSON files
    pub persist: bool,
    /// Storage directory (defaults to `~/.sqlmatic/sessions`)
    pub path: Option<String>,
    /// Concurrent-message policy per session
    pub busy_policy: BusyPolicy,
}

// ============================================================================
// Gateway Configuration
// ============================================================================

/// Gateway server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Origins allowed by CORS. Empty = any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

// ============================================================================
// Evaluation Configuration
// ============================================================================

/// Evaluation harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// JSON question set: `[{query_id?, query, ground_truth_sql}]`
    pub questions_path: String,
    /// Minimum similarity for a case to count as successful
    pub pass_threshold: f64,
    /// Items evaluated when no limit is given. 0 = all.
    pub default_limit: usize,
    /// Items in flight at once, each on its own task
    pub concurrency: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            questions_path: "~/.sqlmatic/files/evaluation_questions.json".to_string(),
            pass_threshold: 0.8,
            default_limit: 0,
            concurrency: 4,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Compact single-line output with targets
    #[default]
    Component,
    /// JSON lines
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Optional log file (JSON format only)
    pub file: Option<String>,
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            file: None,
            level: "info".to_string(),
        }
    }
}
