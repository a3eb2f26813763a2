//! SQLMatic - natural-language questions over a SQLite database
//!
//! A tool-calling chat agent: the model inspects the schema, looks up
//! business terms in a data dictionary and runs SQL until it can answer.
//! The same agent backs a websocket chat gateway and an evaluation harness
//! that grades generated SQL against ground truth.

pub mod agent;
pub mod config;
pub mod db;
pub mod dictionary;
pub mod error;
pub mod eval;
pub mod gateway;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{AgentLoop, AgentPurpose};
pub use config::Config;
pub use db::Database;
pub use dictionary::DataDictionary;
pub use error::{ProviderError, Result, SqlMaticError};
pub use eval::{EvaluationHarness, EvaluationReport};
pub use providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};
pub use session::{Message, Role, Session, SessionManager, SessionRouter, ToolCall};
pub use tools::{Tool, ToolContext, ToolRegistry};
