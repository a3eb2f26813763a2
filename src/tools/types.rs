//! Tool types for SQLMatic
//!
//! This module defines the `Tool` trait every database tool implements and
//! the `ToolContext` handed to tools at execution time.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SqlMaticError};

/// Trait that all tools must implement.
///
/// A tool is a pure function over structured input producing a JSON
/// payload. Domain failures the model should see (unknown table, bad SQL)
/// are returned as data; `Err` is reserved for argument and infrastructure
/// failures, which the registry turns into an error payload.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use sqlmatic::tools::{Tool, ToolContext};
/// use sqlmatic::error::Result;
///
/// struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Replies with pong" }
///     fn parameters(&self) -> Value {
///         json!({"type": "object", "properties": {}, "required": []})
///     }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
///         Ok(json!({"message": "pong"}))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to request this tool. Unique within a registry.
    fn name(&self) -> &str;

    /// Description sent to the model.
    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Session the calling run belongs to
    pub session_id: Option<String>,
    /// Cancelled when the owning run is abandoned
    pub cancel: CancellationToken,
}

impl ToolContext {
    /// Create a new empty tool context.
    ///
    /// # Example
    /// ```
    /// use sqlmatic::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new();
    /// assert!(ctx.session_id.is_none());
    /// assert!(!ctx.cancel.is_cancelled());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session id.
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Use `cancel` as this context's cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Deserialize a tool's typed argument struct.
///
/// `Value::Null` is treated as an empty object so that tools whose
/// arguments all have defaults can be called without any.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| SqlMaticError::Tool(format!("Invalid arguments for {}: {}", tool, e)))
}
