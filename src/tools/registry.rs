//! Tool registry for SQLMatic
//!
//! Maps tool names to handlers and turns every failure (unknown tool, bad
//! arguments, tool error) into a structured JSON result for the model.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::providers::ToolDefinition;
use crate::session::ToolCall;

use super::{Tool, ToolContext};

/// A registry that holds and dispatches tools.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use sqlmatic::error::Result;
/// use sqlmatic::tools::{Tool, ToolContext, ToolRegistry};
///
/// struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Replies with pong" }
///     fn parameters(&self) -> Value { json!({"type": "object", "properties": {}}) }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
///         Ok(json!({"message": "pong"}))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(PingTool));
///
/// let result = registry.execute("ping", json!({})).await;
/// assert_eq!(result["message"], "pong");
///
/// let missing = registry.execute("drop_tables", json!({})).await;
/// assert!(missing["error"].as_str().unwrap().contains("Tool not found"));
/// # });
/// ```
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Execute a tool by name with a default context.
    pub async fn execute(&self, name: &str, args: Value) -> Value {
        self.execute_with_context(name, args, &ToolContext::default())
            .await
    }

    /// Execute a tool by name.
    ///
    /// Never fails: an unknown name or a tool error becomes
    /// `{"error": "..."}` so the model can react to it.
    pub async fn execute_with_context(&self, name: &str, args: Value, ctx: &ToolContext) -> Value {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                warn!(tool = name, "Model requested unknown tool");
                return json!({
                    "error": format!("Tool not found: {}", name),
                    "available_tools": self.names(),
                });
            }
        };

        let start = Instant::now();

        match tool.execute(args, ctx).await {
            Ok(output) => {
                info!(
                    tool = name,
                    session_id = ctx.session_id.as_deref().unwrap_or(""),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                output
            }
            Err(e) => {
                error!(
                    tool = name,
                    session_id = ctx.session_id.as_deref().unwrap_or(""),
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                json!({ "error": e.to_string() })
            }
        }
    }

    /// Execute a model-issued tool call.
    ///
    /// The call's arguments are the raw JSON text the model produced; text
    /// that does not parse is reported back as an error result.
    pub async fn execute_call(&self, call: &ToolCall, ctx: &ToolContext) -> Value {
        let args = if call.arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str::<Value>(&call.arguments) {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool arguments are not valid JSON");
                    return json!({
                        "error": format!("Invalid arguments for {}: {}", call.name, e),
                    });
                }
            }
        };
        self.execute_with_context(&call.name, args, ctx).await
    }

    /// Tool definitions for the model, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect()
    }

    /// Names of all registered tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
