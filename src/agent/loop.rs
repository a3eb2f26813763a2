//! Agent loop implementation
//!
//! Drives one run: append the user message, then alternate model calls and
//! tool execution until the model answers without tools or the round bound
//! is hit. Each round commits atomically; a cancelled or failed round leaves
//! nothing behind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{AgentDefaults, Config, PromptsConfig};
use crate::error::{Result, SqlMaticError};
use crate::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
use crate::session::{Message, SessionManager, SessionRouter, ToolCall};
use crate::tools::{Tool, ToolContext, ToolRegistry};
use crate::utils::string::preview;

use super::context::{AgentPurpose, ContextBuilder};

/// The tool-calling conversation loop.
///
/// Cheap to share behind an `Arc`; the provider and tool registry sit behind
/// async `RwLock`s so they can be swapped while the loop serves requests.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sqlmatic::agent::AgentLoop;
/// use sqlmatic::config::{BusyPolicy, Config};
/// use sqlmatic::session::{SessionManager, SessionRouter};
///
/// let router = SessionRouter::new(Arc::new(SessionManager::new_memory()), BusyPolicy::Queue);
/// let agent = AgentLoop::new(&Config::default(), Arc::new(router));
/// assert_eq!(agent.defaults().max_tool_rounds, 10);
/// ```
pub struct AgentLoop {
    /// Model parameters and loop bounds
    defaults: AgentDefaults,
    /// System prompts per purpose
    prompts: PromptsConfig,
    /// Session resolution, leases and storage
    router: Arc<SessionRouter>,
    /// The LLM provider (Arc<dyn ..> so calls never hold the lock)
    provider: Arc<RwLock<Option<Arc<dyn LLMProvider>>>>,
    /// Registered tools
    tools: Arc<RwLock<ToolRegistry>>,
}

impl AgentLoop {
    /// Create an agent loop with no provider and no tools.
    pub fn new(config: &Config, router: Arc<SessionRouter>) -> Self {
        Self {
            defaults: config.agents.defaults.clone(),
            prompts: config.agents.prompts.clone(),
            router,
            provider: Arc::new(RwLock::new(None)),
            tools: Arc::new(RwLock::new(ToolRegistry::new())),
        }
    }

    /// Replace the tool registry wholesale.
    pub fn with_tools(self, registry: ToolRegistry) -> Self {
        Self {
            tools: Arc::new(RwLock::new(registry)),
            ..self
        }
    }

    /// Set the LLM provider to use.
    pub async fn set_provider(&self, provider: Box<dyn LLMProvider>) {
        let mut p = self.provider.write().await;
        *p = Some(Arc::from(provider));
    }

    /// Register a tool with the agent.
    pub async fn register_tool(&self, tool: Box<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.register(tool);
    }

    pub async fn tool_count(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn has_tool(&self, name: &str) -> bool {
        self.tools.read().await.has(name)
    }

    /// Definitions of the registered tools as sent to the model.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.read().await.definitions()
    }

    /// Run a tool directly, outside any conversation.
    pub async fn call_tool(&self, name: &str, args: serde_json::Value) -> serde_json::Value {
        self.tools.read().await.execute(name, args).await
    }

    pub fn router(&self) -> &Arc<SessionRouter> {
        &self.router
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        self.router.store()
    }

    pub fn defaults(&self) -> &AgentDefaults {
        &self.defaults
    }

    /// System prompt used for `purpose`.
    pub fn system_prompt(&self, purpose: AgentPurpose) -> &str {
        match purpose {
            AgentPurpose::Regular => &self.prompts.regular,
            AgentPurpose::Evaluator => &self.prompts.evaluator,
        }
    }

    /// Run one user message through the regular assistant.
    pub async fn run(
        &self,
        session_id: &str,
        user_message: &str,
        cancel: CancellationToken,
    ) -> Result<String> {
        self.run_with_purpose(session_id, user_message, AgentPurpose::Regular, cancel)
            .await
    }

    /// Run one user message and return the final answer.
    ///
    /// # Errors
    ///
    /// - `SessionBusy` when the session is held and the policy is `reject`
    /// - `ModelUnavailable` when a model call fails after retries or times out
    /// - `Cancelled` when `cancel` fires; the in-flight round is dropped
    /// - `SessionCorruption` if a round would break tool-call pairing
    pub async fn run_with_purpose(
        &self,
        session_id: &str,
        user_message: &str,
        purpose: AgentPurpose,
        cancel: CancellationToken,
    ) -> Result<String> {
        let span = info_span!(
            "request",
            request_id = %uuid::Uuid::new_v4(),
            session_id = %session_id,
            purpose = %purpose,
        );
        async {
            let start = Instant::now();
            let result = self
                .run_inner(session_id, user_message, purpose, &cancel)
                .await;
            let latency_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(answer) => info!(latency_ms, answer_len = answer.len(), "Request completed"),
                Err(SqlMaticError::Cancelled) => info!(latency_ms, "Request cancelled"),
                Err(e) => warn!(latency_ms, error = %e, "Request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        session_id: &str,
        user_message: &str,
        purpose: AgentPurpose,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let _lease = tokio::select! {
            _ = cancel.cancelled() => return Err(SqlMaticError::Cancelled),
            lease = self.router.acquire(session_id) => lease?,
        };

        // Clone the provider Arc and release the lock before any await on it.
        let provider = {
            let guard = self.provider.read().await;
            guard
                .as_ref()
                .map(Arc::clone)
                .ok_or_else(|| SqlMaticError::ModelUnavailable("No provider configured".into()))?
        };

        let store = self.router.store();
        store.get_or_create(session_id).await?;
        debug!(message = %preview(user_message, 80), "Appending user message");
        store.append(session_id, Message::user(user_message)).await?;

        let context = ContextBuilder::new(self.system_prompt(purpose))
            .with_max_history(self.defaults.max_history_messages);
        let tool_ctx = ToolContext::new()
            .with_session(session_id)
            .with_cancel(cancel.clone());
        let tool_definitions = self.tool_definitions().await;
        let max_rounds = self.defaults.max_tool_rounds;

        let mut round = 0u32;
        loop {
            let history = store.get_or_create(session_id).await?.messages;
            let messages = context.build_messages(&history);

            if round >= max_rounds {
                info!(round, "Tool round limit reached, requesting final answer without tools");
                let response = self
                    .call_model(&provider, messages, Vec::new(), cancel, round)
                    .await?;
                if response.has_tool_calls() {
                    debug!(
                        dropped = response.tool_calls.len(),
                        "Dropping tool calls from final answer"
                    );
                }
                return self.finish(session_id, response.content).await;
            }

            let response = self
                .call_model(&provider, messages, tool_definitions.clone(), cancel, round)
                .await?;

            if !response.has_tool_calls() {
                return self.finish(session_id, response.content).await;
            }

            round += 1;
            debug!(round, calls = response.tool_calls.len(), "Executing tool round");

            let calls: Vec<ToolCall> = response.tool_calls.iter().map(ToolCall::from).collect();
            let results = tokio::select! {
                _ = cancel.cancelled() => return Err(SqlMaticError::Cancelled),
                results = self.execute_tools(&calls, &tool_ctx) => results,
            };

            let mut batch = Vec::with_capacity(calls.len() + 1);
            batch.push(Message::assistant_with_tools(&response.content, calls));
            batch.extend(results);

            // A cancel that raced the last tool still abandons the round.
            if cancel.is_cancelled() {
                return Err(SqlMaticError::Cancelled);
            }
            store.append_all(session_id, batch).await?;
        }
    }

    /// Execute each call in order, wrapping every outcome as a tool message.
    async fn execute_tools(&self, calls: &[ToolCall], ctx: &ToolContext) -> Vec<Message> {
        let tools = self.tools.read().await;
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            info!(tool = %call.name, id = %call.id, "Executing tool");
            let output = tools.execute_call(call, ctx).await;
            results.push(Message::tool_result(&call.id, &output.to_string()));
        }
        results
    }

    /// One model call, bounded by the round timeout and the cancel token.
    async fn call_model(
        &self,
        provider: &Arc<dyn LLMProvider>,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        cancel: &CancellationToken,
        round: u32,
    ) -> Result<LLMResponse> {
        let options = ChatOptions::new()
            .with_max_tokens(self.defaults.max_tokens)
            .with_temperature(self.defaults.temperature);
        let timeout = Duration::from_secs(self.defaults.round_timeout_secs);
        let start = Instant::now();

        let call = provider.chat(messages, tools, Some(self.defaults.model.as_str()), options);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(SqlMaticError::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => outcome,
        };

        match outcome {
            Ok(Ok(response)) => {
                debug!(
                    round,
                    latency_ms = start.elapsed().as_millis() as u64,
                    tool_calls = response.tool_calls.len(),
                    "Model responded"
                );
                Ok(response)
            }
            Ok(Err(SqlMaticError::Cancelled)) => Err(SqlMaticError::Cancelled),
            Ok(Err(e)) => Err(SqlMaticError::ModelUnavailable(e.to_string())),
            Err(_) => Err(SqlMaticError::ModelUnavailable(format!(
                "model call timed out after {}s",
                self.defaults.round_timeout_secs
            ))),
        }
    }

    async fn finish(&self, session_id: &str, answer: String) -> Result<String> {
        self.router
            .store()
            .append(session_id, Message::assistant(&answer))
            .await?;
        Ok(answer)
    }
}
