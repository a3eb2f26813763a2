//! OpenAI-compatible Chat Completions provider
//!
//! One implementation serves OpenAI, OpenRouter, vLLM and Ollama; they differ
//! only in base URL, whether an API key is sent, and the reported name.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, Result, SqlMaticError};
use crate::session::{Message, Role};

use super::{
    parse_provider_error, ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition,
    Usage,
};

/// The OpenAI API endpoint URL.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Model used when the caller passes none.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    /// Null for an assistant turn that only carries tool calls
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest {
    id: String,
    r#type: &'static str,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded arguments
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: &'static str,
    function: OpenAIFunctionDef,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallResponse {
    id: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

// ============================================================================
// OpenAI Provider
// ============================================================================

/// Chat Completions provider for any OpenAI-compatible endpoint.
pub struct OpenAIProvider {
    /// Registry name reported by `name()`
    name: String,
    /// Bearer token; omitted from requests when `None`
    api_key: Option<String>,
    /// API base URL without trailing slash
    api_base: String,
    /// Model used when the caller passes none
    default_model: String,
    client: Client,
}

impl OpenAIProvider {
    /// Create a provider for the public OpenAI endpoint.
    ///
    /// # Example
    /// ```
    /// use sqlmatic::providers::{LLMProvider, OpenAIProvider};
    ///
    /// let provider = OpenAIProvider::new("sk-xxx");
    /// assert_eq!(provider.name(), "openai");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, OPENAI_API_URL)
    }

    /// Create a provider for an OpenAI-compatible endpoint.
    pub fn with_base_url(api_key: &str, api_base: &str) -> Self {
        Self::with_client(api_key, api_base, Client::new())
    }

    /// Create a provider with a custom HTTP client.
    pub fn with_client(api_key: &str, api_base: &str, client: Client) -> Self {
        Self {
            name: "openai".to_string(),
            api_key: Some(api_key.to_string()).filter(|k| !k.is_empty()),
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    /// Override the reported provider name (e.g. "openrouter", "ollama").
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Override the model used when the caller passes none.
    pub fn with_default_model(mut self, model: &str) -> Self {
        self.default_model = model.to_string();
        self
    }

    /// API base URL in use.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn convert_messages(messages: Vec<Message>) -> Vec<OpenAIMessage> {
    messages
        .into_iter()
        .map(|msg| {
            let tool_calls = msg.tool_calls.filter(|tcs| !tcs.is_empty()).map(|tcs| {
                tcs.into_iter()
                    .map(|tc| OpenAIToolCallRequest {
                        id: tc.id,
                        r#type: "function",
                        function: OpenAIFunctionCall {
                            name: tc.name,
                            arguments: tc.arguments,
                        },
                    })
                    .collect()
            });

            OpenAIMessage {
                role: role_str(msg.role),
                content: if msg.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(msg.content)
                },
                tool_calls,
                tool_call_id: msg.tool_call_id,
            }
        })
        .collect()
}

fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<OpenAITool> {
    tools
        .into_iter()
        .map(|t| OpenAITool {
            r#type: "function",
            function: OpenAIFunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            },
        })
        .collect()
}

fn convert_response(response: OpenAIResponse) -> LLMResponse {
    let (content, tool_calls) = match response.choices.into_iter().next() {
        Some(c) => {
            let content = c.message.content.unwrap_or_default();
            let tool_calls: Vec<LLMToolCall> = c
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| LLMToolCall::new(&tc.id, &tc.function.name, &tc.function.arguments))
                .collect();
            (content, tool_calls)
        }
        None => (String::new(), Vec::new()),
    };

    let llm_response = LLMResponse::with_tools(&content, tool_calls);
    match response.usage {
        Some(usage) => {
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens))
        }
        None => llm_response,
    }
}

/// Classify a transport failure so the retry decorator can act on it.
fn classify_transport_error(provider: &str, e: reqwest::Error) -> SqlMaticError {
    if e.is_timeout() {
        ProviderError::Timeout(format!("{} request timed out: {}", provider, e)).into()
    } else if e.is_connect() {
        ProviderError::ServerError(format!("{} connection failed: {}", provider, e)).into()
    } else {
        SqlMaticError::Provider(format!("{} request failed: {}", provider, e))
    }
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.default_model);
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: convert_messages(messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
        };

        debug!(provider = %self.name, model = %model, "Sending chat completion request");

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport_error(&self.name, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map(|r| r.error.message)
                .unwrap_or(body);
            return Err(parse_provider_error(status.as_u16(), &detail).into());
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            SqlMaticError::Provider(format!("Failed to parse {} response: {}", self.name, e))
        })?;

        let converted = convert_response(openai_response);
        debug!(
            provider = %self.name,
            tool_calls = converted.tool_calls.len(),
            "Chat completion received"
        );
        Ok(converted)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn name(&self) -> &str {
        &self.name
    }
}
