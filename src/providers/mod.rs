//! Providers module - OpenAI-compatible chat completion backends
//!
//! Defines the `LLMProvider` trait, the OpenAI-compatible implementation, the
//! retry decorator and the registry that picks a backend from configuration.

pub mod openai;
mod registry;
pub mod retry;
mod types;

use crate::config::Config;
use crate::error::{ProviderError, Result, SqlMaticError};

pub use openai::OpenAIProvider;
pub use registry::{
    configured_provider_names, resolve_runtime_provider, ProviderSpec, RuntimeProviderSelection,
    PROVIDER_REGISTRY,
};
pub use retry::RetryProvider;
pub use types::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        408 => ProviderError::Timeout(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 | 422 => ProviderError::InvalidRequest(body.to_string()),
        529 => ProviderError::Overloaded(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

/// Build the runtime provider from configuration, wrapped in the retry decorator.
///
/// # Errors
///
/// Returns `Config` when no provider in the registry is usable.
pub fn create_provider(config: &Config) -> Result<Box<dyn LLMProvider>> {
    let selection = resolve_runtime_provider(config).ok_or_else(|| {
        SqlMaticError::Config(
            "No LLM provider configured. Set providers.openai.api_key (or OPENAI_API_KEY), \
             or configure openrouter, vllm or ollama."
                .to_string(),
        )
    })?;

    tracing::info!(
        provider = selection.name,
        api_base = %selection.api_base,
        model = %config.agents.defaults.model,
        "Using LLM provider"
    );

    let inner = OpenAIProvider::with_base_url(&selection.api_key, &selection.api_base)
        .with_name(selection.name)
        .with_default_model(&config.agents.defaults.model);

    Ok(Box::new(RetryProvider::from_config(
        Box::new(inner),
        &config.providers.retry,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn test_parse_provider_error_status_mapping() {
        assert!(matches!(parse_provider_error(401, ""), ProviderError::Auth(_)));
        assert!(matches!(parse_provider_error(402, ""), ProviderError::Billing(_)));
        assert!(matches!(
            parse_provider_error(404, "model not found"),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(parse_provider_error(400, ""), ProviderError::InvalidRequest(_)));
        assert!(matches!(parse_provider_error(503, ""), ProviderError::ServerError(_)));
        assert!(matches!(parse_provider_error(529, ""), ProviderError::Overloaded(_)));
    }

    #[test]
    fn test_parse_provider_error_retryability() {
        assert!(parse_provider_error(429, "rate limited").is_retryable());
        assert!(parse_provider_error(502, "bad gateway").is_retryable());
        assert!(!parse_provider_error(401, "invalid api key").is_retryable());
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "i'm a teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }

    #[test]
    fn test_create_provider_without_config_fails() {
        let mut config = Config::default();
        config.providers = Default::default();
        match create_provider(&config) {
            Err(SqlMaticError::Config(msg)) => assert!(msg.contains("No LLM provider")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_create_provider_uses_configured_model() {
        let mut config = Config::default();
        config.agents.defaults.model = "qwen2.5-coder".to_string();
        config.providers.ollama = Some(ProviderConfig::default());

        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.default_model(), "qwen2.5-coder");
    }
}
