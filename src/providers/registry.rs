//! Provider registry and resolution helpers.
//!
//! Centralizes provider metadata and the mapping from configuration to the
//! provider used at runtime. Every entry speaks the OpenAI wire format.

use crate::config::{Config, ProviderConfig};

use super::openai::OPENAI_API_URL;

/// Metadata describing an OpenAI-compatible provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Config key / provider id (e.g. "openai").
    pub name: &'static str,
    /// Base URL used when the config gives none. `None` means one is required.
    pub default_api_base: Option<&'static str>,
    /// Whether an API key must be configured for the provider to count.
    pub requires_api_key: bool,
}

/// Runtime-ready provider selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProviderSelection {
    /// Selected provider id.
    pub name: &'static str,
    /// API key, empty for keyless local servers.
    pub api_key: String,
    /// Resolved base URL.
    pub api_base: String,
}

/// Provider registry in priority order.
pub const PROVIDER_REGISTRY: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openai",
        default_api_base: Some(OPENAI_API_URL),
        requires_api_key: true,
    },
    ProviderSpec {
        name: "openrouter",
        default_api_base: Some("https://openrouter.ai/api/v1"),
        requires_api_key: true,
    },
    ProviderSpec {
        name: "vllm",
        default_api_base: None,
        requires_api_key: false,
    },
    ProviderSpec {
        name: "ollama",
        default_api_base: Some("http://localhost:11434/v1"),
        requires_api_key: false,
    },
];

fn provider_config_by_name<'a>(config: &'a Config, name: &str) -> Option<&'a ProviderConfig> {
    match name {
        "openai" => config.providers.openai.as_ref(),
        "openrouter" => config.providers.openrouter.as_ref(),
        "vllm" => config.providers.vllm.as_ref(),
        "ollama" => config.providers.ollama.as_ref(),
        _ => None,
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

fn select(spec: &ProviderSpec, provider: &ProviderConfig) -> Option<RuntimeProviderSelection> {
    let api_key = non_empty(provider.api_key.as_ref());
    if spec.requires_api_key && api_key.is_none() {
        return None;
    }
    let api_base = non_empty(provider.api_base.as_ref()).or(spec.default_api_base)?;

    Some(RuntimeProviderSelection {
        name: spec.name,
        api_key: api_key.unwrap_or_default().to_string(),
        api_base: api_base.trim_end_matches('/').to_string(),
    })
}

/// Returns all usable provider ids in registry order.
pub fn configured_provider_names(config: &Config) -> Vec<&'static str> {
    PROVIDER_REGISTRY
        .iter()
        .filter(|spec| {
            provider_config_by_name(config, spec.name)
                .and_then(|p| select(spec, p))
                .is_some()
        })
        .map(|spec| spec.name)
        .collect()
}

/// Resolve the provider used at runtime: the first usable registry entry.
pub fn resolve_runtime_provider(config: &Config) -> Option<RuntimeProviderSelection> {
    PROVIDER_REGISTRY.iter().find_map(|spec| {
        provider_config_by_name(config, spec.name).and_then(|p| select(spec, p))
    })
}
