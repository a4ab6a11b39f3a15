//! Struct definitions and serde defaults for toolstream configuration.

use serde::{Deserialize, Serialize};

/// Root configuration, deserialized from `config.toml`.
///
/// Fields use serde defaults so toolstream can run with sensible defaults
/// when no config file exists.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Default model identifier (e.g. `"claude-sonnet-4-5"`).
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Default provider name ("anthropic" or "gemini").
    #[serde(default)]
    pub default_provider: Option<String>,
    /// System prompt that opens every conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
    /// Dispatch loop settings.
    #[serde(default)]
    pub agent: AgentConfig,
    /// Built-in tool settings.
    #[serde(default)]
    pub tools: ToolsConfig,
}

pub(super) fn default_model() -> String {
    crate::constants::DEFAULT_MODEL.to_string()
}

fn default_system_prompt() -> Option<String> {
    Some(crate::constants::DEFAULT_SYSTEM_PROMPT.to_string())
}

/// Provider-specific configuration map.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    pub anthropic: Option<ProviderEntry>,
    pub gemini: Option<ProviderEntry>,
}

/// Connection details for a single LLM provider.
///
/// Allows overriding the API key, endpoint URL, and model on a
/// per-provider basis.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ProviderEntry {
    /// API key for authentication. Can also be set via environment variables.
    pub api_key: Option<String>,
    /// Custom base URL for the provider's API (useful for proxies).
    pub base_url: Option<String>,
    /// Model identifier to use with this provider, overriding the global default.
    pub model: Option<String>,
}

/// Tool dispatch loop settings.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct AgentConfig {
    /// Whether resolved tool calls trigger a follow-up request.
    pub auto_continue: Option<bool>,
    /// Upper bound on provider requests per run.
    pub max_turns: Option<usize>,
}

/// Built-in tool settings.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolsConfig {
    /// Register the bash tool.
    pub bash: Option<bool>,
    pub bash_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            provider: ProviderConfig::default(),
            system_prompt: default_system_prompt(),
            default_provider: None,
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}
