//! Environment variable substitution and effective-setting accessors.

use super::types::{Config, ProviderEntry};

use crate::constants::{
    AUTO_CONTINUE_DEFAULT, BASH_DEFAULT_TIMEOUT_SECS, DEFAULT_MODEL, MAX_AGENT_TURNS,
};

impl Config {
    /// Resolve {env:VAR_NAME} patterns in string fields.
    pub(super) fn resolve_substitutions(&mut self) {
        self.model = Self::resolve_str(&self.model);
        if let Some(ref mut sp) = self.system_prompt {
            *sp = Self::resolve_str(sp);
        }
        if let Some(ref mut dp) = self.default_provider {
            *dp = Self::resolve_str(dp);
        }
        Self::resolve_provider_entry(&mut self.provider.anthropic);
        Self::resolve_provider_entry(&mut self.provider.gemini);
    }

    /// Resolves `{env:VAR}` patterns in a single provider entry.
    fn resolve_provider_entry(entry: &mut Option<ProviderEntry>) {
        if let Some(ref mut e) = entry {
            for field in [&mut e.api_key, &mut e.base_url, &mut e.model] {
                if let Some(value) = field {
                    *value = Self::resolve_str(value);
                }
            }
        }
    }

    /// Replace {env:VAR} with the environment variable value.
    /// Unset variables become the empty string.
    pub(super) fn resolve_str(s: &str) -> String {
        let mut result = s.to_string();
        let mut from = 0;
        while let Some(offset) = result[from..].find("{env:") {
            let start = from + offset;
            let Some(end) = result[start..].find('}') else {
                break;
            };
            let var_name = &result[start + 5..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
            from = start + value.len();
        }
        result
    }

    /// Configured entry for a provider name, if any.
    pub fn provider_entry(&self, provider: &str) -> Option<&ProviderEntry> {
        match provider {
            "anthropic" => self.provider.anthropic.as_ref(),
            "gemini" => self.provider.gemini.as_ref(),
            _ => None,
        }
    }

    /// Resolve API key for a provider: env var first, then config value.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        // ANTHROPIC_API_KEY, GEMINI_API_KEY
        let env_key = format!("{}_API_KEY", provider.to_uppercase());
        if let Ok(val) = std::env::var(&env_key) {
            if !val.is_empty() {
                return Some(val);
            }
        }

        self.provider_entry(provider)
            .and_then(|e| e.api_key.clone())
            .filter(|k| !k.is_empty())
    }

    /// Custom base URL for a provider, if configured and non-empty.
    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.provider_entry(provider)
            .and_then(|e| e.base_url.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// Get the configured default provider name, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Get the model name from config, stripping provider prefix if present.
    /// Returns None if the model is the compile-time default (meaning user hasn't configured it).
    pub fn model_name(&self) -> Option<String> {
        let m = &self.model;
        if m == DEFAULT_MODEL {
            return None;
        }
        if let Some((_prov, model)) = m.split_once('/') {
            Some(model.to_string())
        } else {
            Some(m.to_string())
        }
    }

    pub fn auto_continue(&self) -> bool {
        self.agent.auto_continue.unwrap_or(AUTO_CONTINUE_DEFAULT)
    }

    pub fn max_turns(&self) -> usize {
        self.agent.max_turns.unwrap_or(MAX_AGENT_TURNS).max(1)
    }

    /// Whether the bash tool is registered.
    pub fn bash_enabled(&self) -> bool {
        self.tools.bash.unwrap_or(true)
    }

    pub fn bash_timeout_secs(&self) -> u64 {
        self.tools
            .bash_timeout_secs
            .unwrap_or(BASH_DEFAULT_TIMEOUT_SECS)
    }

    /// The system prompt, falling back to the built-in default when unset or blank.
    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(crate::constants::DEFAULT_SYSTEM_PROMPT)
    }
}
