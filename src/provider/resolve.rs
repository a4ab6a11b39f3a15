//! Model resolution logic.
//!
//! Resolves which provider and model to use based on CLI flags, config file,
//! and hardcoded defaults. Supports `provider/model` shorthand syntax.

use anyhow::Result;

use super::kind::{default_model_for, ProviderKind};
use crate::config::Config;

use crate::constants::DEFAULT_PROVIDER;

/// Resolved provider + model pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub provider: ProviderKind,
    pub model: String,
}

/// Resolve which provider and model to use.
/// Priority: CLI flags > provider section model > config model > defaults.
///
/// Accepts these formats:
///   --model gemini/gemini-2.5-pro  (provider/model shorthand, only when --provider is omitted)
///   --provider anthropic --model claude-sonnet-4-5
///   --provider gemini  (uses the provider's configured or default model)
///   (nothing)  (uses config.toml, then hardcoded default)
pub fn resolve_model(
    cli_provider: Option<&str>,
    cli_model: Option<&str>,
    config: &Config,
) -> Result<ModelSelection> {
    if cli_provider.is_none() {
        if let Some((prov, model)) = cli_model.and_then(|m| m.split_once('/')) {
            return Ok(ModelSelection {
                provider: ProviderKind::from_str(prov)?,
                model: model.to_string(),
            });
        }
    }

    // A provider prefix on the configured model also selects the provider.
    let config_prefix = config.model.split_once('/').map(|(p, _)| p);
    let provider_str = cli_provider
        .or(config.provider_name())
        .or(config_prefix)
        .unwrap_or(DEFAULT_PROVIDER);
    let provider = ProviderKind::from_str(provider_str)?;

    let section_model = config
        .provider_entry(provider.as_str())
        .and_then(|e| e.model.clone());
    // The global model only applies when it was written for this provider.
    let global_model = config.model_name().filter(|_| {
        config_prefix.map_or(provider == ProviderKind::Anthropic, |p| {
            ProviderKind::from_str(p).ok() == Some(provider)
        })
    });

    let model = cli_model
        .map(String::from)
        .or(section_model)
        .or(global_model)
        .unwrap_or_else(|| default_model_for(&provider).to_string());

    Ok(ModelSelection { provider, model })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_defaults() {
        let sel = resolve_model(None, None, &Config::default()).unwrap();
        assert_eq!(sel.provider, ProviderKind::Anthropic);
        assert_eq!(sel.model, crate::constants::DEFAULT_MODEL);
    }

    #[test]
    fn test_shorthand() {
        let sel = resolve_model(None, Some("gemini/gemini-2.5-pro"), &Config::default()).unwrap();
        assert_eq!(sel.provider, ProviderKind::Gemini);
        assert_eq!(sel.model, "gemini-2.5-pro");
    }

    #[test]
    fn test_provider_flag_uses_provider_default() {
        let sel = resolve_model(Some("gemini"), None, &Config::default()).unwrap();
        assert_eq!(sel.model, crate::constants::DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_section_model_wins_over_global() {
        let cfg = config(
            "model = \"claude-opus-4\"\ndefault_provider = \"gemini\"\n[provider.gemini]\nmodel = \"gemini-exp\"\n",
        );
        let sel = resolve_model(None, None, &cfg).unwrap();
        assert_eq!(sel.provider, ProviderKind::Gemini);
        assert_eq!(sel.model, "gemini-exp");
    }

    #[test]
    fn test_prefixed_config_model_selects_provider() {
        let cfg = config("model = \"gemini/gemini-2.0-flash\"\n");
        let sel = resolve_model(None, None, &cfg).unwrap();
        assert_eq!(sel.provider, ProviderKind::Gemini);
        assert_eq!(sel.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_unknown_provider() {
        let err = resolve_model(Some("openai"), None, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("Unknown provider: openai"));
    }
}
