//! File loading and merging for toolstream configuration.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::types::{default_model, AgentConfig, Config, ProviderEntry, ToolsConfig};

impl Config {
    /// Loads the global config from `~/.config/toolstream/config.toml`.
    ///
    /// If no config file exists, creates one with sensible defaults
    /// (including `{env:VAR}` placeholders for API keys) and returns it.
    pub(super) fn load_global() -> Result<Self> {
        Self::load_or_create(&Self::config_path()?)
    }

    pub(super) fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_toml = format!(
                r#"model = "{}"

[provider.anthropic]
api_key = "{{env:ANTHROPIC_API_KEY}}"

[provider.gemini]
api_key = "{{env:GEMINI_API_KEY}}"

[agent]
auto_continue = true

[tools]
bash = true
"#,
                default_model()
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            let config: Config = toml::from_str(&default_toml)
                .with_context(|| "Failed to parse default config".to_string())?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        Ok(config)
    }

    /// Look for toolstream.toml in the current dir, then walk up to the git root.
    pub(super) fn load_project() -> Result<Option<Config>> {
        Self::find_project(&std::env::current_dir()?)
    }

    pub(super) fn find_project(start: &Path) -> Result<Option<Config>> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(crate::constants::PROJECT_CONFIG_FILENAME);
            if candidate.exists() {
                let contents = fs::read_to_string(&candidate)
                    .with_context(|| format!("Failed to read {:?}", candidate))?;
                let config: Config = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse {:?}", candidate))?;
                return Ok(Some(config));
            }
            // Stop at git root or filesystem root
            if dir.join(".git").exists() || !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Merge project config over global config.
    /// Project values win when present.
    pub(super) fn merge(global: Config, project: Config) -> Config {
        Config {
            model: if project.model != default_model() {
                project.model
            } else {
                global.model
            },
            provider: super::types::ProviderConfig {
                anthropic: merge_entry(global.provider.anthropic, project.provider.anthropic),
                gemini: merge_entry(global.provider.gemini, project.provider.gemini),
            },
            system_prompt: project.system_prompt.or(global.system_prompt),
            default_provider: project.default_provider.or(global.default_provider),
            agent: AgentConfig {
                auto_continue: project.agent.auto_continue.or(global.agent.auto_continue),
                max_turns: project.agent.max_turns.or(global.agent.max_turns),
            },
            tools: ToolsConfig {
                bash: project.tools.bash.or(global.tools.bash),
                bash_timeout_secs: project
                    .tools
                    .bash_timeout_secs
                    .or(global.tools.bash_timeout_secs),
            },
        }
    }
}

fn merge_entry(
    global: Option<ProviderEntry>,
    project: Option<ProviderEntry>,
) -> Option<ProviderEntry> {
    match (global, project) {
        (Some(g), Some(p)) => Some(ProviderEntry {
            api_key: p.api_key.or(g.api_key),
            base_url: p.base_url.or(g.base_url),
            model: p.model.or(g.model),
        }),
        (g, p) => p.or(g),
    }
}
