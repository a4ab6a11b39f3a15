//! Configuration types and path resolution for toolstream.
//!
//! Settings are stored as TOML at the platform's XDG config path
//! (e.g. `~/.config/toolstream/config.toml` on Linux). A `toolstream.toml`
//! found between the working directory and the git root overrides them.

mod loader;
mod paths;
mod resolve;
mod types;

pub use types::{AgentConfig, Config, ProviderConfig, ProviderEntry, ToolsConfig};

use anyhow::Result;

impl Config {
    /// Load config with precedence: project > global > defaults.
    /// Creates default config file if none exists.
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project()?;

        let mut config = global;
        if let Some(proj) = project {
            config = Self::merge(config, proj);
        }

        config.resolve_substitutions();
        tracing::debug!(model = %config.model, provider = ?config.default_provider, "config loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests;
