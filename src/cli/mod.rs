//! Command-line interface definition and dispatch for toolstream.
//!
//! Uses [`clap`] for argument parsing with derive macros. Each subcommand is
//! routed to its handler; the interactive REPL lives in [`crate::chat`].

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;

use crate::{chat, output};
use toolstream::agent::{Agent, AgentOptions};
use toolstream::config::{Config, ProviderEntry};
use toolstream::message::Message;
use toolstream::provider::{self, ModelSelection};
use toolstream::tools::ToolRegistry;

/// Top-level CLI structure for toolstream.
#[derive(Parser)]
#[command(
    name = "toolstream",
    about = "Stream LLM turns and run the tools they call"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands. The `///` doc comments on variants double as
/// `--help` text rendered by clap.
#[derive(Subcommand)]
pub enum Commands {
    /// Ask a one-shot question
    Ask {
        /// The question to ask
        prompt: Vec<String>,
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
        /// Provider to use (anthropic, gemini)
        #[arg(short, long)]
        provider: Option<String>,
        /// Stop after the first turn even if it called tools
        #[arg(long)]
        no_continue: bool,
    },
    /// Start an interactive chat session
    Chat {
        /// Provider to use (anthropic, gemini)
        #[arg(long)]
        provider: Option<String>,
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Subcommands for the `config` command.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current config
    Show,
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ask {
            prompt,
            model,
            provider: provider_name,
            no_continue,
        } => {
            let prompt = prompt.join(" ");
            if prompt.trim().is_empty() {
                anyhow::bail!("No prompt provided. Usage: toolstream ask \"your question here\"");
            }

            let config = Config::load()?;
            let selection =
                provider::resolve_model(provider_name.as_deref(), model.as_deref(), &config)?;

            println!(
                "{} [provider: {}] [model: {}]",
                "toolstream".bold().cyan(),
                selection.provider.as_str().yellow(),
                selection.model.yellow(),
            );
            println!();
            println!("{} {}", ">".green().bold(), prompt);
            println!();

            let mut agent_options = AgentOptions::from_config(&config);
            if no_continue {
                agent_options.auto_continue = false;
            }
            let agent = build_agent(&selection, &config, agent_options)?;

            let mut history = vec![
                Message::system(config.system_prompt()),
                Message::user(prompt),
            ];
            let mut renderer = output::StdoutRenderer::new();
            output::render_run(&agent, &mut history, &mut renderer).await?;
            Ok(())
        }
        Commands::Chat {
            provider: provider_name,
            model,
        } => {
            let config = Config::load()?;
            let selection =
                provider::resolve_model(provider_name.as_deref(), model.as_deref(), &config)?;
            let agent = build_agent(&selection, &config, AgentOptions::from_config(&config))?;
            chat::run_chat(&agent, config.system_prompt()).await
        }
        Commands::Config { action } => {
            let config = Config::load()?;
            match action {
                ConfigAction::Show => {
                    let path = Config::config_path()?;
                    println!("{} {}", "Config path:".bold(), path.display());
                    println!();
                    let toml_str = toml::to_string_pretty(&redacted(config))?;
                    println!("{}", toml_str);
                }
            }
            Ok(())
        }
    }
}

/// Wires provider, tool registry and loop options into an [`Agent`].
fn build_agent(
    selection: &ModelSelection,
    config: &Config,
    options: AgentOptions,
) -> Result<Agent> {
    let provider = provider::from_config(selection, config)?;
    let tools = if config.bash_enabled() {
        let work_dir = std::env::current_dir()?;
        ToolRegistry::with_builtins(work_dir, config.bash_timeout_secs())?
    } else {
        ToolRegistry::new()
    };
    tracing::debug!(tools = tools.len(), "tool registry ready");
    Ok(Agent::new(provider, Arc::new(tools), options))
}

/// Masks resolved API keys before printing.
fn redacted(mut config: Config) -> Config {
    fn mask(entry: &mut Option<ProviderEntry>) {
        if let Some(entry) = entry {
            if entry.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                entry.api_key = Some("********".to_string());
            }
        }
    }
    mask(&mut config.provider.anthropic);
    mask(&mut config.provider.gemini);
    config
}
