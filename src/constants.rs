//! Centralized constants for toolstream.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "toolstream";

/// Default LLM model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Default LLM model identifier for Gemini.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Maximum tokens for LLM completions.
pub const MAX_TOKENS: u32 = 4096;

/// Sampling temperature sent to Gemini.
pub const GEMINI_TEMPERATURE: f32 = 1.0;

/// Default system prompt prepended to all conversations.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant running in the user's terminal. \
You can run shell commands with the bash tool when it helps answer a question. Be concise.";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Per-project configuration filename.
pub const PROJECT_CONFIG_FILENAME: &str = "toolstream.toml";

/// Readline history filename.
pub const HISTORY_FILENAME: &str = "chat_history.txt";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "toolstream=warn";

// --- Provider defaults ---

/// Default provider when none is configured.
pub const DEFAULT_PROVIDER: &str = "anthropic";

/// Base URL for the Anthropic Messages API.
pub const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Value of the `anthropic-version` request header.
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Base URL for the Gemini Generative Language API.
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// HTTP request timeout for streaming provider calls.
pub const PROVIDER_TIMEOUT_SECS: u64 = 300;

// --- Agent loop ---

/// Default: resolved tool calls trigger a follow-up request.
pub const AUTO_CONTINUE_DEFAULT: bool = true;

/// Default upper bound on provider requests per [`crate::agent::Agent::run`].
pub const MAX_AGENT_TURNS: usize = 16;

// --- Tool limits ---

/// Default timeout for the bash tool, in seconds.
pub const BASH_DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum bytes of combined bash output returned to the model.
pub const BASH_MAX_OUTPUT_SIZE: usize = 30 * 1024;

/// Environment variables removed before spawning shell commands.
pub const BASH_STRIPPED_ENV_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "OPENAI_API_KEY",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "GITHUB_TOKEN",
];
