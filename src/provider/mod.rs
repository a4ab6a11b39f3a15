//! LLM provider abstraction for toolstream.
//!
//! A [`Provider`] sends one turn's request and hands back the typed event
//! stream for the [`decoder`](crate::decoder). Wire encoding, HTTP and SSE
//! framing stay inside each adapter. Supports Anthropic and Gemini via
//! [`ProviderKind`].

mod anthropic;
mod gemini;
mod kind;
mod resolve;
#[cfg(test)]
pub(crate) mod scripted;
mod sse;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use kind::{default_model_for, ProviderKind};
pub use resolve::{resolve_model, ModelSelection};

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::config::Config;
use crate::decoder::ProviderEvent;
use crate::error::{ProviderError, TurnError};
use crate::message::Message;
use crate::tools::ToolDescriptor;

/// Typed provider events for one turn, in wire order.
pub type EventStream = BoxStream<'static, Result<ProviderEvent, ProviderError>>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for logs ("anthropic", "gemini").
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Projects `history` and `tools`, sends the request and returns the
    /// response's event stream. Projection errors are raised before anything
    /// is sent.
    async fn open_turn(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<EventStream, TurnError>;
}

/// Builds the provider for a resolved selection, reading credentials and
/// base URLs from config.
pub fn from_config(selection: &ModelSelection, config: &Config) -> Result<Arc<dyn Provider>> {
    let name = selection.provider.as_str();
    let Some(api_key) = config.resolve_api_key(name) else {
        bail!(
            "No API key for {name}. Set {}_API_KEY or provider.{name}.api_key in {:?}",
            name.to_uppercase(),
            Config::config_path().unwrap_or_default()
        );
    };
    let base_url = config.base_url(name);

    let provider: Arc<dyn Provider> = match selection.provider {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
            api_key,
            selection.model.clone(),
            base_url,
        )?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(
            api_key,
            selection.model.clone(),
            base_url,
        )?),
    };
    Ok(provider)
}
