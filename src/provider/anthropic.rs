//! Anthropic Messages API streaming adapter.
//!
//! Sends the projected request with `stream: true` and maps each SSE frame
//! onto a [`ProviderEvent`]. `message_start`, `message_stop`, `ping` and
//! thinking/signature deltas carry nothing the decoder needs and are dropped.

use async_trait::async_trait;
use futures::{future, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::sse::{sse_events, SseEvent};
use super::{EventStream, Provider};
use crate::constants::{ANTHROPIC_API_VERSION, ANTHROPIC_DEFAULT_BASE_URL, MAX_TOKENS, PROVIDER_TIMEOUT_SECS};
use crate::decoder::{BlockKind, ProviderEvent, StopReason};
use crate::error::{ProviderError, TurnError};
use crate::message::Message;
use crate::projector::anthropic::AnthropicProjector;
use crate::projector::Projector;
use crate::tools::ToolDescriptor;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    projector: AnthropicProjector,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or(ANTHROPIC_DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            projector: AnthropicProjector {
                model: model.into(),
                max_tokens: MAX_TOKENS,
            },
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.projector.model
    }

    async fn open_turn(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<EventStream, TurnError> {
        let request = self.projector.project(history, tools)?;

        tracing::debug!(model = %self.projector.model, messages = history.len(), "anthropic request");
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body).into());
        }

        let events = sse_events(response).filter_map(|frame| {
            future::ready(match frame {
                Ok(frame) => map_event(&frame).transpose(),
                Err(e) => Some(Err(e)),
            })
        });
        Ok(Box::pin(events))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockStart {
        index: usize,
        content_block: Value,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: Option<usize>,
        delta: Delta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDeltaBody,
    },
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Maps one SSE frame to a provider event, or `None` for frames with no
/// decoder meaning.
pub(crate) fn map_event(frame: &SseEvent) -> Result<Option<ProviderEvent>, ProviderError> {
    let event: StreamEvent = serde_json::from_str(&frame.data).map_err(|e| {
        ProviderError::stream(format!(
            "Failed to parse {} event: {} - data: {}",
            frame.event.as_deref().unwrap_or("SSE"),
            e,
            frame.data
        ))
    })?;

    let mapped = match event {
        StreamEvent::ContentBlockStart {
            index,
            content_block,
        } => {
            let kind = match content_block["type"].as_str().unwrap_or_default() {
                "text" => BlockKind::Text,
                "tool_use" => BlockKind::ToolCall {
                    id: content_block["id"].as_str().unwrap_or_default().to_string(),
                    name: content_block["name"].as_str().unwrap_or_default().to_string(),
                    metadata: None,
                },
                other => BlockKind::Other(other.to_string()),
            };
            Some(ProviderEvent::BlockStart { index, kind })
        }
        StreamEvent::ContentBlockDelta { index, delta } => match delta {
            Delta::TextDelta { text } => Some(ProviderEvent::TextDelta {
                index: index.unwrap_or_default(),
                text,
            }),
            Delta::InputJsonDelta { partial_json } => Some(ProviderEvent::ArgsDelta {
                index,
                fragment: partial_json,
            }),
            Delta::Other => None,
        },
        StreamEvent::ContentBlockStop { index } => Some(ProviderEvent::BlockStop { index }),
        StreamEvent::MessageDelta { delta } => Some(ProviderEvent::MessageDelta {
            stop_reason: delta.stop_reason.as_deref().map(StopReason::parse),
        }),
        StreamEvent::Error { error } => {
            return Err(ProviderError::stream(format!(
                "Anthropic stream error ({}): {}",
                error.kind, error.message
            )));
        }
        StreamEvent::Ignored => None,
    };
    Ok(mapped)
}
