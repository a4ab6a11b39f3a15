//! Anthropic Messages API request shape.

use serde::Serialize;
use serde_json::Value;

use super::{pair_history, Projector, WirePart, WireRole};
use crate::error::ProjectionError;
use crate::message::{Message, ToolInvocation};
use crate::tools::ToolDescriptor;

/// Projects history into a streaming `/v1/messages` request.
#[derive(Debug, Clone)]
pub struct AnthropicProjector {
    pub model: String,
    pub max_tokens: u32,
}

impl Projector for AnthropicProjector {
    type Request = AnthropicRequest;

    fn project(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<AnthropicRequest, ProjectionError> {
        let paired = pair_history(history)?;

        let messages = paired
            .entries
            .iter()
            .map(|entry| AnthropicMessage {
                role: match entry.role {
                    WireRole::User => "user",
                    WireRole::Assistant => "assistant",
                },
                content: entry.parts.iter().map(|part| content_block(*part)).collect(),
            })
            .collect();

        let tools = tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.to_json(),
            })
            .collect::<Vec<_>>();

        Ok(AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: paired.system.to_string(),
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            stream: true,
        })
    }
}

fn content_block(part: WirePart<'_>) -> AnthropicContentBlock {
    match part {
        WirePart::Text(text) => AnthropicContentBlock::Text {
            text: text.to_string(),
        },
        WirePart::Call(call) => AnthropicContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: Value::Object(call.args.clone()),
        },
        WirePart::Result(call) => AnthropicContentBlock::ToolResult {
            tool_use_id: call.id.clone(),
            content: result_text(call),
            is_error: false,
        },
    }
}

fn result_text(call: &ToolInvocation) -> String {
    call.response().unwrap_or_default().to_string()
}

// Anthropic API types

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}
