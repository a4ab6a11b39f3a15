//! Gemini `generateContent` request shape.
//!
//! Calls and responses carry the call id when Gemini assigned one (marked by
//! [`CALL_ID_KEY`] in the invocation's metadata). Synthesised ids stay local;
//! those responses are matched by name and position within the entry, which
//! [`pair_history`] preserves. The `thoughtSignature` a call arrived with
//! lives in the metadata under [`THOUGHT_SIGNATURE_KEY`] and is sent back
//! unchanged.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{pair_history, Projector, WirePart, WireRole};
use crate::error::ProjectionError;
use crate::message::{Message, ToolInvocation};
use crate::tools::ToolDescriptor;

/// Metadata key holding a function call's opaque thought signature.
pub const THOUGHT_SIGNATURE_KEY: &str = "thought_signature";

/// Metadata key present when the call id was assigned by Gemini.
pub const CALL_ID_KEY: &str = "gemini_call_id";

#[derive(Debug, Clone)]
pub struct GeminiProjector {
    pub temperature: f32,
}

impl Projector for GeminiProjector {
    type Request = GeminiRequest;

    fn project(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<GeminiRequest, ProjectionError> {
        let paired = pair_history(history)?;

        let contents = paired
            .entries
            .iter()
            .map(|entry| GeminiContent {
                role: match entry.role {
                    WireRole::User => "user",
                    WireRole::Assistant => "model",
                },
                parts: entry.parts.iter().map(|part| to_part(*part)).collect(),
            })
            .collect();

        let declarations: Vec<FunctionDeclaration> = tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: json!({
                    "type": "object",
                    "properties": t.input_schema.properties,
                    "required": t.input_schema.required,
                }),
            })
            .collect();

        Ok(GeminiRequest {
            system_instruction: GeminiSystemInstruction {
                parts: vec![TextPart {
                    text: paired.system.to_string(),
                }],
            },
            contents,
            tools: if declarations.is_empty() {
                None
            } else {
                Some(vec![GeminiTools {
                    function_declarations: declarations,
                }])
            },
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        })
    }
}

fn to_part(part: WirePart<'_>) -> GeminiPart {
    match part {
        WirePart::Text(text) => GeminiPart {
            text: Some(text.to_string()),
            ..GeminiPart::default()
        },
        WirePart::Call(call) => GeminiPart {
            function_call: Some(FunctionCall {
                id: wire_id(call),
                name: call.name.clone(),
                args: call.args.clone(),
            }),
            thought_signature: call
                .metadata
                .as_ref()
                .and_then(|m| m.get(THOUGHT_SIGNATURE_KEY))
                .cloned(),
            ..GeminiPart::default()
        },
        WirePart::Result(call) => GeminiPart {
            function_response: Some(FunctionResponse {
                id: wire_id(call),
                name: call.name.clone(),
                response: json!({ "result": call.response().unwrap_or_default() }),
            }),
            ..GeminiPart::default()
        },
    }
}

/// The id to put on the wire, only for ids Gemini assigned itself.
fn wire_id(call: &ToolInvocation) -> Option<String> {
    call.metadata
        .as_ref()
        .is_some_and(|m| m.contains_key(CALL_ID_KEY))
        .then(|| call.id.clone())
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    system_instruction: GeminiSystemInstruction,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTools>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<Value>,
}

#[derive(Debug, Serialize)]
struct FunctionCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    args: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}
