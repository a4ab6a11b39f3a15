//! History projection: domain conversation to provider request payloads.
//!
//! Projection runs in two steps. [`pair_history`] is provider-agnostic: it
//! pulls out the system prompt, validates content shapes and expands every
//! tool-call message into the assistant-call / user-result pair providers
//! expect. Each provider module then renders those [`WireEntry`]s into its
//! own serde types.
//!
//! Inbound projection is the decoder's job; nothing here parses responses.

pub mod anthropic;
pub mod gemini;

use serde::Serialize;

use crate::error::ProjectionError;
use crate::message::{Content, Message, Role, ToolInvocation};
use crate::tools::ToolDescriptor;

/// Builds a provider request body from history and tool declarations.
pub trait Projector {
    type Request: Serialize;

    fn project(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Self::Request, ProjectionError>;
}

/// Speaker of a wire entry. Tool results are always sent as `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WirePart<'a> {
    Text(&'a str),
    /// The model's request to run a tool.
    Call(&'a ToolInvocation),
    /// The recorded result for a call, addressed by the call's id.
    Result(&'a ToolInvocation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireEntry<'a> {
    pub role: WireRole,
    pub parts: Vec<WirePart<'a>>,
}

/// History split into system instruction and ordered wire entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedHistory<'a> {
    pub system: &'a str,
    pub entries: Vec<WireEntry<'a>>,
}

/// Validates `history` and expands it into wire entries.
///
/// The first message must be a system message with non-empty text. A single
/// call becomes an assistant entry with one call followed by a user entry
/// with its result; a batch becomes one entry of each, in call order.
pub fn pair_history(history: &[Message]) -> Result<PairedHistory<'_>, ProjectionError> {
    let (first, rest) = history
        .split_first()
        .ok_or(ProjectionError::MissingSystemPrompt)?;
    let system = match (&first.role, &first.content) {
        (Role::System, Content::Text(text)) if !text.trim().is_empty() => text.as_str(),
        _ => return Err(ProjectionError::MissingSystemPrompt),
    };

    let mut entries = Vec::with_capacity(rest.len() + 1);
    for (i, message) in rest.iter().enumerate() {
        let position = i + 1;
        match (&message.role, &message.content) {
            (Role::System, _) => {
                return Err(ProjectionError::UnsupportedContent(format!(
                    "system message at position {} (only the first message may be a system message)",
                    position
                )));
            }
            (Role::User, Content::Text(text)) => entries.push(WireEntry {
                role: WireRole::User,
                parts: vec![WirePart::Text(text)],
            }),
            (Role::Assistant, Content::Text(text)) => entries.push(WireEntry {
                role: WireRole::Assistant,
                parts: vec![WirePart::Text(text)],
            }),
            (Role::Assistant, Content::SingleCall(call)) => {
                push_call_pair(&mut entries, std::slice::from_ref(call))
            }
            (Role::Assistant, Content::CallBatch(calls)) => {
                if calls.is_empty() {
                    return Err(ProjectionError::UnsupportedContent(format!(
                        "empty tool call batch at position {}",
                        position
                    )));
                }
                push_call_pair(&mut entries, calls)
            }
            (role, _) => {
                return Err(ProjectionError::UnsupportedContent(format!(
                    "tool calls in a {} message at position {}",
                    role, position
                )));
            }
        }
    }

    Ok(PairedHistory { system, entries })
}

fn push_call_pair<'a>(entries: &mut Vec<WireEntry<'a>>, calls: &'a [ToolInvocation]) {
    entries.push(WireEntry {
        role: WireRole::Assistant,
        parts: calls.iter().map(WirePart::Call).collect(),
    });
    entries.push(WireEntry {
        role: WireRole::User,
        parts: calls.iter().map(WirePart::Result).collect(),
    });
}
