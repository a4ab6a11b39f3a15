//! Message types for toolstream's conversation history.
//!
//! Provides a structured [`Message`] type with [`Role`] and [`Content`] enums
//! that represent conversation turns. These are provider-agnostic; the
//! [`projector`](crate::projector) converts them to each provider's request
//! shape, and the [`decoder`](crate::decoder) produces [`ToolInvocation`]s in
//! this shape directly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AlreadyResolved;

/// Parameter name to value, as parsed from a tool call's argument payload.
pub type Args = Map<String, Value>;

/// Provider-specific side channel carried on an invocation.
///
/// Opaque to everything but the provider adapter that produced it, which
/// echoes it back verbatim on the next request.
pub type Metadata = Map<String, Value>;

/// A request by the model to run a named tool.
///
/// Created by the decoder once its provider block has closed, so `args` is
/// always populated (possibly empty). The dispatch loop writes `response`
/// exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-assigned identifier, unique within a turn.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Parsed arguments.
    #[serde(default)]
    pub args: Args,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Args) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            response: None,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The tool's output, once resolved.
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.response.is_some()
    }

    /// Records the tool's output. A resolved invocation is immutable, so a
    /// second call leaves the first response in place and returns an error.
    pub fn resolve(&mut self, response: impl Into<String>) -> Result<(), AlreadyResolved> {
        if self.response.is_some() {
            return Err(AlreadyResolved {
                id: self.id.clone(),
            });
        }
        self.response = Some(response.into());
        Ok(())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

/// The role of a message sender in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message body: prose, one tool call, or the parallel calls of one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    SingleCall(ToolInvocation),
    CallBatch(Vec<ToolInvocation>),
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(text.into()),
        }
    }

    /// Assistant message holding the resolved calls of one turn.
    ///
    /// A single call becomes [`Content::SingleCall`], several become a
    /// [`Content::CallBatch`] in the order given.
    pub fn tool_calls(mut calls: Vec<ToolInvocation>) -> Self {
        let content = if calls.len() == 1 {
            Content::SingleCall(calls.remove(0))
        } else {
            Content::CallBatch(calls)
        };
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Returns the text body, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Tool invocations carried by this message, in call order.
    pub fn invocations(&self) -> &[ToolInvocation] {
        match &self.content {
            Content::Text(_) => &[],
            Content::SingleCall(call) => std::slice::from_ref(call),
            Content::CallBatch(calls) => calls,
        }
    }
}

/// One item of a turn's output: a prose fragment or a closed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Incremental assistant text, forwarded as soon as it arrives.
    Token(String),
    /// A fully assembled invocation. Resolved once it leaves the dispatch loop.
    Invocation(ToolInvocation),
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}
