//! Provider event decoder.
//!
//! Turns a provider's incremental, interleaved block events into a uniform
//! sequence of [`StreamItem`]s: text tokens are passed through as soon as they
//! arrive, tool calls are assembled per block and emitted only once their
//! block has closed, with the accumulated argument JSON parsed.
//!
//! Several tool-call blocks may be open at once. Argument fragments are routed
//! by block index; the fallbacks used when a provider omits or garbles that
//! index live in [`routing`].

mod routing;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::{ProtocolViolation, ProviderError, TurnError};
use crate::message::{Args, Metadata, StreamItem, ToolInvocation};

/// Kind of content block opened by [`ProviderEvent::BlockStart`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Text,
    ToolCall {
        id: String,
        name: String,
        metadata: Option<Metadata>,
    },
    /// A block the decoder does not surface (e.g. model reasoning).
    Other(String),
}

/// Why the model ended its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    /// The model stopped in order to have tools run.
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    /// Parses Anthropic-style stop reason names.
    pub fn parse(s: &str) -> Self {
        match s {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Provider-agnostic incremental event, as produced by a transport adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    BlockStart { index: usize, kind: BlockKind },
    TextDelta { index: usize, text: String },
    /// Raw partial JSON for a tool call's arguments. `index` is `None` when
    /// the provider omitted it.
    ArgsDelta {
        index: Option<usize>,
        fragment: String,
    },
    BlockStop { index: usize },
    MessageDelta { stop_reason: Option<StopReason> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Text,
    Tool,
    Other,
}

/// A tool call whose block has started but not yet closed.
#[derive(Debug)]
struct PendingCall {
    index: usize,
    invocation: ToolInvocation,
    buffer: String,
}

/// Incremental decoder for one turn.
///
/// Feed events in provider order with [`Decoder::push`]; each call returns
/// the items that became available. Single use: a new turn needs a new decoder.
#[derive(Debug, Default)]
pub struct Decoder {
    blocks: HashMap<usize, OpenBlock>,
    /// Open tool calls, oldest first.
    calls: Vec<PendingCall>,
    index_to_id: HashMap<usize, String>,
    /// Indices of tool blocks that have closed.
    closed: HashSet<usize>,
    seen_ids: HashSet<String>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tool calls opened but not yet emitted.
    pub fn open_calls(&self) -> usize {
        self.calls.len()
    }

    pub fn push(&mut self, event: ProviderEvent) -> Result<Vec<StreamItem>, ProtocolViolation> {
        tracing::debug!(?event, "provider event");
        match event {
            ProviderEvent::BlockStart { index, kind } => {
                self.start_block(index, kind)?;
                Ok(Vec::new())
            }
            ProviderEvent::TextDelta { index, text } => {
                if self.blocks.get(&index) != Some(&OpenBlock::Text) {
                    tracing::warn!(index, "text delta outside an open text block");
                }
                if text.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![StreamItem::Token(text)])
            }
            ProviderEvent::ArgsDelta { index, fragment } => {
                let pos = routing::route(index, &self.calls, &self.index_to_id, &self.closed)?;
                self.calls[pos].buffer.push_str(&fragment);
                Ok(Vec::new())
            }
            ProviderEvent::BlockStop { index } => Ok(self.stop_block(index).into_iter().collect()),
            ProviderEvent::MessageDelta { stop_reason } => {
                if stop_reason != Some(StopReason::ToolUse) || self.calls.is_empty() {
                    return Ok(Vec::new());
                }
                tracing::warn!(
                    count = self.calls.len(),
                    "tool-use stop with unterminated tool blocks; flushing them"
                );
                let mut items = Vec::with_capacity(self.calls.len());
                while !self.calls.is_empty() {
                    let index = self.calls[0].index;
                    self.blocks.remove(&index);
                    self.closed.insert(index);
                    items.push(StreamItem::Invocation(self.close_call(0)));
                }
                Ok(items)
            }
        }
    }

    /// Ends the turn. Tool calls that never closed are dropped: without a
    /// block stop or a tool-use stop reason their arguments may be truncated.
    pub fn finish(self) {
        for call in &self.calls {
            tracing::warn!(
                call_id = %call.invocation.id,
                tool = %call.invocation.name,
                "discarding tool call left open at end of stream"
            );
        }
    }

    fn start_block(&mut self, index: usize, kind: BlockKind) -> Result<(), ProtocolViolation> {
        if self.blocks.contains_key(&index) {
            return Err(ProtocolViolation::IndexReused { index });
        }
        self.closed.remove(&index);
        match kind {
            BlockKind::Text => {
                self.blocks.insert(index, OpenBlock::Text);
            }
            BlockKind::Other(kind) => {
                tracing::debug!(index, %kind, "ignoring block");
                self.blocks.insert(index, OpenBlock::Other);
            }
            BlockKind::ToolCall { id, name, metadata } => {
                if id.is_empty() || name.is_empty() {
                    return Err(ProtocolViolation::MissingCallIdentity { index });
                }
                if !self.seen_ids.insert(id.clone()) {
                    return Err(ProtocolViolation::DuplicateCallId { id });
                }
                self.blocks.insert(index, OpenBlock::Tool);
                self.index_to_id.insert(index, id.clone());
                self.calls.push(PendingCall {
                    index,
                    invocation: ToolInvocation::new(id, name, Args::new()).with_metadata(metadata),
                    buffer: String::new(),
                });
            }
        }
        Ok(())
    }

    fn stop_block(&mut self, index: usize) -> Option<StreamItem> {
        match self.blocks.remove(&index) {
            Some(OpenBlock::Tool) => {
                self.closed.insert(index);
                let id = self.index_to_id.get(&index)?;
                let pos = self.calls.iter().position(|c| &c.invocation.id == id)?;
                Some(StreamItem::Invocation(self.close_call(pos)))
            }
            Some(_) => None,
            None => {
                tracing::debug!(index, "stop for a block that is not open");
                None
            }
        }
    }

    fn close_call(&mut self, pos: usize) -> ToolInvocation {
        let PendingCall {
            mut invocation,
            buffer,
            ..
        } = self.calls.remove(pos);
        invocation.args = parse_args(&buffer, &invocation.id);
        invocation
    }
}

/// Parses an accumulated argument buffer. Anything that is not a JSON object
/// degrades to empty arguments so one bad call does not fail the turn.
fn parse_args(buffer: &str, call_id: &str) -> Args {
    if buffer.trim().is_empty() {
        return Args::new();
    }
    match serde_json::from_str::<Value>(buffer) {
        Ok(Value::Object(args)) => args,
        Ok(other) => {
            tracing::warn!(call_id, value = %other, "tool arguments are not an object; using {{}}");
            Args::new()
        }
        Err(e) => {
            tracing::warn!(call_id, error = %e, "malformed tool arguments; using {{}}");
            Args::new()
        }
    }
}

/// Decodes a provider event stream lazily.
///
/// Single pass and not restartable. A transport error or a protocol violation
/// ends the stream with that error; nothing further is read.
pub fn decode<S>(events: S) -> BoxStream<'static, Result<StreamItem, TurnError>>
where
    S: Stream<Item = Result<ProviderEvent, ProviderError>> + Send + 'static,
{
    Box::pin(try_stream! {
        let mut decoder = Decoder::new();
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            for item in decoder.push(event?)? {
                yield item;
            }
        }
        decoder.finish();
    })
}

#[cfg(test)]
mod tests;
