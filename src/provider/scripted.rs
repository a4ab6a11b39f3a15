//! Provider that replays canned event sequences, one per turn.

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{EventStream, Provider};
use crate::decoder::{BlockKind, ProviderEvent, StopReason};
use crate::error::{ProviderError, ProviderErrorKind, TurnError};
use crate::message::Message;
use crate::projector::pair_history;
use crate::tools::ToolDescriptor;

pub(crate) type Turn = Vec<Result<ProviderEvent, ProviderError>>;

#[derive(Default)]
pub(crate) struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub(crate) fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::default(),
        }
    }

    /// History snapshots sent with each request, in order.
    pub(crate) fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn open_turn(
        &self,
        history: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<EventStream, TurnError> {
        pair_history(history)?;
        self.requests.lock().unwrap().push(history.to_vec());
        let turn = self.turns.lock().unwrap().pop_front().ok_or_else(|| {
            ProviderError::new(ProviderErrorKind::Unknown, "script exhausted")
        })?;
        Ok(Box::pin(stream::iter(turn)))
    }
}

/// A turn that only says `text`.
pub(crate) fn text_turn(text: &str) -> Turn {
    vec![
        Ok(ProviderEvent::BlockStart {
            index: 0,
            kind: BlockKind::Text,
        }),
        Ok(ProviderEvent::TextDelta {
            index: 0,
            text: text.to_string(),
        }),
        Ok(ProviderEvent::BlockStop { index: 0 }),
        Ok(ProviderEvent::MessageDelta {
            stop_reason: Some(StopReason::EndTurn),
        }),
    ]
}

/// A turn that calls each `(id, name, args_json)` in order.
pub(crate) fn call_turn(calls: &[(&str, &str, &str)]) -> Turn {
    let mut events = Vec::new();
    for (index, (id, name, args)) in calls.iter().enumerate() {
        events.push(Ok(ProviderEvent::BlockStart {
            index,
            kind: BlockKind::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                metadata: None,
            },
        }));
        events.push(Ok(ProviderEvent::ArgsDelta {
            index: Some(index),
            fragment: args.to_string(),
        }));
        events.push(Ok(ProviderEvent::BlockStop { index }));
    }
    events.push(Ok(ProviderEvent::MessageDelta {
        stop_reason: Some(StopReason::ToolUse),
    }));
    events
}
