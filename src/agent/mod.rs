//! Tool dispatch loop.
//!
//! [`Agent::run`] drives a conversation forward: it opens a provider turn,
//! forwards text tokens as they are decoded, executes each closed tool call
//! and records its response, then extends the history. With
//! `auto_continue` it keeps requesting new turns until one produces no tool
//! calls (or the turn limit is hit).
//!
//! Tool failures never abort a turn. An unknown tool or a failing tool is
//! rendered into the invocation's response so the model can see it.

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};

use crate::config::Config;
use crate::decoder::decode;
use crate::error::{ToolError, TurnError};
use crate::message::{Message, StreamItem, ToolInvocation};
use crate::provider::Provider;
use crate::tools::{stringify_output, ToolRegistry};

/// Loop behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    /// Start a follow-up turn after a turn that resolved tool calls.
    pub auto_continue: bool,
    /// Upper bound on provider requests per [`Agent::run`].
    pub max_turns: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            auto_continue: crate::constants::AUTO_CONTINUE_DEFAULT,
            max_turns: crate::constants::MAX_AGENT_TURNS,
        }
    }
}

impl AgentOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auto_continue: config.auto_continue(),
            max_turns: config.max_turns(),
        }
    }
}

pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    options: AgentOptions,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, options: AgentOptions) -> Self {
        Self {
            provider,
            tools,
            options,
        }
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Runs turns against `history`, yielding tokens and resolved invocations.
    ///
    /// `history` must open with a system message. After each completed turn
    /// it gains the assistant's text (if any) and then one message holding
    /// that turn's resolved calls. A turn that fails leaves `history` as it
    /// was before the turn.
    ///
    /// Tools run one at a time in the order their calls closed. Provider
    /// events keep being read while a tool runs, so text arriving after a
    /// call is forwarded without waiting for the tool.
    ///
    /// The stream is single pass. Dropping it stops reading provider events;
    /// a tool already executing runs to completion on its own task.
    pub fn run<'a>(
        &'a self,
        history: &'a mut Vec<Message>,
    ) -> BoxStream<'a, Result<StreamItem, TurnError>> {
        Box::pin(try_stream! {
            let mut recorded = recorded_responses(history);
            let max_turns = self.options.max_turns.max(1);

            for turn in 1..=max_turns {
                tracing::info!(turn, provider = self.provider.name(), model = self.provider.model(), "starting turn");
                let events = self
                    .provider
                    .open_turn(history, self.tools.descriptors())
                    .await?;
                let mut items = decode(events);

                let mut text = String::new();
                let mut resolved: Vec<ToolInvocation> = Vec::new();
                let mut queued: VecDeque<ToolInvocation> = VecDeque::new();
                let mut running: Option<RunningTool> = None;
                let mut events_done = false;

                loop {
                    while running.is_none() {
                        let mut invocation = match queued.pop_front() {
                            Some(invocation) => invocation,
                            None => break,
                        };
                        if reuse_recorded(&mut invocation, &recorded) {
                            resolved.push(invocation.clone());
                            yield StreamItem::Invocation(invocation);
                        } else {
                            running = Some(self.spawn_tool(invocation));
                        }
                    }
                    if events_done && running.is_none() {
                        break;
                    }

                    let step = tokio::select! {
                        biased;
                        item = items.next(), if !events_done => Step::Event(item),
                        outcome = join_running(&mut running), if running.is_some() => Step::ToolDone(outcome),
                    };
                    match step {
                        Step::Event(None) => events_done = true,
                        Step::Event(Some(item)) => match item? {
                            StreamItem::Token(token) => {
                                text.push_str(&token);
                                yield StreamItem::Token(token);
                            }
                            StreamItem::Invocation(invocation) => queued.push_back(invocation),
                        },
                        Step::ToolDone(outcome) => {
                            if let Some(RunningTool { mut invocation, .. }) = running.take() {
                                let response = render_outcome(&invocation, outcome);
                                if let Err(e) = invocation.resolve(response) {
                                    tracing::warn!(error = %e, "tool response not recorded");
                                }
                                if let Some(response) = invocation.response() {
                                    recorded.insert(invocation.id.clone(), response.to_string());
                                }
                                resolved.push(invocation.clone());
                                yield StreamItem::Invocation(invocation);
                            }
                        }
                    }
                }

                if !text.is_empty() {
                    history.push(Message::assistant(text));
                }
                if resolved.is_empty() {
                    break;
                }
                history.push(Message::tool_calls(resolved));

                if !self.options.auto_continue {
                    break;
                }
                if turn == max_turns {
                    tracing::warn!(max_turns, "turn limit reached with tool results pending a reply");
                }
            }
        })
    }

    /// Starts `invocation`'s tool on its own task so it finishes even if the
    /// caller drops the stream.
    fn spawn_tool(&self, invocation: ToolInvocation) -> RunningTool {
        let tools = Arc::clone(&self.tools);
        let name = invocation.name.clone();
        let input = Value::Object(invocation.args.clone());
        tracing::debug!(call_id = %invocation.id, tool = %invocation.name, "tool started");
        let task = tokio::spawn(async move { tools.execute(&name, input).await });
        RunningTool { invocation, task }
    }
}

/// The tool call currently executing.
struct RunningTool {
    invocation: ToolInvocation,
    task: JoinHandle<Result<Value, ToolError>>,
}

enum Step {
    Event(Option<Result<StreamItem, TurnError>>),
    ToolDone(Result<Result<Value, ToolError>, JoinError>),
}

async fn join_running(
    running: &mut Option<RunningTool>,
) -> Result<Result<Value, ToolError>, JoinError> {
    match running {
        Some(tool) => (&mut tool.task).await,
        None => std::future::pending().await,
    }
}

/// Resolves `invocation` from an earlier response for the same id instead
/// of running the tool again. Returns whether it is resolved.
fn reuse_recorded(invocation: &mut ToolInvocation, recorded: &HashMap<String, String>) -> bool {
    if invocation.is_resolved() {
        return true;
    }
    let Some(previous) = recorded.get(&invocation.id) else {
        return false;
    };
    tracing::info!(call_id = %invocation.id, tool = %invocation.name, "reusing recorded tool response");
    if let Err(e) = invocation.resolve(previous.clone()) {
        tracing::warn!(error = %e, "tool response not recorded");
    }
    true
}

/// Text the model sees for a finished tool task.
fn render_outcome(
    invocation: &ToolInvocation,
    outcome: Result<Result<Value, ToolError>, JoinError>,
) -> String {
    match outcome {
        Ok(Ok(output)) => {
            tracing::info!(call_id = %invocation.id, tool = %invocation.name, "tool succeeded");
            stringify_output(output)
        }
        Ok(Err(e)) => {
            tracing::info!(call_id = %invocation.id, tool = %invocation.name, error = %e, "tool failed");
            format!("Error: {}", e)
        }
        Err(e) => {
            tracing::warn!(call_id = %invocation.id, tool = %invocation.name, error = %e, "tool task aborted");
            format!("Error: tool '{}' did not complete: {}", invocation.name, e)
        }
    }
}

/// Responses already recorded in history, by call id.
fn recorded_responses(history: &[Message]) -> HashMap<String, String> {
    history
        .iter()
        .flat_map(Message::invocations)
        .filter_map(|inv| Some((inv.id.clone(), inv.response()?.to_string())))
        .collect()
}
