//! Gemini `streamGenerateContent` adapter.
//!
//! Gemini streams whole parts rather than block deltas, so [`ChunkMapper`]
//! synthesises the block vocabulary: all text of a turn shares one text
//! block, and each `functionCall` part becomes a start / single argument
//! delta / stop triple on its own index. A call id Gemini sends is kept
//! (and marked in metadata so it is echoed back); otherwise ids are
//! `"{name}_{n}"` with `n` the call's ordinal in the conversation, so they
//! stay unique across turns.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use super::sse::sse_events;
use super::{EventStream, Provider};
use crate::constants::{GEMINI_DEFAULT_BASE_URL, GEMINI_TEMPERATURE, PROVIDER_TIMEOUT_SECS};
use crate::decoder::{BlockKind, ProviderEvent, StopReason};
use crate::error::{ProviderError, TurnError};
use crate::message::{Message, Metadata};
use crate::projector::gemini::{GeminiProjector, CALL_ID_KEY, THOUGHT_SIGNATURE_KEY};
use crate::projector::Projector;
use crate::tools::ToolDescriptor;

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    projector: GeminiProjector,
}

impl GeminiProvider {
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
                .unwrap_or(GEMINI_DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            projector: GeminiProjector {
                temperature: GEMINI_TEMPERATURE,
            },
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn open_turn(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<EventStream, TurnError> {
        let request = self.projector.project(history, tools)?;

        tracing::debug!(model = %self.model, messages = history.len(), "gemini request");
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body).into());
        }

        let prior_calls = history.iter().map(|m| m.invocations().len()).sum();
        let mut mapper = ChunkMapper::starting_at(prior_calls);
        let events = sse_events(response).flat_map(move |frame| {
            let mapped: Vec<Result<ProviderEvent, ProviderError>> = match frame {
                Ok(frame) => match mapper.map_frame(&frame.data) {
                    Ok(events) => events.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                },
                Err(e) => vec![Err(e)],
            };
            stream::iter(mapped)
        });
        Ok(Box::pin(events))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
    #[serde(default)]
    thought_signature: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

/// Per-turn state for turning Gemini chunks into block events.
#[derive(Debug, Default)]
pub(crate) struct ChunkMapper {
    next_index: usize,
    text_index: Option<usize>,
    /// Calls numbered so far in the conversation.
    calls: usize,
    /// Whether this turn produced a call.
    turn_has_calls: bool,
}

impl ChunkMapper {
    /// Numbers synthesised call ids after the `prior_calls` already in history.
    pub(crate) fn starting_at(prior_calls: usize) -> Self {
        Self {
            calls: prior_calls,
            ..Self::default()
        }
    }

    pub(crate) fn map_frame(&mut self, data: &str) -> Result<Vec<ProviderEvent>, ProviderError> {
        let chunk: Chunk = serde_json::from_str(data).map_err(|e| {
            ProviderError::stream(format!("Failed to parse Gemini chunk: {} - data: {}", e, data))
        })?;
        if let Some(error) = chunk.error {
            return Err(ProviderError::from_status(error.code, &error.message));
        }

        let mut events = Vec::new();
        // Only the first candidate is requested.
        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(events);
        };

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(call) = part.function_call {
                self.push_call(call, part.thought_signature, &mut events);
            } else if let Some(text) = part.text {
                if part.thought == Some(true) || text.is_empty() {
                    continue;
                }
                let index = match self.text_index {
                    Some(index) => index,
                    None => {
                        let index = self.allocate();
                        self.text_index = Some(index);
                        events.push(ProviderEvent::BlockStart {
                            index,
                            kind: BlockKind::Text,
                        });
                        index
                    }
                };
                events.push(ProviderEvent::TextDelta { index, text });
            }
        }

        if let Some(reason) = candidate.finish_reason {
            if let Some(index) = self.text_index.take() {
                events.push(ProviderEvent::BlockStop { index });
            }
            let stop_reason = if self.turn_has_calls {
                StopReason::ToolUse
            } else {
                match reason.as_str() {
                    "STOP" => StopReason::EndTurn,
                    "MAX_TOKENS" => StopReason::MaxTokens,
                    _ => StopReason::Other(reason),
                }
            };
            events.push(ProviderEvent::MessageDelta {
                stop_reason: Some(stop_reason),
            });
        }
        Ok(events)
    }

    fn push_call(
        &mut self,
        call: FunctionCall,
        thought_signature: Option<Value>,
        events: &mut Vec<ProviderEvent>,
    ) {
        let index = self.allocate();
        let mut metadata = Metadata::new();
        let id = match call.id.filter(|id| !id.is_empty()) {
            Some(id) => {
                metadata.insert(CALL_ID_KEY.to_string(), Value::String(id.clone()));
                id
            }
            None => format!("{}_{}", call.name, self.calls),
        };
        self.calls += 1;
        self.turn_has_calls = true;

        if let Some(sig) = thought_signature {
            metadata.insert(THOUGHT_SIGNATURE_KEY.to_string(), sig);
        }
        let metadata = (!metadata.is_empty()).then_some(metadata);
        let args = Value::Object(call.args.unwrap_or_default());

        events.push(ProviderEvent::BlockStart {
            index,
            kind: BlockKind::ToolCall {
                id,
                name: call.name,
                metadata,
            },
        });
        events.push(ProviderEvent::ArgsDelta {
            index: Some(index),
            fragment: args.to_string(),
        });
        events.push(ProviderEvent::BlockStop { index });
    }

    fn allocate(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::error::ProviderErrorKind;
    use crate::message::StreamItem;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_text_parts_share_one_block() {
        let mut mapper = ChunkMapper::default();
        let first = mapper
            .map_frame(r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"}]}}]}"#)
            .unwrap();
        let second = mapper
            .map_frame(r#"{"candidates":[{"content":{"parts":[{"text":"lo"}]},"finishReason":"STOP"}]}"#)
            .unwrap();

        assert_eq!(
            first,
            vec![
                ProviderEvent::BlockStart {
                    index: 0,
                    kind: BlockKind::Text
                },
                ProviderEvent::TextDelta {
                    index: 0,
                    text: "Hel".into()
                },
            ]
        );
        assert_eq!(
            second,
            vec![
                ProviderEvent::TextDelta {
                    index: 0,
                    text: "lo".into()
                },
                ProviderEvent::BlockStop { index: 0 },
                ProviderEvent::MessageDelta {
                    stop_reason: Some(StopReason::EndTurn)
                },
            ]
        );
    }

    #[test]
    fn test_function_calls_get_ids_and_signature() {
        let mut mapper = ChunkMapper::default();
        let events = mapper
            .map_frame(
                &json!({"candidates": [{"content": {"parts": [
                    {"functionCall": {"name": "search", "args": {"q": "cats"}}, "thoughtSignature": "c2ln"},
                    {"functionCall": {"name": "search", "args": {"q": "dogs"}}}
                ]}, "finishReason": "STOP"}]})
                .to_string(),
            )
            .unwrap();

        let starts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProviderEvent::BlockStart {
                    index,
                    kind: BlockKind::ToolCall { id, metadata, .. },
                } => Some((*index, id.clone(), metadata.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(starts.len(), 2);
        assert_eq!(starts[0].1, "search_0");
        assert_eq!(starts[1].1, "search_1");
        assert_eq!(starts[0].2.as_ref().unwrap()[THOUGHT_SIGNATURE_KEY], "c2ln");
        assert!(starts[1].2.is_none());
        assert_eq!(
            events.last(),
            Some(&ProviderEvent::MessageDelta {
                stop_reason: Some(StopReason::ToolUse)
            })
        );
    }

    #[test]
    fn test_gemini_call_id_is_kept_and_marked() {
        let mut mapper = ChunkMapper::default();
        let events = mapper
            .map_frame(r#"{"candidates":[{"content":{"parts":[{"functionCall":{"id":"fc-9","name":"ls"}}]}}]}"#)
            .unwrap();
        let ProviderEvent::BlockStart {
            kind: BlockKind::ToolCall { id, metadata, .. },
            ..
        } = &events[0]
        else {
            panic!("expected a tool block, got {:?}", events[0]);
        };
        assert_eq!(id, "fc-9");
        assert_eq!(metadata.as_ref().unwrap()[CALL_ID_KEY], "fc-9");
    }

    #[test]
    fn test_ids_continue_after_prior_calls() {
        let mut mapper = ChunkMapper::starting_at(3);
        let events = mapper
            .map_frame(r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"ls"}}]}}]}"#)
            .unwrap();
        assert!(matches!(
            &events[0],
            ProviderEvent::BlockStart { kind: BlockKind::ToolCall { id, .. }, .. } if id == "ls_3"
        ));
        assert_eq!(
            events[1],
            ProviderEvent::ArgsDelta {
                index: Some(0),
                fragment: "{}".into()
            }
        );
    }

    #[test]
    fn test_thought_parts_skipped() {
        let mut mapper = ChunkMapper::default();
        let events = mapper
            .map_frame(r#"{"candidates":[{"content":{"parts":[{"text":"thinking...","thought":true}]}}]}"#)
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_error_chunk() {
        let mut mapper = ChunkMapper::default();
        let err = mapper
            .map_frame(r#"{"error":{"code":429,"message":"Resource exhausted","status":"RESOURCE_EXHAUSTED"}}"#)
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimit);
    }

    #[tokio::test]
    async fn test_streamed_turn_end_to_end() {
        let server = MockServer::start().await;
        let body = [
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Let me check. "}]}}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "bash", "args": {"command": "pwd"}}}
            ]}, "finishReason": "STOP"}]}),
        ]
        .iter()
        .map(|chunk| format!("data: {}\r\n\r\n", chunk))
        .collect::<String>();

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .and(header("x-goog-api-key", "test_api_key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("test_api_key", "gemini-test", Some(server.uri().as_str())).unwrap();
        let history = vec![Message::system("sys"), Message::user("where am i")];
        let events = provider.open_turn(&history, &[]).await.unwrap();
        let items: Vec<StreamItem> = decode(events).map(|item| item.unwrap()).collect().await;

        assert_eq!(items[0], StreamItem::Token("Let me check. ".into()));
        let StreamItem::Invocation(call) = &items[1] else {
            panic!("expected invocation, got {:?}", items[1]);
        };
        assert_eq!(call.id, "bash_0");
        assert_eq!(call.args["command"], "pwd");
    }
}
