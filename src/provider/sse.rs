//! Server-sent events framing over a streamed HTTP body.

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::ProviderError;

/// One `event:` / `data:` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental frame splitter. Chunks may end anywhere, including inside a
/// multi-byte character; only complete frames are decoded.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame[..end])) {
                events.push(event);
            }
        }
        events
    }

    /// Returns a trailing frame that was not followed by a blank line.
    pub fn finish(self) -> Option<SseEvent> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        parse_frame(&String::from_utf8_lossy(&self.buffer))
    }
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }
    if data.is_empty() {
        if event.is_some() {
            tracing::debug!(?event, "SSE frame without data ignored");
        }
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Frames a response body as SSE events. Ends at the end of the body.
pub fn sse_events(response: reqwest::Response) -> BoxStream<'static, Result<SseEvent, ProviderError>> {
    Box::pin(try_stream! {
        let mut body = Box::pin(response.bytes_stream());
        let mut parser = SseParser::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ProviderError::network(format!("SSE stream error: {}", e)))?;
            for event in parser.push(&chunk) {
                yield event;
            }
        }
        if let Some(event) = parser.finish() {
            yield event;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: ping\nda").is_empty());
        let events = parser.push(b"ta: {}\n\nevent: message_stop\ndata: {\"a\":1}\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: Some("ping".into()),
                    data: "{}".into()
                },
                SseEvent {
                    event: Some("message_stop".into()),
                    data: "{\"a\":1}".into()
                },
            ]
        );
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keep-alive\r\n\r\ndata: {\"x\":true}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, None);
        assert_eq!(events[0].data, "{\"x\":true}");
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let payload = "data: {\"t\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = payload.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut parser = SseParser::new();
        assert!(parser.push(&payload[..split]).is_empty());
        let events = parser.push(&payload[split..]);
        assert_eq!(events[0].data, "{\"t\":\"caf\u{e9}\"}");
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_trailing_frame_without_blank_line() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: last").is_empty());
        assert_eq!(parser.finish().unwrap().data, "last");

        let parser = SseParser::new();
        assert!(parser.finish().is_none());
    }
}
