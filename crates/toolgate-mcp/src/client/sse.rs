//! Minimal server-sent-events parsing for streamable HTTP responses.

use futures_util::StreamExt;
use toolgate_core::TransportError;
use tracing::debug;

use super::protocol::JsonRpcMessage;

/// Reassembles a byte stream into the `data` payloads of complete events.
///
/// Consecutive `data:` lines are joined with `\n`; a blank line ends the
/// event. Other fields (`event:`, `id:`, `retry:`) and comments are ignored.
#[derive(Default)]
pub struct SseEventBuffer {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseEventBuffer {
    /// Feed a chunk; returns the payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = self.buffer[search_index..].iter().position(|b| *b == b'\n')
        {
            let newline_index = search_index + relative_pos;
            let line = String::from_utf8_lossy(&self.buffer[search_index..newline_index]).into_owned();
            self.process_line(&line, &mut events);
            search_index = newline_index + 1;
        }

        if search_index > 0 {
            self.buffer.drain(..search_index);
        }
        events
    }

    /// Flush a trailing line and any event left unterminated by the stream.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            self.process_line(&line, &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<String>) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            self.dispatch(events);
        } else if let Some(value) = sse_data_payload(line) {
            self.data.push(value.to_string());
        }
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

/// Value of a `data:` field, minus the single optional leading space.
pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:")
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
}

/// Read an event stream until the response for `request_id` arrives.
///
/// Server-initiated requests, notifications and payloads that are not
/// JSON-RPC messages are skipped.
pub async fn next_sse_response(
    response: reqwest::Response,
    request_id: u64,
) -> Result<JsonRpcMessage, TransportError> {
    let mut stream = response.bytes_stream();
    let mut buffer = SseEventBuffer::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransportError::Http(e.to_string()))?;
        if let Some(message) = find_response(buffer.push(&chunk), request_id) {
            return Ok(message);
        }
    }

    find_response(buffer.finish(), request_id).ok_or_else(|| {
        TransportError::Protocol("Event stream ended without a response".to_string())
    })
}

fn find_response(payloads: Vec<String>, request_id: u64) -> Option<JsonRpcMessage> {
    payloads
        .into_iter()
        .find_map(|payload| match_response(&payload, request_id))
}

fn match_response(payload: &str, request_id: u64) -> Option<JsonRpcMessage> {
    if payload.trim().is_empty() {
        return None;
    }

    let message: JsonRpcMessage = match serde_json::from_str(payload) {
        Ok(message) => message,
        Err(e) => {
            debug!(request_id, error = %e, "Skipping non JSON-RPC event-stream payload");
            return None;
        }
    };
    if message.response_id() == Some(request_id) {
        Some(message)
    } else {
        debug!(request_id, "Skipping unrelated event-stream message");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_handles_partial_lines() {
        let mut buffer = SseEventBuffer::default();
        assert!(buffer.push(b"data: one").is_empty());
        assert!(buffer.push(b"\r\n").is_empty());
        assert_eq!(buffer.push(b"\r\n"), vec!["one"]);
        assert!(buffer.finish().is_empty());
    }

    #[test]
    fn test_buffer_joins_multi_line_data() {
        let mut buffer = SseEventBuffer::default();
        let events = buffer.push(b"event: message\nid: 7\ndata: {\"a\":\ndata: 1}\n\n: ping\n\n");
        assert_eq!(events, vec!["{\"a\":\n1}"]);
    }

    #[test]
    fn test_buffer_flushes_unterminated_event() {
        let mut buffer = SseEventBuffer::default();
        assert!(buffer.push(b"data: tail").is_empty());
        assert_eq!(buffer.finish(), vec!["tail"]);
    }

    #[test]
    fn test_detects_event_stream_content_type() {
        assert!(is_event_stream_content_type("text/event-stream; charset=utf-8"));
        assert!(!is_event_stream_content_type("application/json"));
    }

    #[test]
    fn test_extracts_payload() {
        assert_eq!(sse_data_payload("data: {\"id\":1}"), Some("{\"id\":1}"));
        assert_eq!(sse_data_payload("data:x"), Some("x"));
        assert_eq!(sse_data_payload("event: message"), None);
    }

    #[test]
    fn test_match_response_skips_notifications() {
        let notification = r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#;
        assert!(match_response(notification, 3).is_none());

        let other = r#"{"jsonrpc":"2.0","id":2,"result":{}}"#;
        assert!(match_response(other, 3).is_none());

        let ours = r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        assert!(match_response(ours, 3).is_some());
    }

    #[test]
    fn test_unparseable_payloads_are_skipped() {
        let payloads = vec![
            "keep-alive".to_string(),
            r#"{"progress": 50"#.to_string(),
            r#"{"jsonrpc":"2.0","id":4,"result":{}}"#.to_string(),
        ];
        assert!(find_response(payloads, 4).is_some());
        assert!(find_response(vec!["not json".to_string()], 4).is_none());
    }
}
