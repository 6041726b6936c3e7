//! Streamable HTTP transport.
//!
//! Every JSON-RPC message is POSTed to the server endpoint. Responses come
//! back either as a plain JSON body or as an event stream carrying the
//! response. The `mcp-session-id` header issued by the server is echoed on
//! every later request and used to end the session on close.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use toolgate_core::TransportError;
use tracing::debug;

use super::peer::RpcTransport;
use super::protocol::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest};
use super::sse::{is_event_stream_content_type, next_sse_response};

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Transport over a streamable HTTP endpoint.
pub struct StreamableHttpTransport {
    server_id: String,
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    session_id: RwLock<Option<String>>,
    protocol_version: RwLock<Option<String>>,
    next_id: AtomicU64,
}

impl StreamableHttpTransport {
    /// Build the HTTP client; no request is sent until the handshake.
    pub fn new(
        server_id: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            server_id: server_id.to_string(),
            client,
            url: url.to_string(),
            headers: build_header_map(headers)?,
            session_id: RwLock::new(None),
            protocol_version: RwLock::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|guard| guard.clone())
    }

    fn apply_session_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(version) = self.protocol_version.read().ok().and_then(|g| g.clone()) {
            request = request.header(PROTOCOL_VERSION_HEADER, version);
        }
        if let Some(session_id) = self.session_id() {
            request = request.header(SESSION_HEADER, session_id);
        }
        request
    }

    async fn post(&self, body: String) -> Result<reqwest::Response, TransportError> {
        let request = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .body(body);

        let response = self
            .apply_session_headers(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            if let Ok(mut guard) = self.session_id.write() {
                *guard = Some(session_id.to_string());
            }
        }

        Ok(response)
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(error.to_string())
    }
}

fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::Http(format!("Invalid header name '{name}'")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::Http(format!("Invalid value for header '{name}'")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl RpcTransport for StreamableHttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        debug!(server_id = %self.server_id, url = %self.url, method, id, "Sending MCP HTTP request");

        let response = self.post(body).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        let message = if is_event_stream_content_type(&content_type) {
            next_sse_response(response, id).await?
        } else {
            let body = response.bytes().await.map_err(map_reqwest_error)?;
            serde_json::from_slice::<JsonRpcMessage>(&body)?
        };
        message.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        let body = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.post(body).await?;
        Ok(())
    }

    fn set_protocol_version(&self, version: &str) {
        if let Ok(mut guard) = self.protocol_version.write() {
            *guard = Some(version.to_string());
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };

        let response = self
            .client
            .delete(&self.url)
            .headers(self.headers.clone())
            .header(SESSION_HEADER, session_id)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        // 405 means the server does not support explicit session termination.
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            if let Ok(mut guard) = self.session_id.write() {
                *guard = None;
            }
            Ok(())
        } else {
            Err(TransportError::Http(format!("Session close failed: {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_header_map() {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        let map = build_header_map(&headers).unwrap();
        assert_eq!(map.get("authorization").unwrap().to_str().unwrap(), "Bearer abc");
    }

    #[test]
    fn test_build_header_map_rejects_invalid_name() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            build_header_map(&headers),
            Err(TransportError::Http(msg)) if msg.contains("bad header")
        ));
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let transport = StreamableHttpTransport::new(
            "remote",
            "http://127.0.0.1:9/mcp",
            &BTreeMap::new(),
            Duration::from_millis(100),
            Duration::from_millis(100),
        )
        .unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let transport = StreamableHttpTransport::new(
            "remote",
            "http://127.0.0.1:9/mcp",
            &BTreeMap::new(),
            Duration::from_millis(200),
            Duration::from_millis(500),
        )
        .unwrap();
        let result = transport.request("initialize", None).await;
        assert!(matches!(
            result,
            Err(TransportError::Http(_) | TransportError::Timeout)
        ));
    }
}
