//! Where the client connects: a streamable HTTP endpoint or an in-process server.

use crate::error::{ClientError, Result};
use futures::StreamExt as _;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::common::http_header::{EVENT_STREAM_MIME_TYPE, HEADER_SESSION_ID, JSON_MIME_TYPE};
use rmcp::transport::streamable_http_client::{
    SseError, StreamableHttpClient, StreamableHttpClientTransportConfig, StreamableHttpError,
    StreamableHttpPostResponse,
};
use std::fmt;
use std::sync::Arc;
use tokio::io::DuplexStream;
use url::Url;

/// Opens one end of an in-memory pipe whose other end is served by an MCP server.
///
/// Called once per `connect()`, so a client can reconnect after `disconnect()`.
pub type InProcessConnector = Arc<dyn Fn() -> DuplexStream + Send + Sync>;

#[derive(Clone)]
pub enum TransportTarget {
    /// MCP endpoint, e.g. `http://127.0.0.1:8000/mcp?apikey=...`.
    Url(String),
    InProcess(InProcessConnector),
}

impl fmt::Debug for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::InProcess(_) => f.write_str("InProcess"),
        }
    }
}

/// Where and how to connect. Turned into a transport on every `connect()`.
#[derive(Debug, Clone)]
pub struct TransportSpec {
    pub target: TransportTarget,
    /// Optional bearer token sent on every HTTP request.
    pub token: Option<String>,
}

impl TransportSpec {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            target: TransportTarget::Url(url.into()),
            token: None,
        }
    }

    #[must_use]
    pub fn in_process(connect: impl Fn() -> DuplexStream + Send + Sync + 'static) -> Self {
        Self {
            target: TransportTarget::InProcess(Arc::new(connect)),
            token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Human-readable target for logs and diagnostics.
    #[must_use]
    pub fn describe(&self) -> &str {
        match &self.target {
            TransportTarget::Url(url) => url,
            TransportTarget::InProcess(_) => "in-process",
        }
    }
}

/// Streamable HTTP client that reports failing statuses as `reqwest` errors carrying the status.
///
/// rmcp's stock `reqwest::Client` implementation turns a bare `401` into an "unexpected content
/// type" error, which loses the status the client needs for [`ClientError::from_status`].
#[derive(Clone)]
pub(crate) struct StatusCheckedHttp {
    http: reqwest::Client,
}

impl StreamableHttpClient for StatusCheckedHttp {
    type Error = reqwest::Error;

    async fn post_message(
        &self,
        uri: Arc<str>,
        message: ClientJsonRpcMessage,
        session_id: Option<Arc<str>>,
        auth_header: Option<String>,
    ) -> std::result::Result<StreamableHttpPostResponse, StreamableHttpError<Self::Error>> {
        let mut req = self
            .http
            .post(uri.as_ref())
            .header(ACCEPT, format!("{JSON_MIME_TYPE}, {EVENT_STREAM_MIME_TYPE}"))
            .json(&message);
        if let Some(token) = auth_header {
            req = req.bearer_auth(token);
        }
        if let Some(sid) = session_id {
            req = req.header(HEADER_SESSION_ID, sid.as_ref());
        }

        let resp = req.send().await?;
        if matches!(resp.status(), StatusCode::ACCEPTED | StatusCode::NO_CONTENT) {
            return Ok(StreamableHttpPostResponse::Accepted);
        }
        let resp = resp.error_for_status()?;

        let session_id = resp
            .headers()
            .get(HEADER_SESSION_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match content_type(resp.headers()).as_deref() {
            Some(ct) if ct.eq_ignore_ascii_case(EVENT_STREAM_MIME_TYPE) => {
                let stream: BoxStream<'static, std::result::Result<sse_stream::Sse, SseError>> =
                    sse_stream::SseStream::from_byte_stream(resp.bytes_stream()).boxed();
                Ok(StreamableHttpPostResponse::Sse(stream, session_id))
            }
            Some(ct) if ct.eq_ignore_ascii_case(JSON_MIME_TYPE) => {
                let msg: ServerJsonRpcMessage = resp.json().await?;
                Ok(StreamableHttpPostResponse::Json(msg, session_id))
            }
            other => Err(StreamableHttpError::UnexpectedContentType(
                other.map(str::to_string),
            )),
        }
    }

    async fn delete_session(
        &self,
        uri: Arc<str>,
        session_id: Arc<str>,
        auth_header: Option<String>,
    ) -> std::result::Result<(), StreamableHttpError<Self::Error>> {
        StreamableHttpClient::delete_session(&self.http, uri, session_id, auth_header).await
    }

    async fn get_stream(
        &self,
        uri: Arc<str>,
        session_id: Arc<str>,
        last_event_id: Option<String>,
        auth_header: Option<String>,
    ) -> std::result::Result<
        BoxStream<'static, std::result::Result<sse_stream::Sse, SseError>>,
        StreamableHttpError<Self::Error>,
    > {
        StreamableHttpClient::get_stream(&self.http, uri, session_id, last_event_id, auth_header)
            .await
    }
}

/// A validated [`TransportSpec`]: built once per client on the first `connect()` and reused.
pub(crate) enum Materialized {
    Http {
        http: StatusCheckedHttp,
        config: StreamableHttpClientTransportConfig,
    },
    InProcess(InProcessConnector),
}

impl Materialized {
    /// rmcp transport for one HTTP session.
    pub(crate) fn http_session(
        http: &StatusCheckedHttp,
        config: &StreamableHttpClientTransportConfig,
    ) -> StreamableHttpClientTransport<StatusCheckedHttp> {
        StreamableHttpClientTransport::with_client(http.clone(), config.clone())
    }
}

impl TransportSpec {
    /// Validate the endpoint and token and build the HTTP client.
    pub(crate) fn materialize(&self) -> Result<Materialized> {
        let url = match &self.target {
            TransportTarget::InProcess(connect) => {
                return Ok(Materialized::InProcess(Arc::clone(connect)));
            }
            TransportTarget::Url(url) => url,
        };
        let parsed = Url::parse(url)
            .map_err(|e| ClientError::Config(format!("invalid MCP URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "MCP URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if let Some(token) = &self.token {
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ClientError::Config("token is not a valid header value".into()))?;
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("ontoportal-mcp-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        let mut config = StreamableHttpClientTransportConfig::with_uri(url.as_str());
        config.auth_header.clone_from(&self.token);
        Ok(Materialized::Http {
            http: StatusCheckedHttp { http },
            config,
        })
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(';').next().unwrap_or(s).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_urls_without_http_scheme() {
        assert!(matches!(
            TransportSpec::new("localhost:8000/mcp").materialize(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            TransportSpec::new("ftp://host/mcp").materialize(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            TransportSpec::new("http://127.0.0.1:1/mcp").materialize(),
            Ok(Materialized::Http { .. })
        ));
    }

    #[test]
    fn token_becomes_the_auth_header() {
        let spec = TransportSpec::new("http://h/mcp").with_token(Some(String::new()));
        assert!(spec.token.is_none());

        let spec = TransportSpec::new("http://h/mcp").with_token(Some("jwt".into()));
        match spec.materialize() {
            Ok(Materialized::Http { config, .. }) => {
                assert_eq!(config.auth_header.as_deref(), Some("jwt"));
                assert_eq!(&*config.uri, "http://h/mcp");
            }
            _ => panic!("expected an HTTP transport"),
        }

        let spec = TransportSpec::new("http://h/mcp").with_token(Some("bad\ntoken".into()));
        assert!(matches!(spec.materialize(), Err(ClientError::Config(_))));
    }

    #[test]
    fn in_process_target_needs_no_validation() {
        let spec = TransportSpec::in_process(|| tokio::io::duplex(64).0);
        assert_eq!(spec.describe(), "in-process");
        assert_eq!(format!("{:?}", spec.target), "InProcess");
        assert!(matches!(spec.materialize(), Ok(Materialized::InProcess(_))));
        assert_eq!(TransportSpec::new("http://h/mcp").describe(), "http://h/mcp");
    }

    #[test]
    fn content_type_drops_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream; charset=utf-8"),
        );
        assert_eq!(content_type(&headers).as_deref(), Some("text/event-stream"));
    }
}
