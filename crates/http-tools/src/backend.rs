//! Context-aware client for the OntoPortal REST backend.

use crate::error::{HttpToolsError, Result};
use crate::safety::{redact_url, sanitize_reqwest_error};
use mime::Mime;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Upper bound on a buffered backend response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// The effective credentials and base URL for one backend call.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub api_key: String,
    pub base_url: String,
    /// Whether `api_key` came from a session override rather than the process default.
    pub api_key_overridden: bool,
    /// Whether `base_url` came from a session override rather than the process default.
    pub base_url_overridden: bool,
}

impl BackendTarget {
    /// Target built from the process-wide defaults.
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            api_key_overridden: false,
            base_url_overridden: false,
        }
    }

    /// Layer session overrides on top of this target. Absent or empty overrides keep the
    /// current value.
    #[must_use]
    pub fn with_overrides(&self, api_key: Option<&str>, base_url: Option<&str>) -> Self {
        let api_key = api_key.filter(|v| !v.is_empty());
        let base_url = base_url.filter(|v| !v.is_empty());
        Self {
            api_key: api_key.map_or_else(|| self.api_key.clone(), str::to_string),
            base_url: base_url.map_or_else(|| self.base_url.clone(), str::to_string),
            api_key_overridden: self.api_key_overridden || api_key.is_some(),
            base_url_overridden: self.base_url_overridden || base_url.is_some(),
        }
    }
}

impl fmt::Debug for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendTarget")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("api_key_overridden", &self.api_key_overridden)
            .field("base_url_overridden", &self.base_url_overridden)
            .finish()
    }
}

/// A backend request before the target is applied.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    /// Absolute URL, or a path resolved against the target's base URL.
    pub url: String,
    /// Already percent-encoded query string (without the leading `?`).
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<Value>,
    /// Per-request timeout; falls back to the client default when unset.
    pub timeout: Option<Duration>,
}

impl BackendRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: None,
            headers: Vec::new(),
            json_body: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json_body(mut self, body: Value) -> Self {
        self.json_body = Some(body);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully buffered backend response. Non-2xx statuses are returned as-is.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl BackendResponse {
    /// `application/json` or any `+json` media type.
    #[must_use]
    pub fn is_json(&self) -> bool {
        let Some(ct) = self.content_type.as_deref() else {
            return false;
        };
        let Ok(m) = ct.parse::<Mime>() else {
            return false;
        };
        m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON, regardless of the declared content type.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// `Authorization` header value for an OntoPortal API key.
#[must_use]
pub fn authorization_value(api_key: &str) -> String {
    format!("apikey token={api_key}")
}

/// Resolve a request URL against a base URL.
///
/// Absolute `http(s)` URLs are used unchanged. Anything else is joined onto `base_url`, keeping the
/// base URL's path prefix (`https://host/api` + `/search` → `https://host/api/search`).
///
/// # Errors
///
/// Returns [`HttpToolsError::Config`] if the resolved URL has no scheme (e.g. a base URL of
/// `data.example.org`) or a scheme other than `http`/`https`.
pub fn resolve_url(url: &str, base_url: &str) -> Result<Url> {
    if let Ok(absolute) = Url::parse(url)
        && matches!(absolute.scheme(), "http" | "https")
    {
        return Ok(absolute);
    }

    let mut base = Url::parse(base_url).map_err(|e| {
        HttpToolsError::Config(format!(
            "Resolved target URL lacks scheme: base URL '{base_url}' is not absolute ({e})"
        ))
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(HttpToolsError::Config(format!(
            "Resolved target URL lacks scheme: base URL '{base_url}' has unsupported scheme '{}'",
            base.scheme()
        )));
    }

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);

    base.join(url.trim_start_matches('/')).map_err(|e| {
        HttpToolsError::Config(format!(
            "Failed to join '{url}' onto base URL '{base_url}': {e}"
        ))
    })
}

/// Shared HTTP client for backend calls.
///
/// One instance (and one connection pool) serves every session; the per-call
/// [`BackendTarget`] decides credentials and destination.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    default_timeout: Option<Duration>,
    max_response_bytes: usize,
}

impl BackendClient {
    /// Build a client. `default_timeout` of `None` disables the per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed (TLS backend init).
    pub fn new(default_timeout: Option<Duration>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("ontoportal-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpToolsError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, default_timeout))
    }

    #[must_use]
    pub fn with_client(http: Client, default_timeout: Option<Duration>) -> Self {
        Self {
            http,
            default_timeout,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    #[must_use]
    pub fn max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// Send `request` on behalf of `target`.
    ///
    /// `Authorization` is always `apikey token=<target.api_key>`; a caller-supplied
    /// `Authorization` header is dropped.
    ///
    /// # Errors
    ///
    /// - [`HttpToolsError::Config`] if the URL cannot be resolved against the target, or the key
    ///   is not a valid header value
    /// - [`HttpToolsError::Transport`] on connection failures and timeouts
    /// - [`HttpToolsError::Http`] if the response body exceeds the size limit
    pub async fn send(
        &self,
        request: BackendRequest,
        target: &BackendTarget,
    ) -> Result<BackendResponse> {
        let mut url = match resolve_url(&request.url, &target.base_url) {
            Ok(u) => u,
            Err(e) => {
                tracing::error!(
                    method = %request.method,
                    target = %request.url,
                    base_url = %target.base_url,
                    session_base_override = target.base_url_overridden,
                    error = %e,
                    "backend URL rejected"
                );
                return Err(e);
            }
        };
        if let Some(query) = request.query.as_deref() {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                _ => query.to_string(),
            };
            url.set_query(Some(&merged));
        }

        tracing::info!(
            method = %request.method,
            target = %request.url,
            url = %redact_url(&url),
            session_base_override = target.base_url_overridden,
            session_api_key_override = target.api_key_overridden,
            "backend request start"
        );

        let auth = HeaderValue::from_str(&authorization_value(&target.api_key)).map_err(|_| {
            HttpToolsError::Config("API key contains characters not allowed in a header".into())
        })?;

        let mut builder = self.http.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                tracing::warn!(header = %name, "skipping invalid header name");
                continue;
            };
            if name == AUTHORIZATION {
                continue;
            }
            builder = builder.header(name, value);
        }
        builder = builder.header(AUTHORIZATION, auth);

        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }
        if let Some(t) = request.timeout.or(self.default_timeout) {
            builder = builder.timeout(t);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpToolsError::Transport(sanitize_reqwest_error(&e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = read_body_limited(response, self.max_response_bytes).await?;

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "backend response");

        Ok(BackendResponse {
            status,
            content_type,
            body,
        })
    }
}

async fn read_body_limited(mut response: reqwest::Response, max: usize) -> Result<Vec<u8>> {
    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(HttpToolsError::Http(format!(
            "Response too large: {len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| HttpToolsError::Transport(sanitize_reqwest_error(&e)))?
    {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(HttpToolsError::Http(format!(
                "Response too large: exceeded {max} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}
