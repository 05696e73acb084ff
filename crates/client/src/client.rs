//! High-level MCP client for the OntoPortal MCP server.

use crate::error::{ClientError, Result};
use crate::transport::{Materialized, TransportSpec};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
    InitializeResult, JsonObject, ProtocolVersion, Tool,
};
use rmcp::service::RunningService;
use rmcp::{RoleClient, ServiceError, ServiceExt as _};
use std::future::Future;
use std::time::Duration;

const CLIENT_NAME: &str = "ontoportal-mcp-client";

/// Per-call options for [`OntoPortalMcpClient::call_tool`].
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    /// Overrides the client's default timeout for this call.
    pub timeout: Option<Duration>,
    /// Turn an `is_error` result into [`ClientError::Tool`].
    pub raise_on_error: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            raise_on_error: true,
        }
    }
}

impl CallOptions {
    #[must_use]
    pub fn non_raising() -> Self {
        Self {
            raise_on_error: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Connection to one MCP server, over streamable HTTP or in process.
///
/// `connect()` and `disconnect()` are idempotent. The transport spec is materialized on the
/// first `connect()` and reused; each connection runs its own MCP session on top of it.
pub struct OntoPortalMcpClient {
    spec: TransportSpec,
    timeout: Option<Duration>,
    transport: Option<Materialized>,
    service: Option<RunningService<RoleClient, ClientInfo>>,
}

impl OntoPortalMcpClient {
    #[must_use]
    pub fn new(spec: TransportSpec) -> Self {
        Self {
            spec,
            timeout: None,
            transport: None,
            service: None,
        }
    }

    /// Default timeout for `list_tools` and `call_tool`; `CallOptions::timeout` takes precedence.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn target(&self) -> &str {
        self.spec.describe()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.service.is_some()
    }

    /// Server info from the `initialize` reply, while connected.
    #[must_use]
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.service.as_ref().and_then(|s| s.peer_info())
    }

    /// Open an MCP session (`initialize` + `notifications/initialized`).
    ///
    /// # Errors
    ///
    /// - [`ClientError::Config`] if the URL or token is unusable
    /// - [`ClientError::Authentication`] on HTTP 401/403
    /// - [`ClientError::Client`] on any other failure
    pub async fn connect(&mut self) -> Result<()> {
        if self.service.is_some() {
            return Ok(());
        }

        if self.transport.is_none() {
            self.transport = Some(self.spec.materialize()?);
        }
        let Some(transport) = self.transport.as_ref() else {
            return Err(ClientError::Client("transport unavailable".into()));
        };

        let info = client_info();
        let service = match transport {
            Materialized::Http { http, config } => {
                info.serve(Materialized::http_session(http, config)).await
            }
            Materialized::InProcess(connect) => info.serve(connect()).await,
        }
        .map_err(ClientError::from_initialize)?;

        if let Some(server) = service.peer_info() {
            tracing::info!(
                target_url = %self.spec.describe(),
                server = %server.server_info.name,
                "connected to MCP server"
            );
        }
        self.service = Some(service);
        Ok(())
    }

    /// Close the session (best effort) and return to the disconnected state.
    pub async fn disconnect(&mut self) {
        let Some(service) = self.service.take() else {
            return;
        };
        if let Err(e) = service.cancel().await {
            tracing::warn!(error = %e, "failed to close MCP session");
        }
        tracing::debug!("disconnected from MCP server");
    }

    /// All tools, following pagination cursors.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] before `connect()`; otherwise as for `connect()`.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let service = self.service.as_ref().ok_or(ClientError::NotConnected)?;
        with_deadline(self.timeout, "tools/list", service.list_all_tools())
            .await?
            .map_err(|e| match e {
                ServiceError::McpError(e) => {
                    ClientError::Client(format!("tools/list failed: {}", e.message))
                }
                other => ClientError::from_service(other),
            })
    }

    /// Call a tool.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] before `connect()`
    /// - [`ClientError::Tool`] on a JSON-RPC error reply, or an `is_error` result when
    ///   `options.raise_on_error` is set
    /// - [`ClientError::Client`] on timeout or transport failure
    /// - [`ClientError::Authentication`] on HTTP 401/403
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        options: CallOptions,
    ) -> Result<CallToolResult> {
        let service = self.service.as_ref().ok_or(ClientError::NotConnected)?;
        let params = CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments,
            task: None,
        };

        let label = format!("tool '{name}'");
        let result = with_deadline(options.timeout.or(self.timeout), &label, service.call_tool(params))
            .await?
            .map_err(|e| match e {
                ServiceError::McpError(e) => ClientError::Tool(format!(
                    "{name}: {} (code {})",
                    e.message, e.code.0
                )),
                other => ClientError::from_service(other),
            })?;

        if options.raise_on_error && result.is_error == Some(true) {
            return Err(ClientError::Tool(format!("{name}: {}", result_text(&result))));
        }
        Ok(result)
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: ProtocolVersion::LATEST,
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: CLIENT_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        },
    }
}

async fn with_deadline<T>(
    timeout: Option<Duration>,
    what: &str,
    fut: impl Future<Output = T>,
) -> Result<T> {
    match timeout {
        Some(t) => tokio::time::timeout(t, fut).await.map_err(|_| {
            ClientError::Client(format!("{what} timed out after {}s", t.as_secs_f64()))
        }),
        None => Ok(fut.await),
    }
}

/// Text content of a tool result joined by newlines.
#[must_use]
pub fn result_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|c| c.as_text().map(|t| t.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_require_connection() {
        let client = OntoPortalMcpClient::new(TransportSpec::new("http://127.0.0.1:9/mcp"));
        assert!(!client.is_connected());
        assert!(client.server_info().is_none());
        assert!(matches!(client.list_tools().await, Err(ClientError::NotConnected)));
        assert!(matches!(
            client.call_tool("searchTerms", None, CallOptions::default()).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_a_no_op() {
        let mut client = OntoPortalMcpClient::new(TransportSpec::new("http://127.0.0.1:9/mcp"));
        client.disconnect().await;
        client.disconnect().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn connect_rejects_schemeless_url() {
        let mut client = OntoPortalMcpClient::new(TransportSpec::new("127.0.0.1:8000/mcp"));
        assert!(matches!(client.connect().await, Err(ClientError::Config(_))));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn deadline_reports_the_operation() {
        let slow = with_deadline(
            Some(Duration::from_millis(10)),
            "tool 'searchTerms'",
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;
        assert!(matches!(slow, Err(ClientError::Client(m)) if m.contains("tool 'searchTerms' timed out")));

        assert_eq!(with_deadline(None, "x", async { 7 }).await.ok(), Some(7));
    }

    #[test]
    fn default_options_raise() {
        assert!(CallOptions::default().raise_on_error);
        assert!(!CallOptions::non_raising().raise_on_error);
        assert_eq!(
            CallOptions::default().with_timeout(Duration::from_secs(2)).timeout,
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn client_announces_itself() {
        let info = client_info();
        assert_eq!(info.client_info.name, CLIENT_NAME);
        assert_eq!(info.protocol_version, ProtocolVersion::LATEST);
    }
}
