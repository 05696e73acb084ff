//! MCP `ServerHandler` exposing the generated `OpenAPI` tools.

use crate::overrides::SessionOverrides;
use axum::http::request::Parts;
use ontoportal_http_tools::backend::BackendTarget;
use ontoportal_openapi_tools::error::OpenApiToolsError;
use ontoportal_openapi_tools::runtime::OpenApiToolSource;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use std::sync::Arc;

pub const SERVER_NAME: &str = "OntoPortal MCP Server";

/// Session id header set by the streamable HTTP transport after `initialize`.
const SESSION_ID_HEADER: &str = "mcp-session-id";

/// One instance per MCP session (cheap to clone: tool definitions and overrides are shared).
#[derive(Clone)]
pub struct OntoPortalServer {
    tools: OpenApiToolSource,
    overrides: Arc<SessionOverrides>,
}

impl OntoPortalServer {
    #[must_use]
    pub fn new(tools: OpenApiToolSource, overrides: Arc<SessionOverrides>) -> Self {
        Self { tools, overrides }
    }

    fn target_for(&self, context: &RequestContext<RoleServer>) -> BackendTarget {
        let session_id = context
            .extensions
            .get::<Parts>()
            .and_then(|parts| parts.headers.get(SESSION_ID_HEADER))
            .and_then(|v| v.to_str().ok());
        self.overrides.target_for(session_id)
    }
}

impl ServerHandler for OntoPortalServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "Tools for the {} REST API. Connect with ?apikey=<key> and/or ?base_url=<url> \
                 to use your own credentials or another OntoPortal instance.",
                self.tools.spec_title()
            )),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools.list_tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let target = self.target_for(&context);
        let name: &str = &request.name;

        match self.tools.call_tool(name, request.arguments, &target).await {
            Ok(result) => Ok(result),
            Err(OpenApiToolsError::UnknownTool(tool)) => Err(ErrorData::invalid_params(
                format!("Unknown tool: {tool}"),
                None,
            )),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}
