mod common;

use anyhow::Context as _;
use common::{DEFAULT_KEY, MockOntoPortal, args, spec_path};
use ontoportal_http_tools::backend::BackendTarget;
use ontoportal_mcp_client::{CallOptions, OntoPortalMcpClient, TransportSpec};
use ontoportal_mcp_server::app;
use ontoportal_mcp_server::overrides::SessionOverrides;
use ontoportal_openapi_tools::config::OpenApiSourceConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn in_process_client(backend: &MockOntoPortal) -> anyhow::Result<OntoPortalMcpClient> {
    let openapi = OpenApiSourceConfig {
        spec: spec_path(),
        ..OpenApiSourceConfig::default()
    };
    let tools = app::load_tools(&openapi, Some(Duration::from_secs(10))).context("load tools")?;
    let overrides = Arc::new(SessionOverrides::new(BackendTarget::new(
        DEFAULT_KEY,
        backend.base_url(),
    )));
    let spec = TransportSpec::in_process(app::in_process_connector(tools, overrides));
    Ok(OntoPortalMcpClient::new(spec).with_timeout(Duration::from_secs(10)))
}

#[tokio::test]
async fn in_process_client_lists_and_calls_tools_without_a_socket() -> anyhow::Result<()> {
    let backend = MockOntoPortal::start().await?;
    let mut client = in_process_client(&backend)?;
    assert_eq!(client.target(), "in-process");

    client.connect().await?;
    assert!(client.is_connected());
    let info = client.server_info().context("server info")?;
    assert_eq!(info.server_info.name, "OntoPortal MCP Server");

    let names: Vec<String> = client
        .list_tools()
        .await?
        .iter()
        .map(|t| t.name.to_string())
        .collect();
    assert!(names.iter().any(|n| n == "searchTerms"), "{names:?}");

    let result = client
        .call_tool("searchTerms", args(json!({"q": "heart"})), CallOptions::default())
        .await?;
    let sc = result.structured_content.context("structured content")?;
    assert_eq!(sc["totalCount"], 2);
    assert_eq!(
        backend.last_authorization(),
        Some(format!("apikey token={DEFAULT_KEY}"))
    );

    client.disconnect().await;
    assert!(!client.is_connected());
    Ok(())
}

#[tokio::test]
async fn in_process_client_reconnects_after_disconnect() -> anyhow::Result<()> {
    let backend = MockOntoPortal::start().await?;
    let mut client = in_process_client(&backend)?;

    client.connect().await?;
    client.disconnect().await;
    client.connect().await?;

    let result = client
        .call_tool("getOntology", args(json!({"acronym": "GO"})), CallOptions::default())
        .await?;
    assert_eq!(result.is_error, Some(false));
    client.disconnect().await;
    Ok(())
}
