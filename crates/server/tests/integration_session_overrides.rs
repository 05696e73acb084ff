mod common;

use anyhow::Context as _;
use common::{DEFAULT_KEY, MockOntoPortal, TestServer, args};
use ontoportal_mcp_client::{CallOptions, result_text};
use ontoportal_test_support::REJECTED_API_KEY;
use serde_json::json;

fn search() -> Option<serde_json::Map<String, serde_json::Value>> {
    args(json!({"q": "heart"}))
}

#[tokio::test]
async fn api_key_aliases_override_the_default_key() -> anyhow::Result<()> {
    let backend = MockOntoPortal::start().await?;
    let server = TestServer::start(backend.base_url()).await?;

    for alias in ["api_key", "apikey", "token"] {
        let key = format!("session-key-{alias}");
        let client = server.connect(&format!("{alias}={key}")).await?;
        client.call_tool("searchTerms", search(), CallOptions::default()).await?;
        assert_eq!(
            backend.last_authorization(),
            Some(format!("apikey token={key}")),
            "alias {alias}"
        );
    }

    let plain = server.connect("").await?;
    plain.call_tool("searchTerms", search(), CallOptions::default()).await?;
    assert_eq!(
        backend.last_authorization(),
        Some(format!("apikey token={DEFAULT_KEY}"))
    );
    Ok(())
}

#[tokio::test]
async fn base_url_override_routes_to_another_backend() -> anyhow::Result<()> {
    let primary = MockOntoPortal::start_named("primary").await?;
    let secondary = MockOntoPortal::start_named("secondary").await?;
    let server = TestServer::start(primary.base_url()).await?;

    let redirected = server
        .connect(&format!("rest_url={}", secondary.base_url()))
        .await?;
    let plain = server.connect("").await?;

    let r = redirected
        .call_tool("searchTerms", search(), CallOptions::default())
        .await?;
    let p = plain
        .call_tool("searchTerms", search(), CallOptions::default())
        .await?;

    assert_eq!(r.structured_content.context("redirected")?["backend"], "secondary");
    assert_eq!(p.structured_content.context("plain")?["backend"], "primary");
    assert_eq!(secondary.authorizations().len(), 1);
    assert_eq!(primary.authorizations().len(), 1);
    Ok(())
}

#[tokio::test]
async fn rejected_session_key_is_reported_in_the_tool_result() -> anyhow::Result<()> {
    let backend = MockOntoPortal::start().await?;
    let server = TestServer::start(backend.base_url()).await?;
    let client = server.connect(&format!("apikey={REJECTED_API_KEY}")).await?;

    let result = client
        .call_tool("searchTerms", search(), CallOptions::non_raising())
        .await?;
    assert_eq!(result.is_error, Some(true));
    let text = result_text(&result);
    assert!(text.contains("401"), "{text}");
    assert!(text.contains("authentication"), "{text}");
    Ok(())
}

#[tokio::test]
async fn schemeless_base_url_override_is_a_config_error() -> anyhow::Result<()> {
    let backend = MockOntoPortal::start().await?;
    let server = TestServer::start(backend.base_url()).await?;
    let client = server.connect("base_url=data.example.org").await?;

    let result = client
        .call_tool("searchTerms", search(), CallOptions::non_raising())
        .await?;
    assert_eq!(result.is_error, Some(true));
    assert!(result_text(&result).contains("lacks scheme"), "{}", result_text(&result));
    assert!(backend.authorizations().is_empty());
    Ok(())
}

#[tokio::test]
async fn overrides_are_forgotten_when_the_session_closes() -> anyhow::Result<()> {
    let backend = MockOntoPortal::start().await?;
    let server = TestServer::start(backend.base_url()).await?;

    let mut client = server.connect("apikey=temporary").await?;
    assert_eq!(server.overrides.len(), 1);

    client.disconnect().await;
    assert!(server.overrides.is_empty());
    Ok(())
}
