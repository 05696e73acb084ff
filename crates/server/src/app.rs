//! HTTP application: MCP streamable HTTP at `/mcp` plus `/health`.

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handler::OntoPortalServer;
use crate::overrides::SessionOverrides;
use crate::session_manager::OverrideSessionManager;
use axum::Json;
use axum::Router;
use axum::routing::get;
use ontoportal_http_tools::backend::BackendClient;
use ontoportal_openapi_tools::config::OpenApiSourceConfig;
use ontoportal_openapi_tools::runtime::OpenApiToolSource;
use rmcp::ServiceExt as _;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::net::TcpListener;

const IN_PROCESS_BUFFER: usize = 64 * 1024;

/// Load the spec and derive tools, sharing one backend client.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the spec cannot be loaded.
pub fn load_tools(
    openapi: &OpenApiSourceConfig,
    call_timeout: Option<Duration>,
) -> Result<OpenApiToolSource> {
    let client = BackendClient::new(call_timeout)?;
    Ok(OpenApiToolSource::load(openapi, client)?)
}

#[must_use]
pub fn build_router(tools: OpenApiToolSource, overrides: Arc<SessionOverrides>) -> Router {
    let handler = OntoPortalServer::new(tools, Arc::clone(&overrides));
    let factory = move || Ok(handler.clone());
    let mcp_service = StreamableHttpService::new(
        factory,
        Arc::new(OverrideSessionManager::new(overrides)),
        StreamableHttpServerConfig::default(),
    );

    Router::new()
        .route("/health", get(health).post(health))
        .nest_service("/mcp", mcp_service)
}

/// Connector for an in-process client: each call serves a fresh MCP session over an in-memory
/// pipe and returns the client end. In-process sessions use the default backend target.
pub fn in_process_connector(
    tools: OpenApiToolSource,
    overrides: Arc<SessionOverrides>,
) -> impl Fn() -> DuplexStream + Send + Sync + 'static {
    let handler = OntoPortalServer::new(tools, overrides);
    move || {
        let (client_end, server_end) = tokio::io::duplex(IN_PROCESS_BUFFER);
        let handler = handler.clone();
        tokio::spawn(async move {
            match handler.serve(server_end).await {
                Ok(running) => {
                    let _ = running.waiting().await;
                }
                Err(e) => tracing::warn!(error = %e, "in-process MCP session failed to start"),
            }
        });
        client_end
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Load tools, bind, and serve until Ctrl-C / SIGTERM.
///
/// # Errors
///
/// Returns an error if the spec cannot be loaded, the address cannot be bound, or serving fails.
pub async fn run(config: ServerConfig) -> Result<()> {
    let tools = load_tools(&config.openapi, config.call_timeout)?;
    let overrides = Arc::new(SessionOverrides::new(config.defaults.clone()));
    let router = build_router(tools.clone(), overrides);

    let bind = config.bind_addr();
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|e| ServerError::Startup(format!("failed to bind {bind}: {e}")))?;

    tracing::info!(
        addr = %bind,
        spec = %tools.spec_location(),
        tools = tools.tool_names().len(),
        base_url = %config.defaults.base_url,
        "OntoPortal MCP server listening (streamable HTTP at /mcp)"
    );

    serve(listener, router, shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
