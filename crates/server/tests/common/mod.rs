#![allow(dead_code)]

use anyhow::Context as _;
use ontoportal_http_tools::backend::BackendTarget;
use ontoportal_mcp_client::{OntoPortalMcpClient, TransportSpec};
use ontoportal_mcp_server::app;
use ontoportal_mcp_server::overrides::SessionOverrides;
use ontoportal_openapi_tools::config::OpenApiSourceConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[allow(unused_imports)]
pub use ontoportal_test_support::{KillOnDrop, MockOntoPortal, pick_unused_port, wait_http_ok};

pub const DEFAULT_KEY: &str = "default-key";

pub fn spec_path() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../openapi-small.yaml").to_string()
}

/// In-process server bound to an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub overrides: Arc<SessionOverrides>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(backend_base_url: &str) -> anyhow::Result<Self> {
        let openapi = OpenApiSourceConfig {
            spec: spec_path(),
            ..OpenApiSourceConfig::default()
        };
        let tools = app::load_tools(&openapi, Some(Duration::from_secs(10))).context("load tools")?;
        let overrides = Arc::new(SessionOverrides::new(BackendTarget::new(
            DEFAULT_KEY,
            backend_base_url,
        )));
        let router = app::build_router(tools, Arc::clone(&overrides));

        let listener = TcpListener::bind("127.0.0.1:0").await.context("bind server")?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(app::serve(listener, router, async move {
            let _ = rx.await;
        }));

        Ok(Self {
            base_url: format!("http://{addr}"),
            overrides,
            shutdown: Some(tx),
        })
    }

    pub fn mcp_url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("{}/mcp", self.base_url)
        } else {
            format!("{}/mcp?{query}", self.base_url)
        }
    }

    pub async fn connect(&self, query: &str) -> anyhow::Result<OntoPortalMcpClient> {
        let mut client = OntoPortalMcpClient::new(TransportSpec::new(self.mcp_url(query)));
        client.connect().await.context("connect")?;
        Ok(client)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn args(v: serde_json::Value) -> Option<serde_json::Map<String, serde_json::Value>> {
    v.as_object().cloned()
}
