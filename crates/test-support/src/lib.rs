//! Helpers shared by the OntoPortal MCP integration tests.

use anyhow::Context as _;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::net::TcpListener;
use std::process::Child;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// API key the mock backend rejects with `401`.
pub const REJECTED_API_KEY: &str = "bad-key";

/// Child process killed when the guard goes out of scope.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Pick a free localhost port. The port is not reserved.
///
/// # Errors
///
/// Returns an error if an ephemeral port cannot be bound.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll `url` with GET until it answers 2xx/3xx.
///
/// # Errors
///
/// Returns an error if `timeout_dur` elapses first.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                return Ok(());
            }
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
}

struct MockState {
    name: String,
    authorizations: Mutex<Vec<String>>,
}

/// In-process stand-in for the OntoPortal REST API.
///
/// Routes: `GET /search?q=`, `GET /ontologies`, `GET /ontologies/{acronym}` and
/// `GET /status/{code}`. Every JSON reply carries `"backend": <name>` so tests can tell mocks
/// apart. The `Authorization` header of each request is recorded.
pub struct MockOntoPortal {
    base_url: String,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockOntoPortal {
    /// Start a mock named `"primary"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_named("primary").await
    }

    /// Start a mock on an ephemeral localhost port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start_named(name: &str) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            name: name.to_string(),
            authorizations: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/search", get(search))
            .route("/ontologies", get(list_ontologies))
            .route("/ontologies/{acronym}", get(get_ontology))
            .route("/status/{code}", get(status))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind mock OntoPortal")?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            task,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `Authorization` headers received so far, in arrival order (empty string if absent).
    #[must_use]
    pub fn authorizations(&self) -> Vec<String> {
        self.state.authorizations.lock().clone()
    }

    #[must_use]
    pub fn last_authorization(&self) -> Option<String> {
        self.state.authorizations.lock().last().cloned()
    }
}

impl Drop for MockOntoPortal {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Record the caller's credentials; `Err` carries the 401 reply for a rejected key.
fn authorize(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().push(auth.clone());

    let Some(key) = auth.strip_prefix("apikey token=") else {
        return Err(unauthorized());
    };
    if key.is_empty() || key == REJECTED_API_KEY {
        return Err(unauthorized());
    }
    Ok(())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(json!({
            "errors": ["You must provide a valid API Key."],
            "status": 401
        })),
    )
        .into_response()
}

async fn search(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let Some(q) = params.get("q").filter(|q| !q.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"errors": ["The search query must be provided via /search?q=<query>"]})),
        )
            .into_response();
    };

    axum::Json(json!({
        "backend": state.name,
        "page": 1,
        "pageCount": 1,
        "totalCount": 2,
        "collection": [
            {
                "prefLabel": q,
                "@id": format!("http://purl.example.org/obo/TERM_{}", q.to_uppercase()),
            },
            {
                "prefLabel": format!("{q} disease"),
                "@id": "http://purl.example.org/obo/TERM_0002",
            }
        ]
    }))
    .into_response()
}

async fn list_ontologies(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    axum::Json(json!([
        {"acronym": "GO", "name": "Gene Ontology"},
        {"acronym": "NCIT", "name": "National Cancer Institute Thesaurus"}
    ]))
    .into_response()
}

async fn get_ontology(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(acronym): Path<String>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if acronym != "GO" && acronym != "NCIT" {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(json!({"errors": [format!("Ontology {acronym} not found")]})),
        )
            .into_response();
    }
    axum::Json(json!({
        "backend": state.name,
        "acronym": acronym,
        "@id": format!("http://data.example.org/ontologies/{acronym}"),
    }))
    .into_response()
}

async fn status(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(code): Path<u16>,
) -> Response {
    state.authorizations.lock().push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    );
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, format!("status {code}")).into_response()
}
