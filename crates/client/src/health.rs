//! Container health probe.

use crate::error::{ClientError, Result};
use ontoportal_env::optional_env;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;

pub const DEFAULT_HEALTH_PORT: &str = "8083";
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// `HEALTHCHECK_URL`, else `http://localhost:{MCP_PORT}/health`.
#[must_use]
pub fn default_health_url() -> String {
    health_url_from(optional_env("HEALTHCHECK_URL"), optional_env("MCP_PORT"))
}

#[must_use]
pub fn health_url_from(url: Option<String>, port: Option<String>) -> String {
    url.unwrap_or_else(|| {
        format!(
            "http://localhost:{}/health",
            port.as_deref().unwrap_or(DEFAULT_HEALTH_PORT)
        )
    })
}

/// POST `{}` to `url`; healthy iff the reply is 200 or 202 within `timeout`.
///
/// # Errors
///
/// Returns [`ClientError::Client`] describing the failure (unreachable, timeout, or status).
pub async fn check(url: &str, timeout: Duration) -> Result<StatusCode> {
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
    let resp = http
        .post(url)
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json")
        .body("{}")
        .send()
        .await
        .map_err(|e| ClientError::Client(format!("health request to {url} failed: {e}")))?;

    let status = resp.status();
    if matches!(status, StatusCode::OK | StatusCode::ACCEPTED) {
        Ok(status)
    } else {
        Err(ClientError::Client(format!("unhealthy: HTTP {}", status.as_u16())))
    }
}

/// Boolean form of [`check`], logging the failure reason.
pub async fn probe(url: &str, timeout: Duration) -> bool {
    match check(url, timeout).await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "health probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::post;
    use tokio::net::TcpListener;

    async fn spawn(status: u16) -> String {
        let app = Router::new().route(
            "/health",
            post(move || async move { StatusCode::from_u16(status).unwrap() }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/health")
    }

    #[test]
    fn url_defaults() {
        assert_eq!(health_url_from(None, None), "http://localhost:8083/health");
        assert_eq!(health_url_from(None, Some("9000".into())), "http://localhost:9000/health");
        assert_eq!(
            health_url_from(Some("http://x/health".into()), Some("9000".into())),
            "http://x/health"
        );
    }

    #[tokio::test]
    async fn accepts_200_and_202_only() {
        assert!(probe(&spawn(200).await, HEALTH_TIMEOUT).await);
        assert!(probe(&spawn(202).await, HEALTH_TIMEOUT).await);
        assert!(!probe(&spawn(204).await, HEALTH_TIMEOUT).await);
        assert!(!probe(&spawn(503).await, HEALTH_TIMEOUT).await);
    }

    #[tokio::test]
    async fn unreachable_is_unhealthy() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(!probe(&format!("http://127.0.0.1:{port}/health"), Duration::from_secs(2)).await);
    }
}
