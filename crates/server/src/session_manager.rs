//! Session manager wrapper for rmcp's streamable HTTP transport.
//!
//! Sessions are handled by rmcp's `LocalSessionManager`. The wrapper captures backend overrides
//! from the `initialize` request's query string and drops them again when the session closes.

use crate::overrides::{SessionOverride, SessionOverrides};
use axum::http::request::Parts;
use futures::Stream;
use rmcp::model::{ClientJsonRpcMessage, ClientRequest, JsonRpcRequest, ServerJsonRpcMessage};
use rmcp::transport::common::server_side_http::ServerSseMessage;
use rmcp::transport::streamable_http_server::session::SessionId;
use rmcp::transport::streamable_http_server::session::SessionManager;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use std::future::Future;
use std::sync::Arc;

pub struct OverrideSessionManager {
    inner: LocalSessionManager,
    overrides: Arc<SessionOverrides>,
}

impl OverrideSessionManager {
    pub fn new(overrides: Arc<SessionOverrides>) -> Self {
        Self {
            inner: LocalSessionManager::default(),
            overrides,
        }
    }

    /// Record overrides for `id` if `message` is an `initialize` request carrying HTTP parts.
    fn capture_overrides(&self, id: &SessionId, message: &ClientJsonRpcMessage) {
        let ClientJsonRpcMessage::Request(JsonRpcRequest {
            request: ClientRequest::InitializeRequest(init),
            ..
        }) = message
        else {
            return;
        };
        let query = init
            .extensions
            .get::<Parts>()
            .and_then(|parts| parts.uri.query());
        let requested = SessionOverride::from_query(query);
        let target = self.overrides.record(id.as_ref(), &requested);

        if requested.is_empty() {
            tracing::debug!(session = %id, "session uses default backend");
        } else {
            tracing::info!(
                session = %id,
                api_key_override = requested.api_key.is_some(),
                base_url = %target.base_url,
                base_url_override = requested.base_url.is_some(),
                "captured session backend overrides"
            );
        }
    }

    async fn close_session_impl(
        &self,
        id: &SessionId,
    ) -> Result<(), <LocalSessionManager as SessionManager>::Error> {
        let result = self.inner.close_session(id).await;
        if self.overrides.forget(id.as_ref()) {
            tracing::debug!(session = %id, "forgot session backend overrides");
        }
        result
    }
}

impl SessionManager for OverrideSessionManager {
    type Error = <LocalSessionManager as SessionManager>::Error;
    type Transport = <LocalSessionManager as SessionManager>::Transport;

    fn create_session(
        &self,
    ) -> impl Future<Output = Result<(SessionId, Self::Transport), Self::Error>> + Send {
        self.inner.create_session()
    }

    fn initialize_session(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<Output = Result<ServerJsonRpcMessage, Self::Error>> + Send {
        self.capture_overrides(id, &message);
        self.inner.initialize_session(id, message)
    }

    fn has_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        self.inner.has_session(id)
    }

    fn close_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.close_session_impl(id)
    }

    fn create_stream(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.create_stream(id, message)
    }

    fn accept_message(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.inner.accept_message(id, message)
    }

    fn create_standalone_stream(
        &self,
        id: &SessionId,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.create_standalone_stream(id)
    }

    fn resume(
        &self,
        id: &SessionId,
        last_event_id: String,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.resume(id, last_event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontoportal_http_tools::backend::BackendTarget;
    use serde_json::json;

    fn initialize_message(uri: &str) -> ClientJsonRpcMessage {
        let mut message: ClientJsonRpcMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "0" }
            }
        }))
        .unwrap();
        let (parts, ()) = axum::http::Request::builder()
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        if let ClientJsonRpcMessage::Request(JsonRpcRequest {
            request: ClientRequest::InitializeRequest(init),
            ..
        }) = &mut message
        {
            init.extensions.insert(parts);
        }
        message
    }

    #[test]
    fn initialize_query_is_captured_per_session() {
        let store = Arc::new(SessionOverrides::new(BackendTarget::new(
            "default-key",
            "https://default.example",
        )));
        let manager = OverrideSessionManager::new(Arc::clone(&store));

        let a: SessionId = Arc::from("session-a");
        manager.capture_overrides(&a, &initialize_message("/mcp?apikey=K&rest_url=https://b.example"));
        let b: SessionId = Arc::from("session-b");
        manager.capture_overrides(&b, &initialize_message("/mcp"));

        let ta = store.target_for(Some("session-a"));
        assert_eq!(ta.api_key, "K");
        assert_eq!(ta.base_url, "https://b.example");
        assert_eq!(store.target_for(Some("session-b")), *store.defaults());
    }

    #[test]
    fn non_initialize_messages_are_ignored() {
        let store = Arc::new(SessionOverrides::new(BackendTarget::new("k", "https://d")));
        let manager = OverrideSessionManager::new(Arc::clone(&store));
        let ping: ClientJsonRpcMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})).unwrap();
        manager.capture_overrides(&Arc::from("s"), &ping);
        assert!(store.is_empty());
    }
}
