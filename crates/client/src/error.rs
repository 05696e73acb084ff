//! Client-side error taxonomy.

use reqwest::StatusCode;
use rmcp::ServiceError;
use rmcp::service::ClientInitializeError;
use rmcp::transport::DynamicTransportError;
use rmcp::transport::streamable_http_client::StreamableHttpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Unusable client settings (URL without scheme, token not valid as a header value, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The MCP endpoint answered 401 or 403
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Any other transport or protocol failure
    #[error("MCP client error: {0}")]
    Client(String),

    /// A tool call failed or returned an error result
    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Client is not connected; call connect() first")]
    NotConnected,
}

impl ClientError {
    /// Translate a failing HTTP status from the MCP endpoint.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        let message = format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            Self::Authentication(message)
        } else {
            Self::Client(message)
        }
    }
}

impl ClientError {
    /// Classify a transport failure, recovering the HTTP status when the endpoint sent one.
    pub(crate) fn from_transport(error: &DynamicTransportError) -> Self {
        match error
            .error
            .downcast_ref::<StreamableHttpError<reqwest::Error>>()
        {
            Some(StreamableHttpError::Client(e)) => match e.status() {
                Some(status) => Self::from_status(status),
                None => Self::Client(format!("request to MCP server failed: {e}")),
            },
            Some(StreamableHttpError::AuthRequired(_)) => {
                Self::from_status(StatusCode::UNAUTHORIZED)
            }
            Some(other) => Self::Client(other.to_string()),
            None => Self::Client(error.error.to_string()),
        }
    }

    pub(crate) fn from_initialize(error: ClientInitializeError) -> Self {
        match error {
            ClientInitializeError::TransportError { error, .. } => Self::from_transport(&error),
            ClientInitializeError::JsonRpcError(e) => {
                Self::Client(format!("initialize rejected: {} (code {})", e.message, e.code.0))
            }
            other => Self::Client(other.to_string()),
        }
    }

    /// `tools/*` request failures. JSON-RPC errors are left to the caller.
    pub(crate) fn from_service(error: ServiceError) -> Self {
        match error {
            ServiceError::TransportSend(e) => Self::from_transport(&e),
            ServiceError::TransportClosed => Self::Client("MCP connection closed".into()),
            other => Self::Client(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::transport::streamable_http_client::AuthRequiredError;
    use std::any::TypeId;

    fn transport_error(error: StreamableHttpError<reqwest::Error>) -> DynamicTransportError {
        DynamicTransportError {
            transport_name: "streamable-http".into(),
            transport_type_id: TypeId::of::<()>(),
            error: Box::new(error),
        }
    }

    #[test]
    fn status_translation() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            assert!(matches!(
                ClientError::from_status(status),
                ClientError::Authentication(_)
            ));
        }
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
        ] {
            assert!(matches!(ClientError::from_status(status), ClientError::Client(_)));
        }
        assert_eq!(
            ClientError::from_status(StatusCode::UNAUTHORIZED).to_string(),
            "Authentication failed: HTTP 401: Unauthorized"
        );
    }

    #[test]
    fn transport_errors_keep_authentication_distinct() {
        let auth = transport_error(StreamableHttpError::AuthRequired(AuthRequiredError {
            www_authenticate_header: "Bearer".into(),
        }));
        assert!(matches!(
            ClientError::from_transport(&auth),
            ClientError::Authentication(_)
        ));

        let eof = transport_error(StreamableHttpError::UnexpectedEndOfStream);
        assert!(matches!(ClientError::from_transport(&eof), ClientError::Client(_)));

        let closed = ClientError::from_service(ServiceError::TransportClosed);
        assert!(matches!(closed, ClientError::Client(m) if m.contains("closed")));
    }
}
