//! Error types for `ontoportal-openapi-tools`.

use ontoportal_http_tools::error::HttpToolsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (bad patterns, unusable backend target).
    #[error("Configuration error: {0}")]
    Config(String),

    /// `OpenAPI` errors (unsupported constructs, unresolvable refs).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    OpenApiSpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {source}")]
    OpenApiSpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Two parameters of one operation map to the same tool argument.
    #[error("Parameter collision: {0}")]
    ParamCollision(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments do not satisfy the operation (e.g. missing required parameter).
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The backend rejected the credentials (401/403).
    #[error("Backend authentication failed: HTTP {status} {reason}: {body}")]
    BackendAuth {
        status: u16,
        reason: String,
        body: String,
    },

    /// Any other non-2xx backend response.
    #[error("Backend returned HTTP {status} {reason}: {body}")]
    BackendStatus {
        status: u16,
        reason: String,
        body: String,
    },

    /// Transport failure talking to the backend.
    #[error("Request error: {0}")]
    Request(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<HttpToolsError> for OpenApiToolsError {
    fn from(e: HttpToolsError) -> Self {
        match e {
            HttpToolsError::Config(s) => Self::Config(s),
            HttpToolsError::Transport(s) => Self::Request(s),
            HttpToolsError::Http(s) => Self::Http(s),
        }
    }
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
