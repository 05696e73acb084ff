//! Error types for the MCP server.

use ontoportal_env::EnvError;
use ontoportal_http_tools::error::HttpToolsError;
use ontoportal_openapi_tools::error::OpenApiToolsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Missing or malformed settings (env vars, flags, base URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (bind failure, unusable spec)
    #[error("Startup error: {0}")]
    Startup(String),

    /// `OpenAPI` spec loading/conversion errors
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EnvError> for ServerError {
    fn from(e: EnvError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<HttpToolsError> for ServerError {
    fn from(e: HttpToolsError) -> Self {
        match e {
            HttpToolsError::Config(msg) => Self::Config(msg),
            other => Self::Startup(other.to_string()),
        }
    }
}

impl From<OpenApiToolsError> for ServerError {
    fn from(e: OpenApiToolsError) -> Self {
        match e {
            OpenApiToolsError::Config(msg) => Self::Config(msg),
            other => Self::OpenApi(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
