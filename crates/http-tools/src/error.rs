use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpToolsError {
    /// Bad target configuration (base URL without a scheme, unusable API key, ...).
    #[error("config error: {0}")]
    Config(String),
    /// The backend could not be reached or the connection failed mid-response.
    #[error("http transport error: {0}")]
    Transport(String),
    /// The backend answered but the response could not be used.
    #[error("http error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, HttpToolsError>;
