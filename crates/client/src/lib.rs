//! Client side of the OntoPortal MCP server: a streamable HTTP MCP client plus helpers for the
//! health check, smoke test and token binaries.

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod token;
pub mod transport;

pub use client::{CallOptions, OntoPortalMcpClient, result_text};
pub use error::ClientError;
pub use transport::{InProcessConnector, TransportSpec, TransportTarget};
