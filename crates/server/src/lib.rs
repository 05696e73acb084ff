//! OntoPortal MCP server: one MCP tool per `OpenAPI` operation, served over streamable HTTP with
//! per-session backend overrides.

pub mod app;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod overrides;
pub mod session_manager;
