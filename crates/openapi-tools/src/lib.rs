//! OpenAPI -> MCP tooling for the OntoPortal REST API.
//!
//! A spec document is loaded once; every `get`/`post`/`put`/`delete`/`patch` operation becomes an
//! MCP tool. Tool calls are executed through [`ontoportal_http_tools::backend::BackendClient`]
//! against a caller-supplied [`ontoportal_http_tools::backend::BackendTarget`].

pub mod config;
pub mod error;
mod request;
pub mod resolver;
pub mod runtime;
mod schema;
