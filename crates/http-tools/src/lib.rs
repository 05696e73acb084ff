//! Outbound HTTP plumbing for the OntoPortal REST backend.
//!
//! Every request is sent on behalf of an explicit [`backend::BackendTarget`]: the effective API
//! key and base URL for the MCP session that triggered it. There is no ambient "current session";
//! callers resolve the target and pass it in.

pub mod backend;
pub mod error;
pub mod safety;
