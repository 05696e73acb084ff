//! Client-side defaults derived from the environment.
//!
//! These read the process environment only; binaries apply `.env` first.

use ontoportal_env::optional_env;

pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";
pub const DEFAULT_CLIENT_PORT: &str = "8000";

/// `ONTO_PORTAL_MCP_URL`, else `http://{ONTO_PORTAL_MCP_CLIENT_HOST}:{MCP_PORT}/mcp`.
#[must_use]
pub fn default_mcp_url() -> String {
    mcp_url_from(
        optional_env("ONTO_PORTAL_MCP_URL"),
        optional_env("ONTO_PORTAL_MCP_CLIENT_HOST"),
        optional_env("MCP_PORT"),
    )
}

#[must_use]
pub fn mcp_url_from(url: Option<String>, host: Option<String>, port: Option<String>) -> String {
    if let Some(url) = url {
        return url;
    }
    let host = host.unwrap_or_else(|| DEFAULT_CLIENT_HOST.to_string());
    let port = port.unwrap_or_else(|| DEFAULT_CLIENT_PORT.to_string());
    format!("http://{host}:{port}/mcp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_wins() {
        assert_eq!(
            mcp_url_from(Some("https://mcp.example/mcp".into()), Some("h".into()), Some("1".into())),
            "https://mcp.example/mcp"
        );
    }

    #[test]
    fn host_and_port_fall_back_to_defaults() {
        assert_eq!(mcp_url_from(None, None, None), "http://127.0.0.1:8000/mcp");
        assert_eq!(
            mcp_url_from(None, Some("mcp.internal".into()), Some("8083".into())),
            "http://mcp.internal:8083/mcp"
        );
    }
}
