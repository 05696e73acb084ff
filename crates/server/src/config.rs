//! Command line / environment configuration.
//!
//! Every flag falls back to an environment variable. `.env` is applied by `main` before parsing,
//! so values there behave exactly like exported variables.

use crate::error::{Result, ServerError};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ontoportal_env::require_value;
use ontoportal_http_tools::backend::{BackendTarget, resolve_url};
use ontoportal_openapi_tools::config::{DEFAULT_SPEC_PATH, OpenApiSourceConfig, OperationFilter};
use std::time::Duration;

pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Parser)]
#[command(
    name = "ontoportal-mcp-server",
    about = "Expose the OntoPortal REST API as MCP tools over streamable HTTP",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub spec: SpecArgs,

    #[command(flatten)]
    pub log: LogArgs,

    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Load the `OpenAPI` spec, print the derived tool names and exit.
    ValidateSpec,
}

#[derive(Debug, Clone, Args)]
pub struct SpecArgs {
    /// `OpenAPI` document the tools are generated from.
    #[arg(long, global = true, env = "ONTO_PORTAL_OPENAPI_SPEC", default_value = DEFAULT_SPEC_PATH)]
    pub spec: String,

    /// Only expose operations matching these `"METHOD /path"` globs (comma-separated).
    #[arg(
        long = "include-operation",
        global = true,
        env = "ONTO_PORTAL_INCLUDE_OPERATIONS",
        value_delimiter = ','
    )]
    pub include_operations: Vec<String>,

    /// Hide operations matching these `"METHOD /path"` globs. Wins over includes.
    #[arg(
        long = "exclude-operation",
        global = true,
        env = "ONTO_PORTAL_EXCLUDE_OPERATIONS",
        value_delimiter = ','
    )]
    pub exclude_operations: Vec<String>,
}

impl SpecArgs {
    #[must_use]
    pub fn openapi_source(&self) -> OpenApiSourceConfig {
        OpenApiSourceConfig {
            spec: self.spec.clone(),
            operations: OperationFilter::from_patterns(
                &self.include_operations,
                &self.exclude_operations,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "ONTO_PORTAL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(
        long,
        global = true,
        env = "ONTO_PORTAL_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,
}

/// Serving settings. Optional at the clap level so `validate-spec` runs without them; checked by
/// [`ServerConfig::from_args`].
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "MCP_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "MCP_PORT")]
    pub port: Option<String>,

    /// Default backend base URL (sessions may override it).
    #[arg(long, env = "ONTO_PORTAL_BASE_URL")]
    pub base_url: Option<String>,

    /// Default backend API key (sessions may override it).
    #[arg(long, env = "ONTO_PORTAL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Backend request timeout in seconds; `0` disables it.
    #[arg(long, env = "ONTO_PORTAL_CALL_TIMEOUT_SECS", default_value_t = DEFAULT_CALL_TIMEOUT_SECS)]
    pub call_timeout_secs: u64,
}

/// Validated settings for [`crate::app::run`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub defaults: BackendTarget,
    pub call_timeout: Option<Duration>,
    pub openapi: OpenApiSourceConfig,
}

impl ServerConfig {
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] naming the first missing variable, or describing an
    /// unparsable port or base URL.
    pub fn from_args(spec: &SpecArgs, serve: &ServeArgs) -> Result<Self> {
        let host = require_value("MCP_HOST", serve.host.clone())?;
        let port_raw = require_value("MCP_PORT", serve.port.clone())?;
        let base_url = require_value("ONTO_PORTAL_BASE_URL", serve.base_url.clone())?;
        let api_key = require_value("ONTO_PORTAL_API_KEY", serve.api_key.clone())?;

        let port = port_raw.trim().parse::<u16>().map_err(|_| {
            ServerError::Config(format!("MCP_PORT must be a TCP port number, got '{port_raw}'"))
        })?;
        resolve_url("/", &base_url)
            .map_err(|e| ServerError::Config(format!("ONTO_PORTAL_BASE_URL is unusable: {e}")))?;

        Ok(Self {
            host,
            port,
            defaults: BackendTarget::new(api_key, base_url),
            call_timeout: (serve.call_timeout_secs > 0)
                .then(|| Duration::from_secs(serve.call_timeout_secs)),
            openapi: spec.openapi_source(),
        })
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
