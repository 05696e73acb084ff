//! Connectivity smoke test: connect, list tools, run a `searchTerms` query.

use anyhow::Context as _;
use clap::Parser;
use ontoportal_mcp_client::config::default_mcp_url;
use ontoportal_mcp_client::{CallOptions, OntoPortalMcpClient, TransportSpec, result_text};
use serde_json::json;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "ontoportal-check-access",
    about = "Check that an OntoPortal MCP server is reachable and answers a search",
    version
)]
struct Args {
    /// MCP endpoint (defaults to ONTO_PORTAL_MCP_URL or the local server).
    #[arg(long, env = "ONTO_PORTAL_MCP_URL")]
    url: Option<String>,

    /// Bearer token for JWT-protected deployments.
    #[arg(long, env = "ONTO_PORTAL_MCP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Search text passed to `searchTerms`.
    #[arg(long, default_value = "heart")]
    query: String,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

fn main() -> ExitCode {
    if let Err(e) = ontoportal_env::load_env_file(ontoportal_env::DEFAULT_ENV_FILE) {
        eprintln!("warning: {e}");
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: build tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("FAILED: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let url = args.url.unwrap_or_else(default_mcp_url);
    println!("Connecting to {url}");
    let mut client = OntoPortalMcpClient::new(TransportSpec::new(url).with_token(args.token))
        .with_timeout(Duration::from_secs(args.timeout_secs));

    client.connect().await.context("connect")?;
    if let Some(info) = client.server_info() {
        println!("Connected: {} {}", info.server_info.name, info.server_info.version);
    }

    let result = check(&client, &args.query).await;
    client.disconnect().await;
    result
}

async fn check(client: &OntoPortalMcpClient, query: &str) -> anyhow::Result<()> {
    let tools = client.list_tools().await.context("list tools")?;
    println!("Tools ({}):", tools.len());
    for tool in &tools {
        println!("  {}", tool.name);
    }
    anyhow::ensure!(
        tools.iter().any(|t| t.name == "searchTerms"),
        "server does not expose searchTerms"
    );

    let arguments = json!({ "q": query }).as_object().cloned();
    let result = client
        .call_tool("searchTerms", arguments, CallOptions::non_raising())
        .await
        .context("call searchTerms")?;

    if result.is_error == Some(true) {
        anyhow::bail!("searchTerms returned an error: {}", result_text(&result));
    }

    let total = result
        .structured_content
        .as_ref()
        .and_then(|sc| sc.get("totalCount"))
        .cloned()
        .unwrap_or_default();
    let first = result
        .structured_content
        .as_ref()
        .and_then(|sc| sc.pointer("/collection/0/prefLabel"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("-");
    println!("searchTerms(q={query:?}): totalCount={total}, first prefLabel={first}");
    println!("OK");
    Ok(())
}
