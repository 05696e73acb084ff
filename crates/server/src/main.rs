use anyhow::Context as _;
use clap::Parser as _;
use ontoportal_mcp_server::app;
use ontoportal_mcp_server::config::{Cli, Command, ServerConfig};
use ontoportal_mcp_server::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Before any thread exists: the loader mutates the process environment.
    if let Err(e) = ontoportal_env::load_env_file(ontoportal_env::DEFAULT_ENV_FILE) {
        eprintln!("warning: {e}");
    }

    let cli = Cli::parse();
    logging::init(&cli.log);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "fatal");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::ValidateSpec) = cli.command {
        return validate_spec(&cli);
    }

    let config = ServerConfig::from_args(&cli.spec, &cli.serve)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(app::run(config))?;
    Ok(())
}

fn validate_spec(cli: &Cli) -> anyhow::Result<()> {
    let openapi = cli.spec.openapi_source();
    let tools = app::load_tools(&openapi, None)
        .with_context(|| format!("validate {}", openapi.spec))?;

    println!(
        "{} ({}): {} tools",
        tools.spec_title(),
        tools.spec_version(),
        tools.tool_names().len()
    );
    for name in tools.tool_names() {
        println!("  {name}");
    }
    Ok(())
}
