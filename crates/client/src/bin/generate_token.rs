//! Print an HS256 JWT for a protected MCP deployment.

use clap::Parser;
use ontoportal_mcp_client::token::{
    DEFAULT_AUDIENCE, DEFAULT_ISSUER, DEFAULT_SUBJECT, TokenOptions, generate_token,
};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "ontoportal-generate-token", about = "Generate an HS256 JWT", version)]
struct Args {
    /// Signing secret.
    #[arg(long, env = "ONTO_PORTAL_MCP_JWT_SECRET", hide_env_values = true)]
    secret: String,

    #[arg(long, default_value = DEFAULT_ISSUER)]
    issuer: String,

    #[arg(long, default_value = DEFAULT_AUDIENCE)]
    audience: String,

    #[arg(long, default_value = DEFAULT_SUBJECT)]
    subject: String,

    /// Lifetime in seconds.
    #[arg(long, default_value_t = 3600)]
    ttl_secs: u64,
}

fn main() -> ExitCode {
    if let Err(e) = ontoportal_env::load_env_file(ontoportal_env::DEFAULT_ENV_FILE) {
        eprintln!("warning: {e}");
    }
    let args = Args::parse();
    let options = TokenOptions {
        issuer: args.issuer,
        audience: args.audience,
        subject: args.subject,
        ttl: Duration::from_secs(args.ttl_secs),
    };

    match generate_token(&args.secret, &options) {
        Ok(token) => {
            println!("{token}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
