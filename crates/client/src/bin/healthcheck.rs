//! Container health check: exit 0 iff the server's health endpoint answers 200/202 within 5 s.

use ontoportal_mcp_client::health::{HEALTH_TIMEOUT, check, default_health_url};
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = ontoportal_env::load_env_file(ontoportal_env::DEFAULT_ENV_FILE) {
        eprintln!("warning: {e}");
    }
    let url = default_health_url();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("unhealthy: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(check(&url, HEALTH_TIMEOUT)) {
        Ok(status) => {
            println!("healthy: {url} -> {}", status.as_u16());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
