//! API gateway binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use api_gateway::config::load_config;
use api_gateway::lifecycle::startup;

#[derive(Parser, Debug)]
#[command(name = "api-gateway", version, about = "API gateway with per-key rate limiting and per-route circuit breaking")]
struct Args {
    /// Path to the gateway configuration file.
    #[arg(long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.check_config {
        return match load_config(&args.config) {
            Ok(config) => {
                println!(
                    "{}: OK ({} routes, {} fallbacks)",
                    args.config.display(),
                    config.routes.len(),
                    config.fallbacks.len()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", args.config.display());
                ExitCode::FAILURE
            }
        };
    }

    match startup::run(&args.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
