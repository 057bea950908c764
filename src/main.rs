//! Main entry point for the fan remote

use clap::Parser;
use fan_remote::{args::Args, cli, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::setup(args.verbose, args.log_file.as_deref())?;

    log::info!(
        "fan-remote v{} (git {}) built {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_DESC").unwrap_or("unknown"),
        option_env!("BUILD_TIME").unwrap_or("unknown")
    );

    cli::handle_args(args).await
}
