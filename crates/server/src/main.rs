//! dpe: Docker Policy Engine authorization plugin.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use dpe_server::bootstrap;
use dpe_server::cli::Cli;
use dpe_server::signal::TerminationSignal;
use dpe_server::Coordinator;

fn init_tracing(debug_acl: bool) {
    let default_filter = if debug_acl {
        "info,dpe_policy=debug,dpe_server=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (silently ignores if missing).
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.debug);
    let config = cli.into_config();

    info!(?config, "starting dpe");

    bootstrap::run(&config)?;

    let mut termination = TerminationSignal::register().context("failed to install signal handlers")?;

    let mut coordinator = Coordinator::new(config);
    coordinator.run_until(termination.recv()).await?;

    info!("dpe exited cleanly");
    Ok(())
}
