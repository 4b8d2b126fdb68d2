use std::process::ExitCode;

use clap::Parser;
use csvq::config::{Cli, Command, ConfigError};
use csvq::{AccessPolicy, Dispatcher, Gateway, GatewayConfig};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries protocol messages in stdio mode, so logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "csvq exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), RunError> {
    let csv = cli.csv.read_options();
    let preserve_case = cli.query.preserve_identifier_case();
    match cli.command() {
        Command::Stdio => {
            let config = GatewayConfig::new(AccessPolicy::Unrestricted)
                .with_csv_options(csv)
                .with_preserve_identifier_case(preserve_case);
            let gateway = Gateway::new(config);
            tracing::info!(transport = "stdio", "csvq starting");
            csvq::stdio::run_stdio(&Dispatcher::new(gateway)).await?;
        }
        Command::Serve(serve) => {
            let policy = serve.scoped_policy()?;
            if let Some(root) = policy.root() {
                tracing::info!(files_path = %root.display(), "serving files directory");
            }
            let config = GatewayConfig::new(policy)
                .with_csv_options(csv)
                .with_preserve_identifier_case(preserve_case);
            let gateway = Gateway::new(config);
            let (addr, server) = csvq::http::run_server(gateway, serve.addr).await?;
            tracing::info!(transport = "http", %addr, "csvq listening");
            server.await?;
        }
    }
    tracing::info!("shutdown complete");
    Ok(())
}
