//! Sahar file server - Entry Point

use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use std::process::ExitCode;

use sahar_file_server::{Cli, CredentialTable, Server, ServerConfig, StartupError, shutdown_signal};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // RUST_LOG overrides the default level
    Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), StartupError> {
    let config = ServerConfig::load(cli)?;
    let credentials = CredentialTable::load(&config.credentials_path)?;

    info!("Launching file server...");

    let server = Server::bind(config, credentials).await?;
    server.run(shutdown_signal()).await;
    Ok(())
}
