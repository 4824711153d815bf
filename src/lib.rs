pub mod commands;
pub mod core;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use crate::core::error::{LauncherError, LauncherResult};

/// Structured logging on stderr so stdout stays pure JSON.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,interface_java=debug")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run() -> ExitCode {
    let cli = commands::Cli::parse();
    init_tracing();

    tracing::info!("InterfaceOficial Java discovery starting...");

    match commands::dispatch(cli).await {
        Ok(payload) => match serde_json::to_string_pretty(&payload) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!("Failed to encode output: {}", err);
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            tracing::error!("{}", err);
            println!("{}", serde_json::json!({ "error": err }));
            ExitCode::FAILURE
        }
    }
}
