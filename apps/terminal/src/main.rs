//! # Tableside Terminal
//!
//! Command-line front end for the table sales workflow.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (stderr, `RUST_LOG` or the default filter)
//! 2. Parse arguments
//! 3. Load `TablesideConfig` (file, then `TABLESIDE_*` env vars)
//! 4. Build the demo or live backend
//! 5. Run the command and print its result as JSON on stdout
//!
//! ## Examples
//! Demo mode builds a fresh in-memory floor on every invocation, so a table
//! lifecycle spread over several commands needs the live backend:
//! ```bash
//! export TABLESIDE_MODE=live
//! tableside seed
//! tableside tables
//! tableside open 1
//! tableside sell 1 --item PIZZA:Pizza:2:4500 --weighed BUFFET:Buffet:450:6990 --payment pix
//! tableside clean 1
//! tableside release 1
//! ```
//!
//! In demo mode `sell` is still useful on its own: it opens, fills and
//! closes a table in one run.
//! ```bash
//! tableside sell 2 --item SODA:Soda:2:650 --discount 100
//! ```

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use tableside_service::TablesideConfig;

use crate::cli::{Cli, Command};
use crate::commands::Terminal;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(code = ?err.code, "{}", err.message);
            match serde_json::to_string_pretty(&err) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{}", err.message),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, CliError> {
    let mut config = TablesideConfig::load(cli.config)?;
    if let Some(store) = cli.store {
        config.store.scope = store;
    }

    match cli.command {
        Command::Tables => render(&Terminal::connect(&config).await?.tables().await?),
        Command::Open { table, operator } => render(
            &Terminal::connect(&config)
                .await?
                .open(&table, operator.as_deref())
                .await?,
        ),
        Command::Sell(args) => {
            let terminal = Terminal::connect(&config).await?;
            let cancel = interrupt_token();
            render(&terminal.sell(&args, &cancel).await?)
        }
        Command::Clean { table } => render(&Terminal::connect(&config).await?.clean(&table).await?),
        Command::Release { table } => {
            render(&Terminal::connect(&config).await?.release(&table).await?)
        }
        Command::Seed => render(&commands::seed(&config).await?),
    }
}

/// A token cancelled on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling before the next step");
            watcher.cancel();
        }
    });

    cancel
}

fn render<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::internal(e.to_string()))
}

/// Initializes the tracing subscriber for logging.
///
/// ## Log Levels
/// - ERROR: a command failed
/// - WARN: cash register problems, cancellations
/// - INFO: table and sale lifecycle
/// - DEBUG: every store call
///
/// Logs go to stderr so stdout stays pure JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tableside=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
