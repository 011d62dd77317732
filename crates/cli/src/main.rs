// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! oj - thin local-operation client for the Odd Jobs daemon (ojd)

mod commands;
mod daemon_process;
mod env;
mod http_client;
mod poll;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oj", version, about = "Start, stop, and check the Odd Jobs transcription daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start {
        /// Run in the foreground instead of detaching
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Check whether the daemon is running and report its load
    Status {
        /// Print machine-readable JSON instead of a formatted summary
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start { foreground } => commands::start::start(foreground).await,
        Commands::Stop => commands::stop::stop().await,
        Commands::Status { json } => commands::status::status(json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
