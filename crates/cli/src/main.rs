// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `e2epool`: the three agent-side verbs (`create`, `finalize`, `status`) as
//! a thin CLI talking to the local agent over its Unix socket.

mod client;
mod commands;
mod env;
mod exit_error;

use clap::{Parser, Subcommand};

use client::AgentClient;
use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "e2epool", version, about = "Per-job runner checkpoint/reset client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a checkpoint for the current job.
    Create {
        #[arg(long)]
        job_id: String,
    },
    /// Finalize a checkpoint (resolve success/failure/cancellation).
    Finalize {
        #[arg(long)]
        checkpoint: String,
        #[arg(long, value_parser = ["success", "failure", "canceled"])]
        status: String,
    },
    /// Print the current record for a checkpoint.
    Status {
        #[arg(long)]
        checkpoint: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = AgentClient::connect_default();

    let result = match cli.command {
        Command::Create { job_id } => commands::create::run(&client, job_id).await,
        Command::Finalize { checkpoint, status } => {
            commands::finalize::run(&client, checkpoint, status).await
        }
        Command::Status { checkpoint } => commands::status::run(&client, checkpoint).await,
    };

    if let Err(err) = result {
        eprintln!("e2epool: {err}");
        std::process::exit(err.code);
    }
}
