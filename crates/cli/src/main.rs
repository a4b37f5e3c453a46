// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! leto-cli: operator frontend for the leto tracking fleet.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "leto-cli", version, about = "Operate leto tracking nodes over the LAN")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every node on the network with its tracking status
    Scan,
    /// Start tracking on a node
    Start(commands::start::StartArgs),
    /// Stop tracking on a node
    Stop {
        /// Node name
        node: String,
    },
    /// Show the topology and running experiment of a node
    Status {
        /// Node name
        node: String,
    },
    /// Print the outcome of a node's last experiment
    LastExperimentLog {
        /// Node name
        node: String,
    },
    /// Link a slave node under a master node
    Link {
        master: String,
        slave: String,
    },
    /// Remove a slave node from its master
    Unlink {
        master: String,
        slave: String,
    },
    /// Subscribe to a node's live merged readout stream and print it
    DisplayFrameReadout {
        /// Node name
        node: String,
    },
    /// Print the readouts of a tracking file, following the segment chain
    Read {
        /// First segment of the chain (`tracking.0000.hermes.gz`)
        file: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Scan => commands::scan::run().await,
        Commands::Start(args) => commands::start::run(args).await,
        Commands::Stop { node } => commands::stop::run(&node).await,
        Commands::Status { node } => commands::status::run(&node).await,
        Commands::LastExperimentLog { node } => commands::logs::run(&node).await,
        Commands::Link { master, slave } => commands::link::run(&master, &slave, true).await,
        Commands::Unlink { master, slave } => commands::link::run(&master, &slave, false).await,
        Commands::DisplayFrameReadout { node } => commands::display::run(&node).await,
        Commands::Read { file } => commands::read::run(&file),
    };
    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
