// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leto-cli last-experiment-log` - outcome of a node's last experiment.

use anyhow::{bail, Result};
use leto_wire::{Request, Response};

use crate::client;

pub async fn run(node: &str) -> Result<()> {
    let response = client::call_node(node, &Request::LastExperimentLog).await?;
    let Response::LastExperimentLog(log) = response else {
        bail!("unexpected response from '{node}'");
    };

    let outcome = if log.has_error { "with errors" } else { "cleanly" };
    match log.end {
        Some(end) => println!("Experiment ended {outcome} ({} .. {end})", log.start),
        None => println!("Experiment ended {outcome} (started {})", log.start),
    }
    println!("Output directory: {}", log.experiment_dir);
    if !log.log.is_empty() {
        println!("--- log ---");
        print!("{}", log.log);
    }
    if !log.stderr.is_empty() {
        println!("--- stderr ---");
        print!("{}", log.stderr);
    }
    Ok(())
}
