// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leto-cli status` - topology and running experiment of one node.

use anyhow::{bail, Result};
use leto_wire::{Request, Response};

use crate::client;

pub async fn run(node: &str) -> Result<()> {
    let response = client::call_node(node, &Request::Status).await?;
    let Response::Status { master, slaves, experiment } = response else {
        bail!("unexpected response from '{node}'");
    };

    if master.is_empty() {
        println!("Node: {node} (master)");
        for slave in &slaves {
            println!("Slave: {slave}");
        }
    } else {
        println!("Node: {node} (slave of {master})");
    }
    match experiment {
        Some(exp) => {
            println!("Experiment running since {}", exp.since);
            println!("Output directory: {}", exp.experiment_dir);
            println!("--- configuration ---");
            print!("{}", exp.yaml_configuration);
        }
        None => println!("No experiment running"),
    }
    Ok(())
}
