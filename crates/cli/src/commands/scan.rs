// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leto-cli scan` - list every node and its tracking state.

use anyhow::Result;
use leto_wire::{Request, Response};

use crate::client;

pub async fn run() -> Result<()> {
    let mut nodes: Vec<_> = client::list_nodes().await?.into_values().collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    println!("{:<16} {:<8} {:<10} {}", "Node", "Role", "Status", "Experiment");
    for node in nodes {
        match client::call(&node, &Request::Status).await {
            Ok(Response::Status { master, slaves, experiment }) => {
                let role = if master.is_empty() {
                    if slaves.is_empty() { "master".to_string() } else { format!("master/{}", slaves.len()) }
                } else {
                    format!("slave<{master}")
                };
                let (status, name) = match experiment {
                    Some(exp) => {
                        ("running".to_string(), format!("{} (since {})", exp.experiment_dir, exp.since))
                    }
                    None => ("idle".to_string(), String::new()),
                };
                println!("{:<16} {:<8} {:<10} {}", node.name, role, status, name);
            }
            Ok(other) => {
                println!("{:<16} unexpected response: {other:?}", node.name);
            }
            Err(err) => {
                println!("{:<16} unreachable: {err}", node.name);
            }
        }
    }
    Ok(())
}
