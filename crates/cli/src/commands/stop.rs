// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leto-cli stop` - stop tracking on a node.

use anyhow::Result;
use leto_wire::Request;

use crate::client;

pub async fn run(node: &str) -> Result<()> {
    client::call_node(node, &Request::StopTracking).await?;
    println!("Stopped tracking on {node}");
    Ok(())
}
