// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC access to discovered nodes.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use leto_daemon::resolver::{AvahiResolver, Node, NodeResolver};
use leto_wire::{client, Request, Response};

const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Every node currently advertising on the network.
pub async fn list_nodes() -> Result<HashMap<String, Node>> {
    Ok(AvahiResolver::new().list_nodes().await?)
}

/// One request/response call to a node, by name.
///
/// A structured daemon error becomes a CLI error prefixed with the node
/// name.
pub async fn call_node(name: &str, request: &Request) -> Result<Response> {
    let node = AvahiResolver::new()
        .resolve(name)
        .await
        .with_context(|| format!("could not resolve '{name}'"))?;
    call(&node, request).await
}

/// One request/response call to an already-resolved node.
pub async fn call(node: &Node, request: &Request) -> Result<Response> {
    let response = client::call(&node.endpoint(), request, RPC_TIMEOUT)
        .await
        .with_context(|| format!("could not reach '{}'", node.name))?;
    if let Response::Error { message } = &response {
        bail!("{}: {message}", node.name);
    }
    Ok(response)
}
