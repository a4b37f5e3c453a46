// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node name resolution.
//!
//! Peers advertise themselves as `_leto._tcp` over DNS-SD; resolution goes
//! through the avahi tools with a short-lived on-disk cache so repeated
//! lookups (CLI polling, per-slave RPCs) do not re-browse the network.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leto_core::NODE_CACHE_TTL;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not browse for leto instances: {0}")]
    Browse(String),

    #[error("unknown node '{0}'")]
    UnknownNode(String),
}

/// One discovered daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub address: String,
    pub port: u16,
}

impl Node {
    /// Dialable `host:port` of the node's RPC endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Name to `host:port` resolution for peer RPCs.
#[async_trait]
pub trait NodeResolver: Send + Sync {
    async fn list_nodes(&self) -> Result<HashMap<String, Node>, ResolveError>;

    async fn resolve(&self, name: &str) -> Result<Node, ResolveError> {
        self.list_nodes()
            .await?
            .remove(name)
            .ok_or_else(|| ResolveError::UnknownNode(name.to_string()))
    }
}

/// Fixed name table, for tests and static deployments.
#[derive(Default)]
pub struct StaticResolver {
    nodes: HashMap<String, Node>,
}

impl StaticResolver {
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self { nodes: nodes.into_iter().map(|n| (n.name.clone(), n)).collect() }
    }
}

#[async_trait]
impl NodeResolver for StaticResolver {
    async fn list_nodes(&self) -> Result<HashMap<String, Node>, ResolveError> {
        Ok(self.nodes.clone())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NodeCache {
    date: Option<DateTime<Utc>>,
    nodes: HashMap<String, Node>,
}

/// DNS-SD browser backed by `avahi-browse`, with an on-disk cache.
pub struct AvahiResolver {
    cache_path: PathBuf,
    ttl: Duration,
}

impl AvahiResolver {
    /// Cache under the user cache directory (`fort/leto/node.cache`).
    pub fn new() -> Self {
        let cache_path = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("fort")
            .join("leto")
            .join("node.cache");
        Self { cache_path, ttl: NODE_CACHE_TTL }
    }

    pub fn with_cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = path;
        self
    }

    fn load_cache(&self) -> NodeCache {
        std::fs::read_to_string(&self.cache_path)
            .ok()
            .and_then(|text| serde_yaml::from_str(&text).ok())
            .unwrap_or_default()
    }

    fn save_cache(&self, cache: &NodeCache) {
        let Some(parent) = self.cache_path.parent() else { return };
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
        if let Ok(text) = serde_yaml::to_string(cache) {
            let _ = std::fs::write(&self.cache_path, text);
        }
    }
}

impl Default for AvahiResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeResolver for AvahiResolver {
    async fn list_nodes(&self) -> Result<HashMap<String, Node>, ResolveError> {
        let cache = self.load_cache();
        if let Some(date) = cache.date {
            let age = Utc::now().signed_duration_since(date);
            if age.to_std().map(|age| age < self.ttl).unwrap_or(false) {
                debug!(nodes = cache.nodes.len(), "using cached node listing");
                return Ok(cache.nodes);
            }
        }

        let mut cmd = Command::new("avahi-browse");
        cmd.args(["--resolve", "--parsable", "--terminate", "_leto._tcp"]);
        let output = tokio::time::timeout(Duration::from_secs(3), cmd.output())
            .await
            .map_err(|_| ResolveError::Browse("browse timed out".to_string()))?
            .map_err(|err| ResolveError::Browse(err.to_string()))?;
        if !output.status.success() {
            return Err(ResolveError::Browse(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let nodes = parse_avahi_browse(&String::from_utf8_lossy(&output.stdout));
        self.save_cache(&NodeCache { date: Some(Utc::now()), nodes: nodes.clone() });
        Ok(nodes)
    }
}

/// Parse `avahi-browse --parsable` resolved entries.
///
/// Resolved lines look like
/// `=;eth0;IPv4;leto.nest-01;_leto._tcp;local;nest-01.local;192.168.0.10;4000;`.
fn parse_avahi_browse(output: &str) -> HashMap<String, Node> {
    let mut nodes = HashMap::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split(';').collect();
        if fields.first() != Some(&"=") || fields.len() < 9 {
            continue;
        }
        let name = fields[3].strip_prefix("leto.").unwrap_or(fields[3]).to_string();
        let address = fields[6].trim_end_matches('.').to_string();
        let Ok(port) = fields[8].parse::<u16>() else { continue };
        nodes.insert(name.clone(), Node { name, address, port });
    }
    nodes
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
