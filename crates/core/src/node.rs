// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent node topology.
//!
//! Each node knows either its master (it is a slave) or its slaves (it is
//! the master; both empty means a standalone master). The topology lives in
//! a well-known config file and is loaded at process start; every change
//! goes through explicit load/save calls.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    #[error("node is enslaved to '{0}'")]
    Enslaved(String),

    #[error("node has {0} linked slave(s)")]
    HasSlaves(usize),

    #[error("already has slave '{0}'")]
    DuplicateSlave(String),

    #[error("does not have slave '{0}'")]
    UnknownSlave(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode topology: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Master/slaves topology of this node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfiguration {
    /// Name of the master, empty when this node is itself the master.
    pub master: String,
    /// Linked slaves in workload order, empty on a slave.
    pub slaves: Vec<String>,
}

impl NodeConfiguration {
    /// Well-known topology path under the user configuration directory.
    pub fn default_path() -> Result<PathBuf, NodeError> {
        let dir = dirs::config_dir().ok_or(NodeError::NoConfigDir)?;
        Ok(dir.join("FORmicidae Tracker").join("leto.yml"))
    }

    /// Load the topology, falling back to the default on any error.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_yaml::from_str(&text).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err,
                    "unreadable node topology, assuming standalone");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), NodeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn is_master(&self) -> bool {
        self.master.is_empty()
    }

    /// Link a slave. Only valid on a master; duplicates are rejected.
    pub fn add_slave(&mut self, hostname: &str) -> Result<(), NodeError> {
        if !self.master.is_empty() {
            return Err(NodeError::Enslaved(self.master.clone()));
        }
        if self.slaves.iter().any(|s| s == hostname) {
            return Err(NodeError::DuplicateSlave(hostname.to_string()));
        }
        self.slaves.push(hostname.to_string());
        Ok(())
    }

    pub fn remove_slave(&mut self, hostname: &str) -> Result<(), NodeError> {
        let idx = self
            .slaves
            .iter()
            .position(|s| s == hostname)
            .ok_or_else(|| NodeError::UnknownSlave(hostname.to_string()))?;
        self.slaves.remove(idx);
        Ok(())
    }

    /// Enslave this node to `master`. Only valid with no linked slaves.
    pub fn set_master(&mut self, master: &str) -> Result<(), NodeError> {
        if !self.slaves.is_empty() {
            return Err(NodeError::HasSlaves(self.slaves.len()));
        }
        self.master = master.to_string();
        Ok(())
    }

    /// Leave the current master, becoming standalone.
    pub fn clear_master(&mut self) {
        self.master.clear();
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
