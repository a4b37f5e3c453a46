// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response from a daemon to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Structured failure
    Error { message: String },

    /// Node status
    Status {
        /// Master of this node, empty when the node is itself master.
        master: String,
        /// Linked slaves in workload order.
        slaves: Vec<String>,
        /// The running experiment, if any.
        experiment: Option<ExperimentStatus>,
    },

    /// Outcome of the last finished experiment
    LastExperimentLog(Box<ExperimentLog>),
}

impl Response {
    /// Collapse a `Result`-shaped outcome into Ok/Error.
    pub fn from_result(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Response::Ok,
            Err(message) => Response::Error { message },
        }
    }
}

/// A running experiment as reported by `Status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentStatus {
    pub since: DateTime<Utc>,
    pub experiment_dir: String,
    /// Effective configuration, serialized as YAML.
    pub yaml_configuration: String,
}

/// Snapshot of a finished experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentLog {
    pub has_error: bool,
    pub experiment_dir: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub yaml_configuration: String,
    /// Captured tracker info log.
    pub log: String,
    /// Captured tracker stderr.
    pub stderr: String,
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
