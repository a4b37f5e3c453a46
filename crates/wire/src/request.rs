// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use leto_core::TrackingConfiguration;
use serde::{Deserialize, Serialize};

/// Request from a client (CLI or master node) to a daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Start an experiment with the given (possibly partial) configuration.
    StartTracking { config: Box<TrackingConfiguration> },

    /// Stop the running experiment.
    StopTracking,

    /// Report topology and the running experiment, if any.
    Status,

    /// Report the outcome of the last finished experiment.
    LastExperimentLog,

    /// Link `slave` under `master`. Dispatched to both nodes; each updates
    /// its own side of the persistent topology.
    Link { master: String, slave: String },

    /// Undo a link.
    Unlink { master: String, slave: String },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
