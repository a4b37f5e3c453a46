// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! leto-core: data model and on-disk formats shared by the leto daemon and CLI.
//!
//! Holds the hermes wire messages, the rotating container format, the
//! tracking configuration tree, the workload plan, and the persistent node
//! topology.

pub mod config;
pub mod filename;
pub mod hermes;
pub mod node;
pub mod readout;
pub mod workload;

pub use config::{
    CameraConfiguration, LoadBalancing, QuadDetectionConfiguration, StreamConfiguration,
    TagDetectionConfiguration, TrackingConfiguration,
};
pub use filename::{filename_with_suffix, filename_without_overwrite};
pub use node::NodeConfiguration;
pub use readout::{FileLine, Footer, FrameReadout, Header, HeaderType, ReadoutError, Tag, Version};
pub use workload::{WorkloadBalance, WorkloadError};

/// RPC port of the daemon.
pub const LETO_PORT: u16 = 4000;
/// Producer ingress port (tracker processes connect here).
pub const ARTEMIS_IN_PORT: u16 = 4001;
/// Subscriber egress port (live readout consumers connect here).
pub const ARTEMIS_OUT_PORT: u16 = 4002;

/// Container format version written in every file header.
pub const MAJOR_FMT_VERSION: i32 = 0;
pub const MINOR_FMT_VERSION: i32 = 5;

/// Minimum supported tracker version.
pub const ARTEMIS_MIN_VERSION: &str = "0.4.0";

/// Camera firmware variant required of a slave node.
pub const SLAVE_FIRMWARE_VARIANT: &str = "1-df-camera";

/// How long a cached node listing stays fresh.
pub const NODE_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(5);
