// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Daemon version (from Cargo.toml)
pub const LETO_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the data root: `LETO_DATA_DIR` > XDG data dir.
///
/// Experiments land under `<data>/fort-experiments`, the recovery marker
/// under `<data>/fort/leto`.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("LETO_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::data_dir()
}

/// Default RPC read/write timeout.
pub fn rpc_timeout() -> Duration {
    std::env::var("LETO_RPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Tracker binary, overridable for test setups.
pub fn artemis_path() -> String {
    std::env::var("LETO_ARTEMIS_PATH").unwrap_or_else(|_| "artemis".to_string())
}

/// Muxer binary, overridable for test setups.
pub fn ffmpeg_path() -> String {
    std::env::var("LETO_FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string())
}

/// Segment rotation period for the hermes files and the video archive.
pub fn rotation_period() -> Duration {
    std::env::var("LETO_ROTATION_PERIOD_S")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(2 * 3600))
}
