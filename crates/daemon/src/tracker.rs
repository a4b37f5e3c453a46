// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracker child process: version probes and command construction.
//!
//! The tracker (artemis) is an external binary. It ships detection results
//! to the master's ingress port and, on the master, muxes raw video frames
//! to its stdout.

use std::path::Path;
use std::time::Duration;

use leto_core::{TrackingConfiguration, ARTEMIS_MIN_VERSION};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("could not run {binary}: {source}")]
    Probe { binary: String, source: std::io::Error },

    #[error("{description} timed out after {seconds}s")]
    Timeout { description: &'static str, seconds: u64 },

    #[error("{binary} exited with {status}: {stderr}")]
    Failed { binary: String, status: String, stderr: String },

    #[error("unparseable output from {description}: '{output}'")]
    Parse { description: &'static str, output: String },

    #[error("tracker version {found} is older than the supported {min}")]
    TooOld { found: String, min: String },
}

/// Default timeout for tracker probe commands.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to build the tracker command line of one node.
pub struct TrackerSpec<'a> {
    pub config: &'a TrackingConfiguration,
    pub self_uuid: &'a str,
    pub host: &'a str,
    pub port: u16,
    pub experiment_dir: &'a Path,
    pub test_mode: bool,
    pub is_master: bool,
    /// Camera resolution the master measured, applied on slaves only.
    pub slave_resolution: Option<(i32, i32)>,
    pub stride: usize,
    /// Slots owned by this node, only used when `stride > 1`.
    pub frame_ids: Vec<i64>,
}

/// Full tracker argument list for one node.
pub fn tracking_args(spec: &TrackerSpec<'_>) -> Vec<String> {
    let config = spec.config;
    let camera = &config.camera;
    let detection = &config.detection;
    let quad = &detection.quad;

    fn push(args: &mut Vec<String>, flag: &str, value: String) {
        args.push(flag.to_string());
        args.push(value);
    }

    let mut args: Vec<String> = Vec::new();
    push(&mut args, "--host", spec.host.to_string());
    push(&mut args, "--port", spec.port.to_string());
    push(&mut args, "--uuid", spec.self_uuid.to_string());
    push(&mut args, "--camera-fps", format!("{}", camera.fps.unwrap_or(8.0)));
    push(&mut args, "--camera-strobe", format_us(camera.strobe_duration.unwrap_or_default()));
    push(&mut args, "--camera-strobe-delay", format_us(camera.strobe_delay.unwrap_or_default()));
    push(&mut args, "--at-family", detection.family.clone().unwrap_or_default());
    push(&mut args, "--at-quad-decimate", format!("{}", quad.decimate.unwrap_or(1.0)));
    push(&mut args, "--at-quad-sigma", format!("{}", quad.sigma.unwrap_or(0.0)));
    if quad.refine_edges == Some(true) {
        args.push("--at-refine-edges".to_string());
    }
    push(&mut args, "--at-quad-min-cluster", format!("{}", quad.min_cluster_pixel.unwrap_or(25)));
    push(&mut args, "--at-quad-max-n-maxima", format!("{}", quad.max_n_maxima.unwrap_or(10)));
    push(
        &mut args,
        "--at-quad-critical-radian",
        format!("{}", quad.critical_radian.unwrap_or(0.17)),
    );
    push(&mut args, "--at-quad-max-line-mse", format!("{}", quad.max_line_mse.unwrap_or(10.0)));
    push(&mut args, "--at-quad-min-bw-diff", format!("{}", quad.min_bw_diff.unwrap_or(50)));
    if quad.deglitch == Some(true) {
        args.push("--at-quad-deglitch".to_string());
    }
    if config.legacy_mode == Some(true) {
        args.push("--legacy-mode".to_string());
    }
    if spec.test_mode {
        args.push("--test-mode".to_string());
    }
    args.push("--log-output-dir".to_string());
    args.push(spec.experiment_dir.display().to_string());

    if spec.is_master {
        args.push("--video-output-to-stdout".to_string());
        args.push("--video-output-height".to_string());
        args.push("1080".to_string());
        args.push("--video-output-add-header".to_string());
        args.push("--new-ant-output-dir".to_string());
        args.push(spec.experiment_dir.join("ants").display().to_string());
        args.push("--new-ant-roi-size".to_string());
        args.push(format!("{}", config.new_ant_output_roi_size.unwrap_or(600)));
        args.push("--image-renew-period".to_string());
        args.push(format_us(config.image_renew_period.unwrap_or_default()));
    } else if let Some((width, height)) = spec.slave_resolution {
        args.push("--camera-slave-width".to_string());
        args.push(width.to_string());
        args.push("--camera-slave-height".to_string());
        args.push(height.to_string());
    }

    if spec.stride > 1 {
        args.push("--frame-stride".to_string());
        args.push(spec.stride.to_string());
        args.push("--frame-ids".to_string());
        args.push(
            spec.frame_ids.iter().map(i64::to_string).collect::<Vec<_>>().join(","),
        );
    }

    let highlights = config.highlights.clone().unwrap_or_default();
    if !highlights.is_empty() {
        args.push("--highlight-tags".to_string());
        args.push(
            highlights.iter().map(|id| format!("{id:#x}")).collect::<Vec<_>>().join(","),
        );
    }

    args
}

fn format_us(duration: Duration) -> String {
    format!("{}us", duration.as_micros())
}

/// Run a probe subcommand and capture its trimmed stdout.
async fn probe(binary: &str, args: &[&str], description: &'static str) -> Result<String, TrackerError> {
    let mut cmd = Command::new(binary);
    cmd.args(args);
    let output = tokio::time::timeout(PROBE_TIMEOUT, cmd.output())
        .await
        .map_err(|_| TrackerError::Timeout { description, seconds: PROBE_TIMEOUT.as_secs() })?
        .map_err(|source| TrackerError::Probe { binary: binary.to_string(), source })?;
    if !output.status.success() {
        return Err(TrackerError::Failed {
            binary: binary.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Probe the tracker binary and enforce the minimum supported version.
pub async fn check_artemis(binary: &str) -> Result<String, TrackerError> {
    let output = probe(binary, &["--version"], "tracker version probe").await?;
    let found = parse_version(&output)
        .ok_or(TrackerError::Parse { description: "tracker version probe", output: output.clone() })?;
    let min = parse_version(ARTEMIS_MIN_VERSION)
        .unwrap_or_default();
    if found < min {
        return Err(TrackerError::TooOld {
            found: output,
            min: ARTEMIS_MIN_VERSION.to_string(),
        });
    }
    Ok(output)
}

/// Probe the muxer binary.
pub async fn check_ffmpeg(binary: &str) -> Result<(), TrackerError> {
    probe(binary, &["-version"], "muxer version probe").await?;
    Ok(())
}

/// Ask the tracker for the camera resolution (master with slaves only).
pub async fn fetch_resolution(binary: &str) -> Result<(i32, i32), TrackerError> {
    let output = probe(binary, &["--fetch-resolution"], "resolution probe").await?;
    let mut numbers = output
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i32>().ok());
    match (numbers.next(), numbers.next()) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(TrackerError::Parse { description: "resolution probe", output }),
    }
}

/// Ask the tracker for its camera firmware variant (Link cross-check).
pub async fn fetch_firmware_variant(binary: &str) -> Result<String, TrackerError> {
    probe(binary, &["--fetch-firmware-variant"], "firmware variant probe").await
}

/// Parse `v0.4.2`, `0.4.2` or `artemis 0.4.2` into a comparable triple.
fn parse_version(text: &str) -> Option<(u64, u64, u64)> {
    let token = text
        .split_whitespace()
        .map(|t| t.trim_start_matches('v'))
        .find(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))?;
    let mut parts = token.split('.').map(|p| {
        p.chars().take_while(char::is_ascii_digit).collect::<String>().parse::<u64>().ok()
    });
    let major = parts.next().flatten()?;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    Some((major, minor, patch))
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
