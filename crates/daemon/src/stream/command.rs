// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Muxer child command construction.
//!
//! Three ffmpeg invocations make the pipeline: encode (raw RGB24 to
//! FLV/H.264), save (FLV to an mp4 segment) and publish (FLV to RTMP).

use std::path::Path;

use leto_core::StreamConfiguration;
use tokio::process::Command;

use super::StreamError;

/// libx264 presets accepted for `stream.quality`.
pub const QUALITY_PRESETS: [&str; 9] = [
    "ultrafast", "superfast", "veryfast", "faster", "fast", "medium", "slow", "slower", "veryslow",
];

/// libx264 tunes accepted for `stream.tuning`.
pub const TUNES: [&str; 6] =
    ["film", "animation", "grain", "stillimage", "fastdecode", "zerolatency"];

/// Validated encoding parameters shared by every child of the pipeline.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    ffmpeg: String,
    fps: f64,
    bitrate_kb: i32,
    bitrate_max_ratio: f64,
    quality: String,
    tune: String,
}

impl CommandSpec {
    pub fn new(config: &StreamConfiguration, fps: f64) -> Result<Self, StreamError> {
        let quality = config.quality.clone().unwrap_or_else(|| "fast".to_string());
        if !QUALITY_PRESETS.contains(&quality.as_str()) {
            return Err(StreamError::InvalidQuality(quality));
        }
        let tune = config.tune.clone().unwrap_or_else(|| "film".to_string());
        if !TUNES.contains(&tune.as_str()) {
            return Err(StreamError::InvalidTune(tune));
        }
        Ok(Self {
            ffmpeg: crate::env::ffmpeg_path(),
            fps,
            bitrate_kb: config.bitrate_kb.unwrap_or(2000),
            bitrate_max_ratio: config.bitrate_max_ratio.unwrap_or(1.5).max(1.0),
            quality,
            tune,
        })
    }

    /// Override the muxer binary (test setups).
    pub fn with_ffmpeg(mut self, ffmpeg: &str) -> Self {
        self.ffmpeg = ffmpeg.to_string();
        self
    }

    pub fn encode_args(&self, resolution: &str) -> Vec<String> {
        let cbr = format!("{}k", self.bitrate_kb);
        let max_rate =
            format!("{}k", (self.bitrate_kb as f64 * self.bitrate_max_ratio).round() as i64);
        let framerate = format!("{}", self.fps);
        let gop = format!("{}", (2.0 * self.fps) as i64);
        let keyint_min = format!("{}", self.fps as i64);
        let args: Vec<&str> = vec![
            "-hide_banner",
            "-loglevel", "error",
            "-f", "rawvideo",
            "-vcodec", "rawvideo",
            "-pixel_format", "rgb24",
            "-video_size", resolution,
            "-framerate", &framerate,
            "-i", "-",
            "-c:v:0", "libx264",
            "-g", &gop,
            "-keyint_min", &keyint_min,
            "-b:v", &cbr,
            "-minrate", &cbr,
            "-maxrate", &max_rate,
            "-pix_fmt", "yuv420p",
            "-s", resolution,
            "-preset", &self.quality,
            "-tune", &self.tune,
            "-f", "flv",
            "-",
        ];
        args.into_iter().map(str::to_string).collect()
    }

    pub fn save_args(&self, file: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "flv".to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-vcodec".to_string(),
            "copy".to_string(),
            file.display().to_string(),
        ]
    }

    pub fn publish_args(&self, dest_address: &str, host: &str) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "flv".to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-vcodec".to_string(),
            "copy".to_string(),
            format!("rtmp://{dest_address}/olympus/{host}.flv"),
        ]
    }

    pub fn command(&self, args: Vec<String>) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(args);
        cmd
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
