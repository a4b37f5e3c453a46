// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Video stream pipeline.
//!
//! De-frames the tracker's raw-RGB stdout and drives a three-stage child
//! graph: encode (raw to FLV/H.264), then a tee that feeds the save child
//! (mp4 segment) and, when a destination is configured, the publish child
//! (RTMP). Segments rotate on a wall-clock period.

mod command;

pub use command::{CommandSpec, QUALITY_PRESETS, TUNES};

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use leto_core::filename_without_overwrite;
use leto_core::StreamConfiguration;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream quality '{0}'")]
    InvalidQuality(String),

    #[error("invalid stream tune '{0}'")]
    InvalidTune(String),

    #[error("could not spawn {stage}: {source}")]
    Spawn { stage: &'static str, source: std::io::Error },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame header of the muxed tracker stdout: three little-endian u64s.
pub const MUXED_HEADER_SIZE: usize = 24;

/// Manager for the encode/save/publish child graph of one experiment.
pub struct StreamManager {
    basedir: PathBuf,
    spec: CommandSpec,
    dest_address: String,
    host: String,
    period: Duration,
    children: Mutex<Option<Pipeline>>,
}

struct Pipeline {
    encode: Child,
    save: Child,
    publish: Option<Child>,
    encode_in: Option<ChildStdin>,
    copy_task: JoinHandle<()>,
    matching: std::fs::File,
}

impl StreamManager {
    pub fn new(
        basedir: PathBuf,
        fps: f64,
        config: &StreamConfiguration,
        host: String,
    ) -> Result<Self, StreamError> {
        Ok(Self {
            basedir,
            spec: CommandSpec::new(config, fps)?,
            dest_address: config.host.clone().unwrap_or_default(),
            host,
            period: crate::env::rotation_period(),
            children: Mutex::new(None),
        })
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Override the muxer binary (test setups).
    pub fn with_ffmpeg(mut self, ffmpeg: &str) -> Self {
        self.spec = self.spec.with_ffmpeg(ffmpeg);
        self
    }

    /// Drive the pipeline from the tracker's muxed stdout until EOF.
    ///
    /// Children are spawned lazily on the first frame, once the resolution
    /// is known from its header. Rotation stops and restarts the whole
    /// child graph with freshly named segment and log files.
    pub async fn encode_and_stream<R>(&self, mut muxed: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; MUXED_HEADER_SIZE];
        let mut frame = Vec::new();
        let mut resolution = String::new();
        let mut segment_frame: u64 = 0;
        let mut errors = RepeatedErrors::default();
        let mut next_rotation = tokio::time::Instant::now() + self.period;

        loop {
            match muxed.read_exact(&mut header).await {
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    info!("muxed stream ended");
                    break;
                }
                Err(err) => {
                    errors.observe(&format!("cannot read header: {err}"));
                    break;
                }
            }
            let frame_number = u64::from_le_bytes(header[0..8].try_into().unwrap_or_default());
            let width = u64::from_le_bytes(header[8..16].try_into().unwrap_or_default());
            let height = u64::from_le_bytes(header[16..24].try_into().unwrap_or_default());
            if resolution.is_empty() {
                resolution = format!("{width}x{height}");
            }

            // Read the full frame before touching the children, so a child
            // failure cannot desynchronize the input stream
            let len = (3 * width * height) as usize;
            frame.resize(len, 0);
            match muxed.read_exact(&mut frame).await {
                Ok(_) => {}
                Err(err) => {
                    errors.observe(&format!("cannot read frame: {err}"));
                    break;
                }
            }

            if self.children.lock().is_none() {
                match self.start_tasks(&resolution) {
                    Ok(pipeline) => {
                        *self.children.lock() = Some(pipeline);
                        segment_frame = 0;
                        next_rotation = tokio::time::Instant::now() + self.period;
                    }
                    Err(err) => {
                        warn!(error = %err, "could not start stream tasks");
                        return;
                    }
                }
            }

            let mut encode_in = {
                let mut children = self.children.lock();
                let Some(pipeline) = children.as_mut() else { continue };
                use std::io::Write;
                if let Err(err) =
                    writeln!(pipeline.matching, "{segment_frame} {frame_number}")
                {
                    errors.observe(&format!("cannot log frame correspondence: {err}"));
                }
                pipeline.encode_in.take()
            };
            if let Some(stdin) = encode_in.as_mut() {
                if let Err(err) = stdin.write_all(&frame).await {
                    errors.observe(&format!("cannot copy frame: {err}"));
                }
            }
            if let Some(pipeline) = self.children.lock().as_mut() {
                pipeline.encode_in = encode_in;
            }
            segment_frame += 1;

            if tokio::time::Instant::now() >= next_rotation {
                info!(period = ?self.period, "creating new film segment");
                self.stop_tasks().await;
                next_rotation = tokio::time::Instant::now() + self.period;
            }
        }
        self.stop_tasks().await;
    }

    /// Spawn the child graph for one segment.
    fn start_tasks(&self, resolution: &str) -> Result<Pipeline, StreamError> {
        let (movie, _) = filename_without_overwrite(&self.basedir.join("stream.mp4"))?;
        let (matching_path, _) =
            filename_without_overwrite(&self.basedir.join("stream.frame-matching.txt"))?;
        let matching = std::fs::File::create(&matching_path)?;

        let mut encode = self
            .spec
            .command(self.spec.encode_args(resolution))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(self.log_file("encoding.log")?)
            .spawn()
            .map_err(|source| StreamError::Spawn { stage: "encode", source })?;
        let mut save = self
            .spec
            .command(self.spec.save_args(&movie))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(self.log_file("save.log")?)
            .spawn()
            .map_err(|source| StreamError::Spawn { stage: "save", source })?;
        let mut publish = if self.dest_address.is_empty() {
            None
        } else {
            Some(
                self.spec
                    .command(self.spec.publish_args(&self.dest_address, &self.host))
                    .stdin(Stdio::piped())
                    .stdout(Stdio::null())
                    .stderr(self.log_file("streaming.log")?)
                    .spawn()
                    .map_err(|source| StreamError::Spawn { stage: "publish", source })?,
            )
        };

        let encode_in = encode.stdin.take();
        let encode_out = encode.stdout.take();
        let save_in = save.stdin.take();
        let publish_in = publish.as_mut().and_then(|child| child.stdin.take());

        info!(movie = %movie.display(), dest = %self.dest_address, "starting streaming");
        let copy_task = tokio::spawn(async move {
            match (encode_out, save_in) {
                (Some(from), Some(save_to)) => {
                    if let Err(err) = copy_tee(from, save_to, publish_in).await {
                        warn!(error = %err, "stream copy ended");
                    }
                }
                _ => warn!("encode/save pipes missing, nothing to copy"),
            }
        });

        Ok(Pipeline { encode, save, publish, encode_in, copy_task, matching })
    }

    /// Tear the child graph down: closing the encode stdin drains the whole
    /// chain, then every child is reaped.
    async fn stop_tasks(&self) {
        let Some(mut pipeline) = self.children.lock().take() else { return };
        drop(pipeline.encode_in.take());
        let _ = pipeline.copy_task.await;
        for (stage, child) in [("encode", &mut pipeline.encode), ("save", &mut pipeline.save)] {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!(stage, %status, "stream child exited with failure");
                }
                Ok(_) => {}
                Err(err) => warn!(stage, error = %err, "could not reap stream child"),
            }
        }
        if let Some(mut publish) = pipeline.publish.take() {
            if let Err(err) = publish.wait().await {
                warn!(stage = "publish", error = %err, "could not reap stream child");
            }
        }
    }

    fn log_file(&self, base: &str) -> Result<Stdio, StreamError> {
        let (path, _) = filename_without_overwrite(&self.basedir.join(base))?;
        Ok(Stdio::from(std::fs::File::create(path)?))
    }
}

/// Copy `from` into `save`, teeing every chunk to `publish` best effort.
///
/// A publish write failure is logged once and publishing stops; a save
/// write failure fails the copy.
pub(crate) async fn copy_tee<R, W1, W2>(
    mut from: R,
    mut save: W1,
    mut publish: Option<W2>,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W1: AsyncWrite + Unpin,
    W2: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; 32 * 1024];
    let mut total = 0u64;
    loop {
        let n = from.read(&mut buf).await?;
        if n == 0 {
            save.shutdown().await?;
            if let Some(publish) = publish.as_mut() {
                let _ = publish.shutdown().await;
            }
            return Ok(total);
        }
        save.write_all(&buf[..n]).await?;
        if let Some(target) = publish.as_mut() {
            if let Err(err) = target.write_all(&buf[..n]).await {
                warn!(error = %err, "publish stream failed, continuing without it");
                publish = None;
            }
        }
        total += n as u64;
    }
}

/// Collapses identical consecutive errors into one log line with a count.
#[derive(Default)]
struct RepeatedErrors {
    last: Option<String>,
    repeats: u64,
}

impl RepeatedErrors {
    fn observe(&mut self, message: &str) {
        if self.last.as_deref() == Some(message) {
            self.repeats += 1;
            return;
        }
        if self.repeats > 0 {
            warn!(repeats = self.repeats, "previous error repeated");
        }
        warn!("{message}");
        self.last = Some(message.to_string());
        self.repeats = 0;
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
