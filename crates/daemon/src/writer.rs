// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rotating frame readout file writer.
//!
//! One gzip segment per rotation period, chained through header/footer
//! links so a reader can walk the whole experiment from the first file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use leto_core::hermes::encode_delimited;
use leto_core::{filename_without_overwrite, FileLine, Footer, FrameReadout, Header};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writer for the rotating `tracking.NNNN.hermes.gz` chain.
pub struct FrameReadoutFileWriter {
    basepath: PathBuf,
    period: Duration,
}

struct OpenSegment {
    name: String,
    gz: GzEncoder<File>,
}

impl FrameReadoutFileWriter {
    pub fn new(basepath: PathBuf) -> Self {
        Self { basepath, period: crate::env::rotation_period() }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Drain `rx` to disk until it closes, then seal the last segment with
    /// a terminal footer.
    ///
    /// The first segment opens on the first readout, whose dimensions are
    /// copied into every header of the chain. Readouts are persisted with
    /// producer identity, per-frame dimensions and diagnostic counters
    /// stripped.
    pub async fn write_all(
        self,
        mut rx: mpsc::Receiver<FrameReadout>,
    ) -> Result<(), WriterError> {
        let mut segment: Option<OpenSegment> = None;
        let mut dims = (0, 0);
        let mut next_rotation = Instant::now() + self.period;

        while let Some(mut readout) = rx.recv().await {
            if segment.is_none() {
                dims = (readout.width, readout.height);
                next_rotation = Instant::now() + self.period;
                segment = Some(self.open_next_segment(dims, "")?);
            }

            readout.producer_uuid.clear();
            readout.width = 0;
            readout.height = 0;
            readout.quads = 0;
            let line = FileLine { readout: Some(readout), footer: None };
            if let Some(segment) = segment.as_mut() {
                segment.gz.write_all(&encode_delimited(&line))?;
            }

            if Instant::now() >= next_rotation {
                if let Some(current) = segment.take() {
                    // The current file still exists, so the probe lands on
                    // the next free suffix.
                    let (next_path, _) = filename_without_overwrite(&self.basepath)?;
                    let next_name = segment_name(&next_path);
                    let previous = close_segment(current, &next_name)?;
                    segment = Some(open_segment_at(&next_path, dims, &previous)?);
                }
                next_rotation = Instant::now() + self.period;
            }
        }

        if let Some(segment) = segment.take() {
            close_segment(segment, "")?;
        }
        Ok(())
    }

    fn open_next_segment(
        &self,
        dims: (i32, i32),
        previous: &str,
    ) -> Result<OpenSegment, WriterError> {
        let (path, _) = filename_without_overwrite(&self.basepath)?;
        open_segment_at(&path, dims, previous)
    }
}

fn open_segment_at(
    path: &Path,
    dims: (i32, i32),
    previous: &str,
) -> Result<OpenSegment, WriterError> {
    let name = segment_name(path);
    info!(segment = %name, "opening tracking segment");
    let file = File::create(path)?;
    let mut gz = GzEncoder::new(file, Compression::default());
    gz.write_all(&encode_delimited(&Header::for_file(dims.0, dims.1, previous)))?;
    Ok(OpenSegment { name, gz })
}

fn segment_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Write the closing footer and flush the gzip stream.
fn close_segment(mut segment: OpenSegment, next: &str) -> Result<String, WriterError> {
    let line = FileLine { readout: None, footer: Some(Footer { next: next.to_string() }) };
    segment.gz.write_all(&encode_delimited(&line))?;
    segment.gz.finish()?;
    Ok(segment.name)
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
