// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leto-cli read` - dump a tracking file, following its segment chain.

use std::path::Path;

use anyhow::{Context, Result};
use leto_core::hermes::SegmentReader;

pub fn run(file: &Path) -> Result<()> {
    let mut reader = SegmentReader::open(file)
        .with_context(|| format!("could not open '{}'", file.display()))?;
    if !reader.header().previous.is_empty() {
        eprintln!(
            "WARNING: this file has previous data in '{}'",
            reader.header().previous
        );
    }

    let mut count: u64 = 0;
    while let Some(ro) = reader.next_readout()? {
        let time = ro
            .wall_time()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "frame: {}, time: {time}, tags: {}, error: {:?}",
            ro.frame_id,
            ro.tags.len(),
            ro.error()
        );
        count += 1;
    }
    eprintln!("{count} readouts (last segment: {})", reader.segment());
    Ok(())
}

#[cfg(test)]
#[path = "read_tests.rs"]
mod tests;
