// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame readout merge engine.
//!
//! Reassembles the striped per-producer readout streams into a single
//! stream with strictly increasing frame IDs and no gaps. A frame that
//! misses its deadline is synthesized as a timeout readout; slave tracker
//! timestamps are re-based onto the master's timebase.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use leto_core::{FrameReadout, ReadoutError, WorkloadBalance, WorkloadError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;

/// Merge readouts from `inbound` into `outbound` until `inbound` closes.
///
/// The workload plan is checked once at entry; an inconsistent plan is
/// fatal and nothing is ever emitted. Dropping `outbound` on return is what
/// closes the downstream.
pub async fn merge_frame_readouts(
    wb: &WorkloadBalance,
    mut inbound: mpsc::Receiver<FrameReadout>,
    outbound: mpsc::Sender<FrameReadout>,
) -> Result<(), WorkloadError> {
    wb.check()?;

    let stride = wb.stride as i64;
    let period = Duration::from_secs_f64(1.0 / wb.fps);
    let timeout = period * (2 * wb.stride as u32 + 2);

    let mut aligner = TimebaseAligner::default();
    let mut next_to_send: i64 = 0;
    let mut max_frame: i64 = -1;
    let mut deadlines: HashMap<i64, Instant> = HashMap::new();
    let mut buffer: Vec<FrameReadout> = Vec::with_capacity(10 * wb.stride);

    loop {
        let input = if deadlines.is_empty() {
            match inbound.recv().await {
                Some(readout) => Some(readout),
                None => return Ok(()),
            }
        } else {
            tokio::select! {
                msg = inbound.recv() => match msg {
                    Some(readout) => Some(readout),
                    None => return Ok(()),
                },
                _ = tokio::time::sleep(timeout) => None,
            }
        };

        let now = Instant::now();
        if let Some(mut readout) = input {
            if readout.frame_id > max_frame {
                max_frame = readout.frame_id;
            }
            if let Err(err) = wb.check_frame(&readout) {
                warn!(error = %err, "dropping frame");
                continue;
            }
            if wb.stride > 1 {
                if let Err(err) = aligner.align(&wb.master_uuid, &mut readout) {
                    warn!(frame_id = readout.frame_id, error = %err, "dropping frame");
                    continue;
                }
            }
            if deadlines.is_empty() {
                next_to_send = readout.frame_id;
                for i in 0..stride {
                    deadlines
                        .insert(next_to_send + i, now + period * (i as u32) + timeout);
                }
            }
            if readout.frame_id < next_to_send {
                warn!(frame_id = readout.frame_id, "received frame, but already sent a timeout");
                continue;
            }
            deadlines.remove(&readout.frame_id);
            deadlines.insert(readout.frame_id + stride, now + timeout);
            readout.producer_uuid.clear();
            buffer.push(readout);
        }

        // Complete the buffer with timed-out frames
        let end = (next_to_send + stride).max(max_frame);
        for id in next_to_send..end {
            let expired = deadlines.get(&id).is_some_and(|deadline| now >= *deadline);
            if !expired {
                continue;
            }
            warn!(frame_id = id, "marking frame as timed out");
            let mut timeouted = FrameReadout {
                frame_id: id,
                error: ReadoutError::ProcessTimeout as i32,
                ..Default::default()
            };
            timeouted.set_wall_time(SystemTime::now());
            buffer.push(timeouted);
            deadlines.remove(&id);
            deadlines.insert(id + stride, now + timeout);
        }

        buffer.sort_by_key(|r| r.frame_id);

        // Send the contiguous prefix
        while let Some(first) = buffer.first() {
            if first.frame_id < next_to_send {
                warn!(
                    next = next_to_send,
                    buffered = first.frame_id,
                    "inconsistent state, dropping buffered frame"
                );
                buffer.remove(0);
                continue;
            }
            if first.frame_id > next_to_send {
                break;
            }
            let readout = buffer.remove(0);
            if outbound.send(readout).await.is_err() {
                // Downstream gone, the experiment is tearing down
                return Ok(());
            }
            deadlines.remove(&next_to_send);
            next_to_send += 1;
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
enum AlignError {
    #[error("frame has no wall-clock time")]
    MissingTime,

    #[error("missing a first master frame to compute offset")]
    NoSynchronizationPoint,
}

/// Re-bases slave tracker timestamps onto the master timebase.
///
/// The last master frame is the synchronization point; the instantaneous
/// offset of a slave frame against it is low-pass filtered per slave before
/// being applied.
#[derive(Default)]
struct TimebaseAligner {
    last_point: Option<(SystemTime, i64)>,
    offsets: HashMap<String, f64>,
}

impl TimebaseAligner {
    fn align(&mut self, master_uuid: &str, readout: &mut FrameReadout) -> Result<(), AlignError> {
        let wall = readout.wall_time().ok_or(AlignError::MissingTime)?;
        if readout.producer_uuid == master_uuid {
            self.last_point = Some((wall, readout.timestamp));
            return Ok(());
        }
        let (master_wall, master_ts) =
            self.last_point.ok_or(AlignError::NoSynchronizationPoint)?;
        let current =
            master_ts as f64 + delta_micros(wall, master_wall) - readout.timestamp as f64;
        let offset = self
            .offsets
            .entry(readout.producer_uuid.clone())
            .and_modify(|offset| *offset += 0.2 * (current - *offset))
            .or_insert(current);
        readout.timestamp += *offset as i64;
        Ok(())
    }
}

/// Signed difference `a - b` in microseconds.
fn delta_micros(a: SystemTime, b: SystemTime) -> f64 {
    match a.duration_since(b) {
        Ok(d) => d.as_secs_f64() * 1.0e6,
        Err(err) => -err.duration().as_secs_f64() * 1.0e6,
    }
}

#[cfg(test)]
#[path = "merger_tests.rs"]
mod tests;
