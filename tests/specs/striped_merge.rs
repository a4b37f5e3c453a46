// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-producer striped merge: out-of-order delivery, one frame late
//! beyond its deadline, one frame never delivered, and slave timestamps
//! re-based onto the master timebase.

use std::collections::HashMap;
use std::time::Duration;

use leto_core::readout::{FrameReadout, ReadoutError};
use leto_core::WorkloadBalance;
use leto_daemon::merge_frame_readouts;
use tokio::sync::mpsc;

/// Master owns the even slot, the slave the odd one.
fn plan() -> WorkloadBalance {
    WorkloadBalance {
        fps: 100.0,
        stride: 2,
        master_uuid: "master".to_string(),
        ids_by_uuid: HashMap::from([
            ("master".to_string(), vec![true, false]),
            ("slave".to_string(), vec![false, true]),
        ]),
    }
}

/// Wall clock advances 10 µs per frame; the master's tracker counts from
/// 1000 µs, the slave's from a timebase 1000 µs later.
fn frame(id: i64) -> FrameReadout {
    let (producer, base) = if id % 2 == 0 { ("master", 1000) } else { ("slave", 2000) };
    let mut ro = FrameReadout {
        frame_id: id,
        producer_uuid: producer.to_string(),
        timestamp: base + 10 * id,
        ..Default::default()
    };
    ro.set_wall_time(
        std::time::UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_micros(10 * id as u64),
    );
    ro
}

#[tokio::test(start_paused = true)]
async fn two_producer_striped_merge() {
    let wb = plan();
    let (in_tx, in_rx) = mpsc::channel(64);
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let merger = tokio::spawn(async move { merge_frame_readouts(&wb, in_rx, out_tx).await });

    // 6 is delayed past its deadline and 8 never arrives
    let delivery: Vec<i64> =
        vec![0, 1, 2, 3, 5, 4, 7, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19];
    for id in delivery {
        in_tx.send(frame(id)).await.unwrap();
    }

    // The paused clock auto-advances through the merge deadlines, so the
    // missing frames are synthesized as timeouts
    let mut outputs = Vec::new();
    for _ in 0..20 {
        outputs.push(out_rx.recv().await.unwrap());
    }

    // The late original of 6 is dropped, a timeout was already emitted
    in_tx.send(frame(6)).await.unwrap();
    drop(in_tx);
    assert!(out_rx.recv().await.is_none());
    merger.await.unwrap().unwrap();

    for (position, ro) in outputs.iter().enumerate() {
        assert_eq!(ro.frame_id, position as i64, "contiguous IDs from the first frame");
        assert!(ro.producer_uuid.is_empty());
        if ro.frame_id == 6 || ro.frame_id == 8 {
            assert_eq!(ro.error(), ReadoutError::ProcessTimeout);
            assert_eq!(ro.timestamp, 0, "timeouts carry no tracker timestamp");
        } else {
            assert_eq!(ro.error(), ReadoutError::NoError);
            let expected = 1000 + 10 * ro.frame_id;
            assert!(
                (ro.timestamp - expected).abs() <= 1,
                "frame {}: timestamp {} not within 1 µs of {expected}",
                ro.frame_id,
                ro.timestamp
            );
        }
    }
}
