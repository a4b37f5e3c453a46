// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use leto_core::hermes::SegmentReader;
use leto_core::{FrameReadout, Tag};
use tokio::sync::mpsc;

use super::*;

fn readout(id: i64) -> FrameReadout {
    FrameReadout {
        frame_id: id,
        timestamp: 1000 + id,
        producer_uuid: "should-be-stripped".to_string(),
        quads: 42,
        width: 4096,
        height: 3000,
        tags: vec![Tag { id: id as u32, x: 1.0, y: 2.0, theta: 0.5 }],
        ..Default::default()
    }
}

#[tokio::test]
async fn single_segment_has_header_lines_and_terminal_footer() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FrameReadoutFileWriter::new(dir.path().join("tracking.hermes.gz"));

    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(writer.write_all(rx));
    for id in 0..5 {
        tx.send(readout(id)).await.unwrap();
    }
    drop(tx);
    task.await.unwrap().unwrap();

    let mut reader = SegmentReader::open(&dir.path().join("tracking.0000.hermes.gz")).unwrap();
    assert_eq!((reader.header().width, reader.header().height), (4096, 3000));
    assert!(reader.header().previous.is_empty());

    for id in 0..5 {
        let ro = reader.next_readout().unwrap().unwrap();
        assert_eq!(ro.frame_id, id);
        assert_eq!(ro.timestamp, 1000 + id);
        assert_eq!(ro.tags.len(), 1);
        // Stripped before persisting
        assert!(ro.producer_uuid.is_empty());
        assert_eq!((ro.width, ro.height, ro.quads), (0, 0, 0));
    }
    // Terminal footer: the chain ends here
    assert!(reader.next_readout().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn rotation_chains_segments_and_preserves_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FrameReadoutFileWriter::new(dir.path().join("tracking.hermes.gz"))
        .with_period(Duration::from_secs(3600));

    let (tx, rx) = mpsc::channel(64);
    let task = tokio::spawn(writer.write_all(rx));
    for id in 0..10 {
        tx.send(readout(id)).await.unwrap();
    }
    // Let the writer drain, then cross a rotation deadline mid-stream
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(3601)).await;
    for id in 10..20 {
        tx.send(readout(id)).await.unwrap();
    }
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(3601)).await;
    for id in 20..25 {
        tx.send(readout(id)).await.unwrap();
    }
    drop(tx);
    task.await.unwrap().unwrap();

    assert!(dir.path().join("tracking.0000.hermes.gz").exists());
    assert!(dir.path().join("tracking.0001.hermes.gz").exists());
    assert!(dir.path().join("tracking.0002.hermes.gz").exists());

    // Property 8: the concatenation across the chain equals the input
    let mut reader = SegmentReader::open(&dir.path().join("tracking.0000.hermes.gz")).unwrap();
    let mut ids = Vec::new();
    while let Some(ro) = reader.next_readout().unwrap() {
        ids.push(ro.frame_id);
    }
    assert_eq!(ids, (0..25).collect::<Vec<i64>>());
    assert_eq!(reader.segment(), "tracking.0002.hermes.gz");
    // Every header past the first carries the first frame's dimensions
    assert_eq!((reader.header().width, reader.header().height), (4096, 3000));
}

#[tokio::test]
async fn empty_input_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FrameReadoutFileWriter::new(dir.path().join("tracking.hermes.gz"));

    let (tx, rx) = mpsc::channel::<FrameReadout>(1);
    drop(tx);
    writer.write_all(rx).await.unwrap();

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
