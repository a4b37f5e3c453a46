// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use leto_core::FrameReadout;
use leto_daemon::writer::FrameReadoutFileWriter;
use tokio::sync::mpsc;

use super::*;

#[tokio::test(start_paused = true)]
async fn reads_a_rotated_chain_produced_by_the_daemon_writer() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FrameReadoutFileWriter::new(dir.path().join("tracking.hermes.gz"))
        .with_period(Duration::from_secs(3600));

    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(writer.write_all(rx));
    for id in 0..4 {
        tx.send(FrameReadout { frame_id: id, ..Default::default() }).await.unwrap();
        if id == 1 {
            // Drain the writer, then cross the rotation deadline
            tokio::task::yield_now().await;
            tokio::time::advance(Duration::from_secs(3601)).await;
        }
    }
    drop(tx);
    task.await.unwrap().unwrap();

    assert!(dir.path().join("tracking.0001.hermes.gz").exists());
    run(&dir.path().join("tracking.0000.hermes.gz")).unwrap();
}

#[test]
fn missing_file_is_a_clean_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(&dir.path().join("tracking.0000.hermes.gz")).unwrap_err();
    assert!(err.to_string().contains("could not open"));
}
