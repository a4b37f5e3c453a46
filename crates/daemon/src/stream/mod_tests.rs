// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use leto_core::StreamConfiguration;
use tokio::io::AsyncWriteExt;

use super::*;

/// A stand-in muxer that ignores its arguments and copies stdin to stdout.
fn stub_muxer(dir: &Path) -> String {
    let path = dir.join("fake-ffmpeg");
    std::fs::write(&path, "#!/bin/sh\nexec cat\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

/// Muxed stream: per frame a 24-byte LE header and the RGB24 payload.
fn muxed_frames(ids: &[u64], width: u64, height: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    for id in ids {
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&width.to_le_bytes());
        buf.extend_from_slice(&height.to_le_bytes());
        buf.extend(std::iter::repeat(0xAB).take((3 * width * height) as usize));
    }
    buf
}

fn manager(dir: &Path, period: Duration) -> StreamManager {
    let muxer = stub_muxer(dir);
    StreamManager::new(
        dir.to_path_buf(),
        8.0,
        &StreamConfiguration::recommended(),
        "nest-01".to_string(),
    )
    .unwrap()
    .with_period(period)
    .with_ffmpeg(&muxer)
}

#[tokio::test]
async fn pipeline_starts_on_first_frame_and_logs_frame_correspondence() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), Duration::from_secs(3600));

    let feed = muxed_frames(&[10, 11, 12], 4, 2);
    manager.encode_and_stream(&feed[..]).await;

    let matching =
        std::fs::read_to_string(dir.path().join("stream.frame-matching.0000.txt")).unwrap();
    assert_eq!(matching, "0 10\n1 11\n2 12\n");
    assert!(dir.path().join("encoding.0000.log").exists());
    assert!(dir.path().join("save.0000.log").exists());
    // No destination configured: no publish log
    assert!(!dir.path().join("streaming.0000.log").exists());
}

#[tokio::test]
async fn rotation_restarts_the_child_graph_with_fresh_segment_names() {
    let dir = tempfile::tempdir().unwrap();
    // Zero period: every frame crosses the rotation deadline
    let manager = manager(dir.path(), Duration::ZERO);

    let feed = muxed_frames(&[7, 8, 9], 4, 2);
    manager.encode_and_stream(&feed[..]).await;

    for (segment, frame) in [(0, 7), (1, 8), (2, 9)] {
        let path = dir.path().join(format!("stream.frame-matching.{segment:04}.txt"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("0 {frame}\n"), "segment index restarts at 0");
        assert!(dir.path().join(format!("encoding.{segment:04}.log")).exists());
    }
}

#[tokio::test]
async fn empty_input_never_spawns_children() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), Duration::from_secs(3600));

    let empty: &[u8] = &[];
    manager.encode_and_stream(empty).await;

    assert!(!dir.path().join("stream.frame-matching.0000.txt").exists());
    assert!(!dir.path().join("encoding.0000.log").exists());
}

#[tokio::test]
async fn copy_tee_feeds_save_and_survives_a_dead_publish_leg() {
    let (mut from_tx, from_rx) = tokio::io::duplex(256);
    let (save_tx, mut save_rx) = tokio::io::duplex(4096);
    let (publish_tx, publish_rx) = tokio::io::duplex(16);

    // Publish side goes away immediately
    drop(publish_rx);

    let copy = tokio::spawn(copy_tee(from_rx, save_tx, Some(publish_tx)));

    from_tx.write_all(b"first chunk ").await.unwrap();
    from_tx.write_all(b"second chunk").await.unwrap();
    from_tx.shutdown().await.unwrap();
    drop(from_tx);

    let copied = copy.await.unwrap().unwrap();
    assert_eq!(copied, 24);

    use tokio::io::AsyncReadExt;
    let mut saved = Vec::new();
    save_rx.read_to_end(&mut saved).await.unwrap();
    assert_eq!(saved, b"first chunk second chunk");
}

#[tokio::test]
async fn copy_tee_fails_when_the_save_leg_dies() {
    let (mut from_tx, from_rx) = tokio::io::duplex(256);
    let (save_tx, save_rx) = tokio::io::duplex(16);
    drop(save_rx);

    let copy = tokio::spawn(copy_tee(from_rx, save_tx, None::<tokio::io::DuplexStream>));
    // Over the duplex capacity so the dead save leg is hit
    let _ = from_tx.write_all(&[0u8; 64]).await;
    drop(from_tx);

    assert!(copy.await.unwrap().is_err());
}

#[test]
fn construction_validates_quality_and_tune() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StreamConfiguration::recommended();
    config.quality = Some("warp".to_string());
    assert!(matches!(
        StreamManager::new(dir.path().to_path_buf(), 8.0, &config, "nest-01".to_string()),
        Err(StreamError::InvalidQuality(_))
    ));
}
