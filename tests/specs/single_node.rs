// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-node happy path: a synthetic producer feeds the whole master
//! graph (acceptor, merger, fan-out, file writer, broadcaster) through a
//! real experiment lifecycle.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use leto_core::hermes::{encode_delimited, read_delimited, SegmentReader};
use leto_core::readout::{FrameReadout, Header, HeaderType, Tag};
use leto_core::TrackingConfiguration;
use leto_daemon::orchestrator::{Config, Orchestrator};
use leto_daemon::resolver::StaticResolver;
use leto_wire::Response;
use serial_test::serial;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const INGRESS_PORT: u16 = 24801;
const EGRESS_PORT: u16 = 24802;

const TRACKER_BODY: &str = r#"case "$1" in
  --version) echo v0.4.2; exit 0;;
  --fetch-resolution) echo "4096 3000"; exit 0;;
  --fetch-firmware-variant) echo "1-df-camera"; exit 0;;
esac
trap 'exit 0' INT TERM
while :; do sleep 0.05; done"#;

fn script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

fn readout(id: i64) -> FrameReadout {
    let mut ro = FrameReadout {
        frame_id: id,
        timestamp: 10 * id,
        producer_uuid: "single-node".to_string(),
        width: 4096,
        height: 3000,
        tags: vec![Tag { id: id as u32, x: id as f64, y: 0.0, theta: 0.0 }],
        ..Default::default()
    };
    ro.set_wall_time(std::time::UNIX_EPOCH + Duration::from_micros(10 * id as u64));
    ro
}

#[tokio::test]
#[serial]
async fn single_node_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().join("data"),
        node_config_path: dir.path().join("leto.yml"),
        recovery_path: dir.path().join("current-experiment.yml"),
        system_config_path: dir.path().join("system.yml"),
        rpc_port: 0,
        ingress_port: INGRESS_PORT,
        egress_port: EGRESS_PORT,
        hostname: "nest-01".to_string(),
        artemis: script(dir.path(), "artemis", TRACKER_BODY),
        ffmpeg: script(dir.path(), "ffmpeg", "exit 0"),
    };
    let orch =
        Arc::new(Orchestrator::new(config, Arc::new(StaticResolver::default())).await.unwrap());

    // A low FPS keeps merge deadlines far away from wall-clock jitter
    let mut user = TrackingConfiguration::default();
    user.experiment_name = "spec-e1".to_string();
    user.camera.fps = Some(1.0);
    orch.start(&user).await.unwrap();

    let experiment_dir = match orch.status().await {
        Response::Status { experiment, .. } => experiment.unwrap().experiment_dir,
        other => panic!("unexpected status: {other:?}"),
    };

    // Live subscriber, reading continuously from the start
    let mut subscriber = TcpStream::connect(("127.0.0.1", EGRESS_PORT)).await.unwrap();
    let header: Header = read_delimited(&mut subscriber).await.unwrap().unwrap();
    assert_eq!(header.r#type(), HeaderType::Network);
    let subscriber_task = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Ok(Some(ro)) = read_delimited::<FrameReadout, _>(&mut subscriber).await {
            seen.push(ro.frame_id);
        }
        seen
    });

    // Synthetic producer in place of the tracker's data connection, paced
    // so no bounded channel in the fan-out ever overflows
    let mut producer = TcpStream::connect(("127.0.0.1", INGRESS_PORT)).await.unwrap();
    for id in 0..1000i64 {
        producer.write_all(&encode_delimited(&readout(id))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    producer.shutdown().await.unwrap();
    drop(producer);

    // Give the tail of the stream a moment to drain to disk
    tokio::time::sleep(Duration::from_millis(200)).await;
    orch.stop().await.unwrap();

    // The subscriber saw the merged stream in order, without duplicates
    let seen = subscriber_task.await.unwrap();
    assert_eq!(seen.len(), 1000, "continuous subscriber sees every frame");
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "strictly increasing frame IDs");

    // Exactly one finalized segment carrying the whole stream
    let mut reader =
        SegmentReader::open(&Path::new(&experiment_dir).join("tracking.0000.hermes.gz")).unwrap();
    assert_eq!((reader.header().width, reader.header().height), (4096, 3000));
    assert!(reader.header().previous.is_empty());
    let mut ids = Vec::new();
    while let Some(ro) = reader.next_readout().unwrap() {
        assert!(ro.producer_uuid.is_empty(), "identity is erased before persisting");
        assert_eq!(ro.timestamp, 10 * ro.frame_id, "stride 1 preserves payloads");
        assert_eq!(ro.tags.len(), 1);
        ids.push(ro.frame_id);
    }
    assert_eq!(ids, (0..1000).collect::<Vec<i64>>());
}
