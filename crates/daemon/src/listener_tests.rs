// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use leto_core::TrackingConfiguration;
use leto_wire::{client, Request, Response};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::orchestrator::Config;
use crate::resolver::StaticResolver;

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

async fn serve(dir: &Path) -> (String, CancellationToken, Arc<Orchestrator>) {
    let config = Config {
        data_dir: dir.join("data"),
        node_config_path: dir.join("leto.yml"),
        recovery_path: dir.join("current-experiment.yml"),
        system_config_path: dir.join("system.yml"),
        rpc_port: 0,
        ingress_port: 0,
        egress_port: 0,
        hostname: "nest-01".to_string(),
        artemis: script(dir, "artemis", TRACKER_BODY),
        ffmpeg: script(dir, "ffmpeg", "exit 0"),
    };
    let orchestrator =
        Arc::new(Orchestrator::new(config, Arc::new(StaticResolver::default())).await.unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = listener.local_addr().unwrap().to_string();
    let shutdown = CancellationToken::new();
    tokio::spawn(run(listener, Arc::clone(&orchestrator), shutdown.clone()));
    (endpoint, shutdown, orchestrator)
}

async fn call(endpoint: &str, request: Request) -> Response {
    client::call(endpoint, &request, Duration::from_secs(5)).await.unwrap()
}

#[tokio::test]
async fn full_request_cycle_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, shutdown, _orch) = serve(dir.path()).await;

    // Nothing ran yet
    match call(&endpoint, Request::LastExperimentLog).await {
        Response::Error { message } => assert!(message.contains("no finished experiment")),
        other => panic!("unexpected response: {other:?}"),
    }

    // Start in test mode
    let request = Request::StartTracking { config: Box::new(TrackingConfiguration::default()) };
    assert_eq!(call(&endpoint, request).await, Response::Ok);

    match call(&endpoint, Request::Status).await {
        Response::Status { master, slaves, experiment } => {
            assert!(master.is_empty());
            assert!(slaves.is_empty());
            assert!(experiment.is_some());
        }
        other => panic!("unexpected response: {other:?}"),
    }

    // A second start is a structured error, not a dropped connection
    let request = Request::StartTracking { config: Box::new(TrackingConfiguration::default()) };
    match call(&endpoint, request).await {
        Response::Error { message } => assert!(message.contains("already started")),
        other => panic!("unexpected response: {other:?}"),
    }

    assert_eq!(call(&endpoint, Request::StopTracking).await, Response::Ok);
    match call(&endpoint, Request::LastExperimentLog).await {
        Response::LastExperimentLog(log) => assert!(!log.has_error),
        other => panic!("unexpected response: {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn link_errors_travel_back_as_structured_responses() {
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, shutdown, _orch) = serve(dir.path()).await;

    // nest-01 is the master side, nest-02 cannot be resolved
    let request = Request::Link { master: "nest-01".to_string(), slave: "nest-02".to_string() };
    match call(&endpoint, request).await {
        Response::Error { message } => assert!(message.contains("unknown node")),
        other => panic!("unexpected response: {other:?}"),
    }

    // A node that is neither side refuses outright
    let request = Request::Link { master: "nest-08".to_string(), slave: "nest-09".to_string() };
    match call(&endpoint, request).await {
        Response::Error { message } => assert!(message.contains("neither")),
        other => panic!("unexpected response: {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn half_open_connections_do_not_wedge_the_listener() {
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, shutdown, _orch) = serve(dir.path()).await;

    // Connect and say nothing; the request read times out server-side
    let silent = tokio::net::TcpStream::connect(&endpoint).await.unwrap();

    // The listener still serves others
    match call(&endpoint, Request::Status).await {
        Response::Status { .. } => {}
        other => panic!("unexpected response: {other:?}"),
    }
    drop(silent);
    shutdown.cancel();
}
