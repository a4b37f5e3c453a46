// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use leto_core::TrackingConfiguration;

use super::*;
use crate::{decode, encode};

#[test]
fn requests_are_tagged_by_type() {
    let encoded = encode(&Request::StopTracking).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(json["type"], "StopTracking");
}

#[test]
fn start_tracking_carries_only_the_set_fields() {
    let mut config = TrackingConfiguration::default();
    config.experiment_name = "colony-7".to_string();
    config.camera.fps = Some(4.0);

    let encoded = encode(&Request::StartTracking { config: Box::new(config.clone()) }).unwrap();
    let back: Request = decode(&encoded).unwrap();
    assert_eq!(back, Request::StartTracking { config: Box::new(config) });

    // Unset leaves are absent from the payload, not null
    let json: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
    assert!(json["config"]["camera"].get("strobe-duration").is_none());
}

#[test]
fn link_roundtrips_both_node_names() {
    let request = Request::Link { master: "nest-01".to_string(), slave: "nest-02".to_string() };
    let back: Request = decode(&encode(&request).unwrap()).unwrap();
    assert_eq!(back, request);
}
