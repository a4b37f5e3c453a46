// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

fn complete() -> TrackingConfiguration {
    let mut config = TrackingConfiguration::recommended();
    config.loads = Some(LoadBalancing {
        self_uuid: "single-node".to_string(),
        uuids: [("localhost".to_string(), "single-node".to_string())].into(),
        assignments: [(0, "single-node".to_string())].into(),
        width: 0,
        height: 0,
    });
    config
}

#[test]
fn merge_overlays_only_set_fields() {
    let mut config = TrackingConfiguration::recommended();
    let user = TrackingConfiguration {
        experiment_name: "colony-7".to_string(),
        camera: CameraConfiguration { fps: Some(12.5), ..Default::default() },
        detection: TagDetectionConfiguration {
            family: Some("36ARTag".to_string()),
            quad: QuadDetectionConfiguration { sigma: Some(0.8), ..Default::default() },
        },
        ..Default::default()
    };

    config.merge(&user);

    assert_eq!(config.experiment_name, "colony-7");
    assert_eq!(config.camera.fps, Some(12.5));
    assert_eq!(config.detection.family.as_deref(), Some("36ARTag"));
    assert_eq!(config.detection.quad.sigma, Some(0.8));
    // Untouched leaves keep their defaults
    assert_eq!(config.camera.strobe_duration, Some(Duration::from_micros(1500)));
    assert_eq!(config.detection.quad.min_bw_diff, Some(50));
    assert_eq!(config.stream.bitrate_kb, Some(2000));
}

#[test]
fn merge_from_default_is_a_noop() {
    let mut config = complete();
    let before = config.clone();
    config.merge(&TrackingConfiguration::default());
    assert_eq!(config, before);
}

#[test]
fn merge_keeps_experiment_name_when_other_is_empty() {
    let mut config = TrackingConfiguration::recommended();
    config.experiment_name = "colony-7".to_string();
    config.merge(&TrackingConfiguration::default());
    assert_eq!(config.experiment_name, "colony-7");
}

#[test]
fn check_reports_the_missing_field_by_name() {
    let config = TrackingConfiguration::recommended();
    // recommended() leaves loads for the planner
    match config.check_all_fields_are_set() {
        Err(ConfigError::MissingField(name)) => assert_eq!(name, "load-balancing"),
        other => panic!("expected missing load-balancing, got {other:?}"),
    }

    let mut config = complete();
    config.camera.fps = None;
    match config.check_all_fields_are_set() {
        Err(ConfigError::MissingField(name)) => assert_eq!(name, "camera.fps"),
        other => panic!("expected missing camera.fps, got {other:?}"),
    }

    complete().check_all_fields_are_set().unwrap();
}

#[test]
fn yaml_roundtrip_preserves_durations_and_loads() {
    let mut config = complete();
    config.experiment_name = "colony-7".to_string();
    config.camera.strobe_duration = Some(Duration::from_micros(1500));
    config.image_renew_period = Some(Duration::from_secs(7200));

    let text = config.to_yaml().unwrap();
    let back = TrackingConfiguration::from_yaml(&text).unwrap();
    assert_eq!(back, config);
}

#[test]
fn partial_yaml_only_sets_named_fields() {
    let text = "experiment: colony-7\ncamera:\n  fps: 4.0\n";
    let config = TrackingConfiguration::from_yaml(text).unwrap();
    assert_eq!(config.experiment_name, "colony-7");
    assert_eq!(config.camera.fps, Some(4.0));
    assert!(config.camera.strobe_duration.is_none());
    assert!(config.legacy_mode.is_none());
    assert!(config.loads.is_none());
}

#[test]
fn load_default_reverts_to_recommended_on_missing_system_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrackingConfiguration::load_default_from(&dir.path().join("leto.yml"));
    assert_eq!(config, TrackingConfiguration::recommended());
}

#[test]
fn load_default_overlays_the_system_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leto.yml");
    std::fs::write(&path, "stream:\n  bitrate: 4000\n").unwrap();

    let config = TrackingConfiguration::load_default_from(&path);
    assert_eq!(config.stream.bitrate_kb, Some(4000));
    assert_eq!(config.camera.fps, Some(8.0));
}
