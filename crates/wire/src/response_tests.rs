// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Utc;

use super::*;
use crate::{decode, encode};

#[test]
fn from_result_collapses_to_ok_or_error() {
    assert_eq!(Response::from_result(Ok(())), Response::Ok);
    assert_eq!(
        Response::from_result(Err("already started".to_string())),
        Response::Error { message: "already started".to_string() }
    );
}

#[test]
fn status_with_running_experiment_roundtrips() {
    let response = Response::Status {
        master: String::new(),
        slaves: vec!["nest-02".to_string()],
        experiment: Some(ExperimentStatus {
            since: Utc::now(),
            experiment_dir: "/data/fort-experiments/colony-7.0000".to_string(),
            yaml_configuration: "experiment: colony-7\n".to_string(),
        }),
    };
    let back: Response = decode(&encode(&response).unwrap()).unwrap();
    assert_eq!(back, response);
}

#[test]
fn experiment_log_keeps_an_open_end_as_null() {
    let log = ExperimentLog {
        has_error: true,
        experiment_dir: "/data/fort-experiments/colony-7.0000".to_string(),
        start: Utc::now(),
        end: None,
        yaml_configuration: String::new(),
        log: "I0101 frame 12\n".to_string(),
        stderr: "terminate called\n".to_string(),
    };
    let back: Response = decode(&encode(&Response::LastExperimentLog(Box::new(log.clone()))).unwrap()).unwrap();
    assert_eq!(back, Response::LastExperimentLog(Box::new(log)));
}
