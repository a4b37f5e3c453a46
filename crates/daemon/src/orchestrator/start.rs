// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Experiment start: configuration merge, workload planning, directory and
//! subtask setup, tracker spawn, slave propagation, recovery marker.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leto_core::{
    filename_without_overwrite, FrameReadout, TrackingConfiguration, WorkloadBalance,
    ARTEMIS_IN_PORT,
};
use leto_wire::Request;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Experiment, ExperimentError, Orchestrator, TrackerExit};
use crate::acceptor::RemoteManager;
use crate::broadcaster::broadcast_frame_readouts;
use crate::merger::merge_frame_readouts;
use crate::planner::{plan_for_slave, plan_workload};
use crate::reader;
use crate::stream::StreamManager;
use crate::tracker::{self, TrackerSpec};
use crate::writer::FrameReadoutFileWriter;

impl Orchestrator {
    /// Start an experiment (idempotent-fail: a second Start is rejected).
    pub async fn start(
        self: &Arc<Self>,
        user_config: &TrackingConfiguration,
    ) -> Result<(), ExperimentError> {
        let mut state = self.state.lock().await;

        // 1. reject when running
        if state.experiment.is_some() {
            return Err(ExperimentError::AlreadyStarted);
        }

        // 2. defaults <- system file <- caller
        let mut config = TrackingConfiguration::load_default_from(&self.config.system_config_path);
        config.merge(user_config);

        // 3. on the master, plan the workload; fetching the camera
        // resolution is only needed when slaves must match it
        let is_master = state.node.is_master();
        if is_master {
            let (width, height) = if state.node.slaves.is_empty() {
                (0, 0)
            } else {
                tracker::fetch_resolution(&self.config.artemis).await?
            };
            config.loads =
                Some(plan_workload(&self.config.hostname, &state.node, width, height));
        }

        // 4. every field must be resolved by now
        config.check_all_fields_are_set()?;

        // 5. an empty experiment name means test mode
        let test_mode = config.experiment_name.is_empty();
        if test_mode {
            info!("starting in test mode");
            config.stream.host = Some(String::new());
            config.experiment_name = "!!IN TEST MODE!!".to_string();
        } else {
            info!(experiment = %config.experiment_name, "new experiment");
        }

        // 6. experiment directory
        let base = if test_mode {
            std::env::temp_dir().join("fort-tests")
        } else {
            self.config.data_dir.join("fort-experiments")
        };
        std::fs::create_dir_all(&base)?;
        let (dir, _) = filename_without_overwrite(&base.join(&config.experiment_name))?;
        std::fs::create_dir_all(&dir)?;

        let loads = config.loads.clone().unwrap_or_default();
        let fps = config.camera.fps.unwrap_or(8.0);
        let stride = loads.stride();
        let frame_ids: Vec<i64> = loads
            .assignments
            .iter()
            .filter(|(_, uuid)| **uuid == loads.self_uuid)
            .map(|(slot, _)| *slot as i64)
            .collect();

        // 7. master subgraph resources (bind before the tracker spawns so
        // its first connection lands in the backlog)
        let mut master_graph = None;
        if is_master {
            let wb = WorkloadBalance::from_load_balancing(&loads, fps)?;
            let ingress =
                TcpListener::bind(("0.0.0.0", self.config.ingress_port)).await?;
            let egress = TcpListener::bind(("0.0.0.0", self.config.egress_port)).await?;
            std::fs::create_dir_all(dir.join("ants"))?;
            let stream = StreamManager::new(
                dir.clone(),
                fps,
                &config.stream,
                self.config.hostname.clone(),
            )?
            .with_ffmpeg(&self.config.ffmpeg);
            master_graph = Some((wb, ingress, egress, stream));
        }

        // 8. tracker child command
        let (tracker_host, tracker_port) = if is_master {
            ("localhost".to_string(), self.config.ingress_port)
        } else {
            let master = state.node.master.clone();
            match self.resolver.resolve(&master).await {
                Ok(node) => (node.address, ARTEMIS_IN_PORT),
                Err(err) => {
                    debug!(master = %master, error = %err, "master not discoverable, dialing by name");
                    (master, ARTEMIS_IN_PORT)
                }
            }
        };
        let slave_resolution = (!is_master && loads.width > 0 && loads.height > 0)
            .then_some((loads.width, loads.height));
        let spec = TrackerSpec {
            config: &config,
            self_uuid: &loads.self_uuid,
            host: &tracker_host,
            port: tracker_port,
            experiment_dir: &dir,
            test_mode,
            is_master,
            slave_resolution,
            stride,
            frame_ids,
        };
        let args = tracker::tracking_args(&spec);
        std::fs::write(
            dir.join("artemis.command"),
            format!("{} {}\n", self.config.artemis, args.join(" ")),
        )?;
        let stderr_path = dir.join("artemis.stderr");
        let stderr_file = std::fs::File::create(&stderr_path)?;

        // 9. back the effective configuration up next to the data
        config.write_yaml_file(&dir.join("leto-final-config.yml"))?;
        let yaml_configuration = config.to_yaml()?;

        // 10. tracker child first, then the subtask graph
        let mut cmd = tokio::process::Command::new(&self.config.artemis);
        cmd.args(&args).stdin(Stdio::null()).stderr(Stdio::from(stderr_file));
        if is_master {
            cmd.stdout(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null());
        }
        let mut child = cmd.spawn().map_err(|source| tracker::TrackerError::Probe {
            binary: self.config.artemis.clone(),
            source,
        })?;
        let tracker_pid = child.id().map(|pid| pid as i32);
        let tracker_stdout = child.stdout.take();

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        let mut acceptor = None;
        if let Some((wb, ingress, egress, stream)) = master_graph {
            let manager = Arc::new(RemoteManager::new());
            acceptor = Some(Arc::clone(&manager));
            tasks.extend(spawn_master_graph(wb, fps, &dir, manager, ingress, egress));
            if let Some(stdout) = tracker_stdout {
                let stream = Arc::new(stream);
                tasks.push(tokio::spawn(async move {
                    stream.encode_and_stream(stdout).await;
                }));
            }
        }

        // Monitor owns the child; it reports the exit status and tears the
        // experiment down if the tracker dies on its own
        let (status_tx, status_rx) = watch::channel(None);
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => {
                    info!(%status, "tracker exited");
                    TrackerExit::Status(status)
                }
                Err(err) => {
                    error!(error = %err, "could not wait on the tracker child");
                    TrackerExit::Lost
                }
            };
            let _ = status_tx.send(Some(exit));
            monitor.handle_tracker_exit().await;
        });

        // Propagate to the slaves, each under its own identity; slave
        // failures degrade the experiment, they do not abort it
        if is_master {
            for slave in state.node.slaves.clone() {
                let Some(slave_loads) = plan_for_slave(&loads, &slave) else {
                    warn!(slave = %slave, "slave missing from the workload plan");
                    continue;
                };
                let mut slave_config = config.clone();
                slave_config.loads = Some(slave_loads);
                let request = Request::StartTracking { config: Box::new(slave_config) };
                if let Err(err) = self.call_peer(&slave, &request).await {
                    warn!(slave = %slave, error = %err, "could not start slave");
                }
            }
        }

        // 11. from here on a crash restores the experiment
        if let Err(err) = self.marker().save(&config) {
            warn!(error = %err, "could not persist the recovery marker");
        }

        // 12. running
        info!(dir = %dir.display(), "tracking started");
        state.experiment = Some(Experiment {
            info_log_path: dir.join("artemis.INFO"),
            stderr_path,
            since: Utc::now(),
            yaml_configuration,
            test_mode,
            tracker_pid,
            tracker_status: status_rx,
            acceptor,
            tasks,
            dir,
        });
        Ok(())
    }
}

/// Wire and spawn the merge/file/broadcast subtasks of the master.
fn spawn_master_graph(
    wb: WorkloadBalance,
    fps: f64,
    dir: &std::path::Path,
    manager: Arc<RemoteManager>,
    ingress: TcpListener,
    egress: TcpListener,
) -> Vec<JoinHandle<()>> {
    let (incoming_tx, incoming_rx) = mpsc::channel::<FrameReadout>(10);
    let (merged_tx, mut merged_rx) = mpsc::channel::<FrameReadout>(10);
    let (file_tx, file_rx) = mpsc::channel::<FrameReadout>(200);
    let (broadcast_tx, broadcast_rx) = mpsc::channel::<FrameReadout>(10);

    let mut tasks = Vec::new();

    // Acceptor: one reader task per producer connection; when the acceptor
    // closes and every reader returned, dropping `incoming_tx` here closes
    // the merger input
    let on_accept = move |stream: TcpStream, token: CancellationToken| {
        let incoming = incoming_tx.clone();
        async move {
            let (err_tx, mut err_rx) = mpsc::channel(16);
            let log_task = tokio::spawn(async move {
                while let Some(err) = err_rx.recv().await {
                    warn!(error = %err, "producer stream error");
                }
            });
            tokio::select! {
                _ = token.cancelled() => {}
                _ = reader::read_all(stream, incoming, err_tx) => {}
            }
            let _ = log_task.await;
        }
    };
    tasks.push(tokio::spawn(manager.listen(ingress, on_accept, || {
        info!("all producer connections closed");
    })));

    // Merger
    tasks.push(tokio::spawn(async move {
        if let Err(err) = merge_frame_readouts(&wb, incoming_rx, merged_tx).await {
            error!(error = %err, "merger refused the workload plan");
        }
    }));

    // Fan-out: freshness beats completeness, a full downstream drops the
    // frame rather than stalling the merger
    tasks.push(tokio::spawn(async move {
        while let Some(readout) = merged_rx.recv().await {
            if file_tx.try_send(readout.clone()).is_err() {
                debug!("file channel full, dropping frame");
            }
            if broadcast_tx.try_send(readout).is_err() {
                debug!("broadcast channel full, dropping frame");
            }
        }
    }));

    // File writer
    let writer = FrameReadoutFileWriter::new(dir.join("tracking.hermes.gz"));
    tasks.push(tokio::spawn(async move {
        if let Err(err) = writer.write_all(file_rx).await {
            error!(error = %err, "tracking file writer failed");
        }
    }));

    // Broadcaster: a subscriber may lag three frame periods before eviction
    let write_deadline = Duration::from_secs_f64(3.0 / fps);
    tasks.push(tokio::spawn(broadcast_frame_readouts(egress, broadcast_rx, write_deadline)));

    tasks
}
