// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Experiment lifecycle orchestration: start, stop, status, link.
//!
//! The orchestrator exclusively owns every channel, child process and file
//! of a running experiment. Start and Stop are serialized under one mutex;
//! teardown closes the channel graph in topological order (incoming →
//! merged → file/broadcast) so every subtask terminates via EOF.

mod start;

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use leto_core::config::ConfigError;
use leto_core::node::NodeError;
use leto_core::{
    NodeConfiguration, WorkloadError, ARTEMIS_IN_PORT, ARTEMIS_OUT_PORT, LETO_PORT,
    SLAVE_FIRMWARE_VARIANT,
};
use leto_wire::{ExperimentLog, ExperimentStatus, Request, Response};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::acceptor::RemoteManager;
use crate::recovery::RecoveryMarker;
use crate::resolver::{NodeResolver, ResolveError};
use crate::stream::StreamError;
use crate::tracker::{self, TrackerError};
use crate::writer::WriterError;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("already started")]
    AlreadyStarted,

    #[error("not running")]
    NotRunning,

    #[error("topology change not allowed while an experiment is running")]
    ChangeNotAllowedWhileRunning,

    #[error("this node ('{node}') is neither '{master}' nor '{slave}'")]
    NotInvolved { node: String, master: String, slave: String },

    #[error("firmware variant '{found}' does not match the slave variant '{expected}'")]
    FirmwareVariant { found: String, expected: String },

    #[error("peer '{node}' refused: {message}")]
    PeerRefused { node: String, message: String },

    #[error("incomplete configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Workload(#[from] WorkloadError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("RPC to '{node}' failed: {message}")]
    Rpc { node: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon configuration: well-known paths, ports and binaries.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for `fort-experiments/` (the XDG data dir by default).
    pub data_dir: PathBuf,
    /// Persistent node topology file.
    pub node_config_path: PathBuf,
    /// Recovery marker file.
    pub recovery_path: PathBuf,
    /// System-wide configuration defaults.
    pub system_config_path: PathBuf,
    pub rpc_port: u16,
    pub ingress_port: u16,
    pub egress_port: u16,
    /// Name this node goes by on the network.
    pub hostname: String,
    pub artemis: String,
    pub ffmpeg: String,
}

impl Config {
    pub fn load() -> Result<Self, ExperimentError> {
        let data_dir = crate::env::data_dir().ok_or_else(|| {
            ExperimentError::Io(std::io::Error::other("could not determine the data directory"))
        })?;
        let node_config_path = NodeConfiguration::default_path()?;
        let recovery_path = RecoveryMarker::default_path().unwrap_or_else(|| {
            data_dir.join("fort").join("leto").join("current-experiment.yml")
        });
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        Ok(Self {
            data_dir,
            node_config_path,
            recovery_path,
            system_config_path: PathBuf::from("/etc/default/leto.yml"),
            rpc_port: LETO_PORT,
            ingress_port: ARTEMIS_IN_PORT,
            egress_port: ARTEMIS_OUT_PORT,
            hostname,
            artemis: crate::env::artemis_path(),
            ffmpeg: crate::env::ffmpeg_path(),
        })
    }
}

/// Terminal state of the tracker child.
#[derive(Clone, Copy, Debug)]
enum TrackerExit {
    Status(ExitStatus),
    /// The child could not be reaped at all.
    Lost,
}

impl TrackerExit {
    fn success(self) -> bool {
        matches!(self, TrackerExit::Status(status) if status.success())
    }
}

/// A running experiment and the subtasks serving it.
struct Experiment {
    dir: PathBuf,
    since: DateTime<Utc>,
    yaml_configuration: String,
    test_mode: bool,
    tracker_pid: Option<i32>,
    /// Set by the monitor task once the tracker child is reaped.
    tracker_status: watch::Receiver<Option<TrackerExit>>,
    acceptor: Option<Arc<RemoteManager>>,
    tasks: Vec<JoinHandle<()>>,
    stderr_path: PathBuf,
    info_log_path: PathBuf,
}

struct State {
    node: NodeConfiguration,
    experiment: Option<Experiment>,
    last_log: Option<ExperimentLog>,
}

pub struct Orchestrator {
    config: Config,
    resolver: Arc<dyn NodeResolver>,
    state: Mutex<State>,
}

impl Orchestrator {
    /// Probe the external binaries and load the persistent topology.
    pub async fn new(
        config: Config,
        resolver: Arc<dyn NodeResolver>,
    ) -> Result<Self, ExperimentError> {
        let version = tracker::check_artemis(&config.artemis).await?;
        tracker::check_ffmpeg(&config.ffmpeg).await?;
        info!(tracker = %version, "external dependencies present");
        let node = NodeConfiguration::load_from(&config.node_config_path);
        Ok(Self {
            config,
            resolver,
            state: Mutex::new(State { node, experiment: None, last_log: None }),
        })
    }

    fn marker(&self) -> RecoveryMarker {
        RecoveryMarker::new(self.config.recovery_path.clone())
    }

    /// Re-issue Start with the stored configuration after a crash.
    pub async fn restore(self: &Arc<Self>) {
        let Some(config) = self.marker().load() else { return };
        info!("recovery marker present, restoring the interrupted experiment");
        if let Err(err) = self.start(&config).await {
            error!(error = %err, "could not restore the previous experiment");
        }
    }

    pub async fn status(&self) -> Response {
        let state = self.state.lock().await;
        Response::Status {
            master: state.node.master.clone(),
            slaves: state.node.slaves.clone(),
            experiment: state.experiment.as_ref().map(|exp| ExperimentStatus {
                since: exp.since,
                experiment_dir: exp.dir.display().to_string(),
                yaml_configuration: exp.yaml_configuration.clone(),
            }),
        }
    }

    pub async fn last_experiment_log(&self) -> Option<ExperimentLog> {
        self.state.lock().await.last_log.clone()
    }

    /// Stop the running experiment.
    pub async fn stop(&self) -> Result<(), ExperimentError> {
        let mut state = self.state.lock().await;
        let Some(experiment) = state.experiment.take() else {
            return Err(ExperimentError::NotRunning);
        };
        info!("stopping experiment");

        // 2. the experiment will not be restored after this point
        self.marker().clear();

        // 3. best-effort stop of every slave
        for slave in state.node.slaves.clone() {
            if let Err(err) = self.call_peer(&slave, &Request::StopTracking).await {
                warn!(slave = %slave, error = %err, "could not stop slave");
            }
        }

        let last_log = self.teardown(experiment, true).await;
        state.last_log = Some(last_log);
        info!("experiment done");
        Ok(())
    }

    /// Invoked by the monitor task when the tracker child exits on its own.
    async fn handle_tracker_exit(self: Arc<Self>) {
        let mut state = self.state.lock().await;
        let Some(experiment) = state.experiment.take() else {
            // Normal Stop already reaped everything
            return;
        };
        error!("tracker exited unexpectedly, tearing the experiment down");
        self.marker().clear();
        for slave in state.node.slaves.clone() {
            if let Err(err) = self.call_peer(&slave, &Request::StopTracking).await {
                warn!(slave = %slave, error = %err, "could not stop slave");
            }
        }
        let last_log = self.teardown(experiment, false).await;
        state.last_log = Some(last_log);
    }

    /// Steps 4-8 of Stop: interrupt the tracker, drain the subtask graph,
    /// build the snapshot, and clean a test-mode directory up.
    async fn teardown(&self, mut experiment: Experiment, interrupt: bool) -> ExperimentLog {
        // 4. interrupt the tracker child and wait for it
        if interrupt {
            if let Some(pid) = experiment.tracker_pid {
                let _ = nix::sys::signal::kill(
                    nix::unistd::Pid::from_raw(pid),
                    nix::sys::signal::Signal::SIGINT,
                );
            }
        }
        let exit = match experiment.tracker_status.wait_for(|status| status.is_some()).await {
            Ok(status) => (*status).unwrap_or(TrackerExit::Lost),
            Err(_) => TrackerExit::Lost,
        };

        // 5. close all producer connections; their EOF closes the incoming
        // channel, which drains the merger and everything downstream
        if let Some(acceptor) = experiment.acceptor.take() {
            acceptor.close();
        }

        // 6. wait for the whole graph to quiesce
        for task in experiment.tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(error = %err, "subtask ended abnormally");
            }
        }

        // 7. snapshot
        let has_error = !exit.success();
        let log = std::fs::read_to_string(&experiment.info_log_path).unwrap_or_default();
        let stderr = std::fs::read_to_string(&experiment.stderr_path).unwrap_or_default();
        let last_log = ExperimentLog {
            has_error,
            experiment_dir: experiment.dir.display().to_string(),
            start: experiment.since,
            end: Some(Utc::now()),
            yaml_configuration: experiment.yaml_configuration.clone(),
            log,
            stderr,
        };

        // 8. a test experiment leaves nothing behind
        if experiment.test_mode {
            if let Err(err) = std::fs::remove_dir_all(&experiment.dir) {
                warn!(error = %err, "could not remove test experiment directory");
            }
        }
        last_log
    }

    /// Link `slave` under `master`, updating whichever side this node is.
    pub async fn link(&self, master: &str, slave: &str) -> Result<(), ExperimentError> {
        let mut state = self.state.lock().await;
        if state.experiment.is_some() {
            return Err(ExperimentError::ChangeNotAllowedWhileRunning);
        }
        let node = self.config.hostname.clone();
        if slave == node {
            // Only a camera flashed with the slave firmware variant can
            // follow an external strobe
            let found = tracker::fetch_firmware_variant(&self.config.artemis).await?;
            if found != SLAVE_FIRMWARE_VARIANT {
                return Err(ExperimentError::FirmwareVariant {
                    found,
                    expected: SLAVE_FIRMWARE_VARIANT.to_string(),
                });
            }
            state.node.set_master(master)?;
            state.node.save_to(&self.config.node_config_path)?;
            info!(master, "enslaved to master");
            return Ok(());
        }
        if master == node {
            self.call_peer(slave, &Request::Link {
                master: master.to_string(),
                slave: slave.to_string(),
            })
            .await?;
            state.node.add_slave(slave)?;
            state.node.save_to(&self.config.node_config_path)?;
            info!(slave, "linked slave");
            return Ok(());
        }
        Err(ExperimentError::NotInvolved {
            node,
            master: master.to_string(),
            slave: slave.to_string(),
        })
    }

    pub async fn unlink(&self, master: &str, slave: &str) -> Result<(), ExperimentError> {
        let mut state = self.state.lock().await;
        if state.experiment.is_some() {
            return Err(ExperimentError::ChangeNotAllowedWhileRunning);
        }
        let node = self.config.hostname.clone();
        if slave == node {
            state.node.clear_master();
            state.node.save_to(&self.config.node_config_path)?;
            info!(master, "left master");
            return Ok(());
        }
        if master == node {
            if let Err(err) = self
                .call_peer(slave, &Request::Unlink {
                    master: master.to_string(),
                    slave: slave.to_string(),
                })
                .await
            {
                warn!(slave, error = %err, "slave did not acknowledge unlink");
            }
            state.node.remove_slave(slave)?;
            state.node.save_to(&self.config.node_config_path)?;
            info!(slave, "unlinked slave");
            return Ok(());
        }
        Err(ExperimentError::NotInvolved {
            node,
            master: master.to_string(),
            slave: slave.to_string(),
        })
    }

    /// One request/response RPC to a named peer.
    async fn call_peer(&self, name: &str, request: &Request) -> Result<(), ExperimentError> {
        let peer = self.resolver.resolve(name).await?;
        let response = leto_wire::client::call(&peer.endpoint(), request, crate::env::rpc_timeout())
            .await
            .map_err(|err| ExperimentError::Rpc {
                node: name.to_string(),
                message: err.to_string(),
            })?;
        match response {
            Response::Error { message } => {
                Err(ExperimentError::PeerRefused { node: name.to_string(), message })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
