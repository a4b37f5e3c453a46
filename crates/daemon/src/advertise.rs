// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DNS-SD advertisement of this daemon.
//!
//! Best effort: a host without the avahi tools still runs, it just cannot
//! be discovered by name.

use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Keeps the `_leto._tcp` advertisement alive for the daemon's lifetime.
pub struct Advertiser {
    child: Option<Child>,
}

impl Advertiser {
    /// Advertise `leto.<node>` on `_leto._tcp` at `port`.
    pub fn start(node: &str, port: u16) -> Self {
        let mut cmd = Command::new("avahi-publish-service");
        cmd.arg(format!("leto.{node}"))
            .arg("_leto._tcp")
            .arg(port.to_string())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        match cmd.spawn() {
            Ok(child) => {
                info!(node, port, "advertising _leto._tcp");
                Self { child: Some(child) }
            }
            Err(err) => {
                warn!(error = %err, "could not advertise service, continuing without DNS-SD");
                Self { child: None }
            }
        }
    }

    pub async fn stop(mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
    }
}
