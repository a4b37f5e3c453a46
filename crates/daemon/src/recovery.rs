// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent experiment recovery marker.
//!
//! Written atomically once Start succeeds and removed on clean Stop, so a
//! crashed daemon restores the interrupted experiment at startup.

use std::path::PathBuf;

use leto_core::config::ConfigError;
use leto_core::TrackingConfiguration;
use tracing::warn;

pub struct RecoveryMarker {
    path: PathBuf,
}

impl RecoveryMarker {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location under the user data directory.
    pub fn default_path() -> Option<PathBuf> {
        crate::env::data_dir().map(|d| d.join("fort").join("leto").join("current-experiment.yml"))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist the effective configuration, atomically (write + rename).
    pub fn save(&self, config: &TrackingConfiguration) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("yml.tmp");
        config.write_yaml_file(&tmp)?;
        std::fs::rename(&tmp, &self.path).map_err(|source| ConfigError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// The stored configuration, or `None` when absent or unreadable.
    pub fn load(&self) -> Option<TrackingConfiguration> {
        if !self.path.exists() {
            return None;
        }
        match TrackingConfiguration::from_yaml_file(&self.path) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err,
                    "unreadable recovery marker, ignoring it");
                None
            }
        }
    }

    /// Remove the marker; a missing file is fine.
    pub fn clear(&self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err,
                    "could not remove recovery marker");
            }
        }
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
