// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracking configuration tree.
//!
//! Every leaf is an `Option`: a user-supplied configuration only carries the
//! fields the user actually set, and `merge` overlays those onto the
//! recommended defaults. Validation rejects any leaf still unset after the
//! merge, so the effective configuration handed to the orchestrator is
//! complete.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read { path: String, source: std::io::Error },

    #[error("could not write '{path}': {source}")]
    Write { path: String, source: std::io::Error },

    #[error("could not parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("field '{0}' is not set")]
    MissingField(&'static str),
}

/// Overlay the set fields of `$src` onto `$dst`, leaving unset ones alone.
macro_rules! overlay {
    ($dst:expr, $src:expr, [$($field:ident),+ $(,)?]) => {
        $( if $src.$field.is_some() { $dst.$field = $src.$field.clone(); } )+
    };
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct QuadDetectionConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refine_edges: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cluster_pixel: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_n_maxima: Option<i32>,
    #[serde(rename = "critical-angle-radian", skip_serializing_if = "Option::is_none")]
    pub critical_radian: Option<f64>,
    #[serde(rename = "max-line-mean-square-error", skip_serializing_if = "Option::is_none")]
    pub max_line_mse: Option<f64>,
    #[serde(rename = "min-black-white-diff", skip_serializing_if = "Option::is_none")]
    pub min_bw_diff: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deglitch: Option<bool>,
}

impl QuadDetectionConfiguration {
    pub fn recommended() -> Self {
        Self {
            decimate: Some(1.0),
            sigma: Some(0.0),
            refine_edges: Some(false),
            min_cluster_pixel: Some(25),
            max_n_maxima: Some(10),
            critical_radian: Some(10.0_f64.to_radians()),
            max_line_mse: Some(10.0),
            min_bw_diff: Some(50),
            deglitch: Some(false),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        overlay!(self, other, [
            decimate,
            sigma,
            refine_edges,
            min_cluster_pixel,
            max_n_maxima,
            critical_radian,
            max_line_mse,
            min_bw_diff,
            deglitch,
        ]);
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.decimate.ok_or(ConfigError::MissingField("apriltag.quad.decimate"))?;
        self.sigma.ok_or(ConfigError::MissingField("apriltag.quad.sigma"))?;
        self.refine_edges.ok_or(ConfigError::MissingField("apriltag.quad.refine-edges"))?;
        self.min_cluster_pixel
            .ok_or(ConfigError::MissingField("apriltag.quad.min-cluster-pixel"))?;
        self.max_n_maxima.ok_or(ConfigError::MissingField("apriltag.quad.max-n-maxima"))?;
        self.critical_radian
            .ok_or(ConfigError::MissingField("apriltag.quad.critical-angle-radian"))?;
        self.max_line_mse
            .ok_or(ConfigError::MissingField("apriltag.quad.max-line-mean-square-error"))?;
        self.min_bw_diff.ok_or(ConfigError::MissingField("apriltag.quad.min-black-white-diff"))?;
        self.deglitch.ok_or(ConfigError::MissingField("apriltag.quad.deglitch"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TagDetectionConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub quad: QuadDetectionConfiguration,
}

impl TagDetectionConfiguration {
    pub fn recommended() -> Self {
        Self { family: Some("36h11".to_string()), quad: QuadDetectionConfiguration::recommended() }
    }

    pub fn merge(&mut self, other: &Self) {
        self.quad.merge(&other.quad);
        overlay!(self, other, [family]);
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.family.as_ref().ok_or(ConfigError::MissingField("apriltag.family"))?;
        self.quad.check()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CameraConfiguration {
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub strobe_delay: Option<Duration>,
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub strobe_duration: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

impl CameraConfiguration {
    pub fn recommended() -> Self {
        Self {
            strobe_delay: Some(Duration::ZERO),
            strobe_duration: Some(Duration::from_micros(1500)),
            fps: Some(8.0),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        overlay!(self, other, [strobe_delay, strobe_duration, fps]);
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.strobe_delay.ok_or(ConfigError::MissingField("camera.strobe-delay"))?;
        self.strobe_duration.ok_or(ConfigError::MissingField("camera.strobe-duration"))?;
        self.fps.ok_or(ConfigError::MissingField("camera.fps"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StreamConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(rename = "bitrate", skip_serializing_if = "Option::is_none")]
    pub bitrate_kb: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_max_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(rename = "tuning", skip_serializing_if = "Option::is_none")]
    pub tune: Option<String>,
}

impl StreamConfiguration {
    pub fn recommended() -> Self {
        Self {
            host: Some(String::new()),
            bitrate_kb: Some(2000),
            bitrate_max_ratio: Some(1.5),
            quality: Some("fast".to_string()),
            tune: Some("film".to_string()),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        overlay!(self, other, [host, bitrate_kb, bitrate_max_ratio, quality, tune]);
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.host.as_ref().ok_or(ConfigError::MissingField("stream.host"))?;
        self.bitrate_kb.ok_or(ConfigError::MissingField("stream.bitrate"))?;
        self.bitrate_max_ratio.ok_or(ConfigError::MissingField("stream.bitrate-max-ratio"))?;
        self.quality.as_ref().ok_or(ConfigError::MissingField("stream.quality"))?;
        self.tune.as_ref().ok_or(ConfigError::MissingField("stream.tuning"))?;
        Ok(())
    }
}

/// Frame-striping descriptor computed by the master and propagated to every
/// slave with `self_uuid` re-stamped to the receiver's identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadBalancing {
    #[serde(rename = "self-UUID")]
    pub self_uuid: String,
    /// Node name to producer identity.
    #[serde(rename = "UUIDs")]
    pub uuids: BTreeMap<String, String>,
    /// Frame slot (`id mod stride`) to owning producer identity.
    #[serde(rename = "assignation")]
    pub assignments: BTreeMap<i32, String>,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
}

impl LoadBalancing {
    pub fn stride(&self) -> usize {
        self.assignments.len()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TrackingConfiguration {
    /// Experiment name; empty means test mode.
    #[serde(rename = "experiment")]
    pub experiment_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_mode: Option<bool>,
    #[serde(rename = "new-ant-roi", skip_serializing_if = "Option::is_none")]
    pub new_ant_output_roi_size: Option<i32>,
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub image_renew_period: Option<Duration>,
    pub stream: StreamConfiguration,
    pub camera: CameraConfiguration,
    #[serde(rename = "apriltag")]
    pub detection: TagDetectionConfiguration,
    /// Tag IDs the tracker should highlight in its preview output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<u32>>,
    #[serde(rename = "load-balancing", skip_serializing_if = "Option::is_none")]
    pub loads: Option<LoadBalancing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<i32>,
}

impl TrackingConfiguration {
    /// Library defaults; a complete configuration apart from `loads`,
    /// which only the workload planner can provide.
    pub fn recommended() -> Self {
        Self {
            experiment_name: String::new(),
            legacy_mode: Some(false),
            new_ant_output_roi_size: Some(600),
            image_renew_period: Some(Duration::from_secs(2 * 3600)),
            stream: StreamConfiguration::recommended(),
            camera: CameraConfiguration::recommended(),
            detection: TagDetectionConfiguration::recommended(),
            highlights: Some(Vec::new()),
            loads: None,
            threads: Some(0),
        }
    }

    /// Overlay the set fields of `other` onto `self`.
    ///
    /// A fully-default `other` is a no-op; the experiment name is only taken
    /// when non-empty.
    pub fn merge(&mut self, other: &Self) {
        self.stream.merge(&other.stream);
        self.camera.merge(&other.camera);
        self.detection.merge(&other.detection);
        if !other.experiment_name.is_empty() {
            self.experiment_name = other.experiment_name.clone();
        }
        overlay!(self, other, [
            legacy_mode,
            new_ant_output_roi_size,
            image_renew_period,
            highlights,
            loads,
            threads,
        ]);
    }

    /// Every leaf must be set before an experiment can start.
    pub fn check_all_fields_are_set(&self) -> Result<(), ConfigError> {
        self.legacy_mode.ok_or(ConfigError::MissingField("legacy-mode"))?;
        self.new_ant_output_roi_size.ok_or(ConfigError::MissingField("new-ant-roi"))?;
        self.image_renew_period.ok_or(ConfigError::MissingField("image-renew-period"))?;
        self.highlights.as_ref().ok_or(ConfigError::MissingField("highlights"))?;
        self.loads.as_ref().ok_or(ConfigError::MissingField("load-balancing"))?;
        self.threads.ok_or(ConfigError::MissingField("threads"))?;
        self.stream.check()?;
        self.camera.check()?;
        self.detection.check()
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write_yaml_file(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_yaml()?;
        std::fs::write(path, text)
            .map_err(|source| ConfigError::Write { path: path.display().to_string(), source })
    }

    /// Recommended defaults overlaid with the system configuration file.
    ///
    /// A missing or unparseable system file reverts to the plain defaults.
    pub fn load_default_from(system_path: &Path) -> Self {
        let mut res = Self::recommended();
        match Self::from_yaml_file(system_path) {
            Ok(system) => res.merge(&system),
            Err(err) => {
                tracing::debug!(path = %system_path.display(), error = %err,
                    "no system configuration, using library defaults");
            }
        }
        res
    }

    pub fn load_default() -> Self {
        Self::load_default_from(Path::new("/etc/default/leto.yml"))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
