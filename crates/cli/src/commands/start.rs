// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leto-cli start` - start tracking on a node.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use leto_core::TrackingConfiguration;
use leto_wire::Request;

use crate::client;

#[derive(Args)]
pub struct StartArgs {
    /// Node name
    pub node: String,

    /// Configuration file; only the fields it sets override the node's
    /// defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Experiment name; omit it to run in test mode
    #[arg(short, long)]
    pub experiment: Option<String>,

    /// Camera FPS override
    #[arg(long)]
    pub fps: Option<f64>,
}

pub async fn run(args: StartArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TrackingConfiguration::from_yaml_file(path)
            .with_context(|| format!("could not load '{}'", path.display()))?,
        None => TrackingConfiguration::default(),
    };
    if let Some(experiment) = args.experiment {
        config.experiment_name = experiment;
    }
    if let Some(fps) = args.fps {
        config.camera.fps = Some(fps);
    }

    client::call_node(&args.node, &Request::StartTracking { config: Box::new(config) }).await?;
    println!("Started tracking on {}", args.node);
    Ok(())
}
