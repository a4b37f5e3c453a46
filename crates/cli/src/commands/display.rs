// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leto-cli display-frame-readout` - print a node's live merged stream.

use anyhow::{bail, Context, Result};
use leto_core::hermes::read_delimited;
use leto_core::readout::{FrameReadout, Header, HeaderType};
use leto_core::ARTEMIS_OUT_PORT;
use leto_daemon::resolver::{AvahiResolver, NodeResolver};
use tokio::net::TcpStream;

pub async fn run(node: &str) -> Result<()> {
    let resolved = AvahiResolver::new()
        .resolve(node)
        .await
        .with_context(|| format!("could not resolve '{node}'"))?;
    let endpoint = format!("{}:{}", resolved.address, ARTEMIS_OUT_PORT);
    let mut stream = TcpStream::connect(&endpoint)
        .await
        .with_context(|| format!("could not subscribe to {endpoint}"))?;

    let header: Header = read_delimited(&mut stream)
        .await?
        .context("stream closed before the header")?;
    if header.r#type() != HeaderType::Network {
        bail!("'{node}' did not greet with a network header");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            readout = read_delimited::<FrameReadout, _>(&mut stream) => {
                let Some(ro) = readout? else { return Ok(()) };
                print_readout(&ro);
            }
        }
    }
}

fn print_readout(ro: &FrameReadout) {
    let time = ro
        .wall_time()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "frame: {}, time: {time}, tags: {}, error: {:?}",
        ro.frame_id,
        ro.tags.len(),
        ro.error()
    );
}
