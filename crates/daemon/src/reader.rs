// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection frame readout reader.
//!
//! Decodes the varint-length-prefixed readout stream of one producer
//! connection into the shared incoming channel.

use leto_core::hermes::{self, HermesError};
use leto_core::FrameReadout;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

/// Read every readout from `stream` until EOF or an unrecoverable error.
///
/// Decoded messages go to `out`; decode and IO errors that are not EOF go to
/// `errs`. A decode error leaves the framing intact, so reading continues;
/// an IO error does not. `errs` closes when this returns; `out` is shared
/// across connections and is never closed here.
pub async fn read_all<R>(
    mut stream: R,
    out: mpsc::Sender<FrameReadout>,
    errs: mpsc::Sender<HermesError>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match hermes::read_delimited::<FrameReadout, _>(&mut stream).await {
            Ok(Some(readout)) => {
                if out.send(readout).await.is_err() {
                    // Merger gone, the experiment is tearing down
                    return;
                }
            }
            Ok(None) => return,
            Err(err @ HermesError::Decode(_)) => {
                let _ = errs.send(err).await;
            }
            Err(err) => {
                let _ = errs.send(err).await;
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
