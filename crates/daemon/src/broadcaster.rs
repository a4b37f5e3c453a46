// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live readout broadcaster.
//!
//! Every subscriber gets its own bounded channel; each merged readout is
//! serialized once and fanned out. A slow subscriber can hold the sender
//! for at most the write deadline before it is evicted, leaving the other
//! subscribers untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use leto_core::hermes::encode_delimited;
use leto_core::{FrameReadout, Header};
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type SubscriberMap = Arc<RwLock<HashMap<usize, mpsc::Sender<Arc<Vec<u8>>>>>>;

/// Fan `rx` out to every subscriber of `listener` until `rx` closes.
pub async fn broadcast_frame_readouts(
    listener: TcpListener,
    mut rx: mpsc::Receiver<FrameReadout>,
    write_deadline: Duration,
) {
    let subscribers: SubscriberMap = Arc::new(RwLock::new(HashMap::new()));
    let quit = CancellationToken::new();
    let accept_task =
        tokio::spawn(accept_loop(listener, Arc::clone(&subscribers), quit.clone()));

    while let Some(readout) = rx.recv().await {
        let bytes = Arc::new(encode_delimited(&readout));
        // Snapshot under the read lock; sends happen outside it
        let targets: Vec<(usize, mpsc::Sender<Arc<Vec<u8>>>)> =
            subscribers.read().iter().map(|(id, tx)| (*id, tx.clone())).collect();
        for (id, tx) in targets {
            let delivered =
                matches!(tokio::time::timeout(write_deadline, tx.send(Arc::clone(&bytes))).await,
                    Ok(Ok(())));
            if !delivered {
                warn!(subscriber = id, "evicting slow subscriber");
                subscribers.write().remove(&id);
            }
        }
    }

    // Input closed: stop accepting and close every subscriber channel
    quit.cancel();
    subscribers.write().clear();
    let _ = accept_task.await;
}

async fn accept_loop(listener: TcpListener, subscribers: SubscriberMap, quit: CancellationToken) {
    let mut next_id: usize = 0;
    loop {
        tokio::select! {
            _ = quit.cancelled() => return,
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        info!(remote = %addr, "new subscriber");
                        let (tx, rx) = mpsc::channel(10);
                        let id = next_id;
                        next_id += 1;
                        subscribers.write().insert(id, tx);
                        tokio::spawn(serve_subscriber(
                            stream,
                            id,
                            rx,
                            Arc::clone(&subscribers),
                        ));
                    }
                    Err(err) => {
                        if quit.is_cancelled() {
                            return;
                        }
                        error!(error = %err, "subscriber accept failed");
                    }
                }
            }
        }
    }
}

async fn serve_subscriber(
    mut stream: TcpStream,
    id: usize,
    mut rx: mpsc::Receiver<Arc<Vec<u8>>>,
    subscribers: SubscriberMap,
) {
    let header = encode_delimited(&Header::for_network());
    if let Err(err) = stream.write_all(&header).await {
        debug!(subscriber = id, error = %err, "could not write header");
        subscribers.write().remove(&id);
        return;
    }
    while let Some(bytes) = rx.recv().await {
        if let Err(err) = stream.write_all(&bytes).await {
            debug!(subscriber = id, error = %err, "could not write frame");
            subscribers.write().remove(&id);
            return;
        }
    }
}

#[cfg(test)]
#[path = "broadcaster_tests.rs"]
mod tests;
