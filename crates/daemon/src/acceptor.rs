// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Producer connection acceptor.
//!
//! Tracks every accepted tracker connection and owns their shutdown: the
//! orchestrator calls [`RemoteManager::close`] once, and `listen` returns
//! only after every per-connection handler task has finished.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Acceptor and registry for producer connections.
pub struct RemoteManager {
    quit: CancellationToken,
    connections: Mutex<Vec<SocketAddr>>,
}

impl Default for RemoteManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteManager {
    pub fn new() -> Self {
        Self { quit: CancellationToken::new(), connections: Mutex::new(Vec::new()) }
    }

    /// Number of currently tracked connections.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Shut the listener and every tracked connection.
    ///
    /// Idempotent, and safe to call while `listen` is running: the accept
    /// loop stops, handler tasks observe the cancellation and drop their
    /// sockets.
    pub fn close(&self) {
        self.quit.cancel();
    }

    /// Accept connections until [`close`](Self::close) is called.
    ///
    /// Each accepted connection runs `on_accept` on its own task, with a
    /// token that is cancelled on close. `on_all_closed` fires exactly once,
    /// after the accept loop stopped and every handler task returned.
    pub async fn listen<F, Fut, C>(
        self: Arc<Self>,
        listener: TcpListener,
        on_accept: F,
        on_all_closed: C,
    ) where
        F: Fn(TcpStream, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
        C: FnOnce() + Send,
    {
        let on_accept = Arc::new(on_accept);
        let mut handlers: JoinSet<()> = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.quit.cancelled() => break,
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            info!(remote = %addr, "new producer connection");
                            self.connections.lock().push(addr);
                            let manager = Arc::clone(&self);
                            let on_accept = Arc::clone(&on_accept);
                            let token = self.quit.child_token();
                            handlers.spawn(async move {
                                on_accept(stream, token).await;
                                manager.forget(addr);
                                debug!(remote = %addr, "producer connection done");
                            });
                        }
                        Err(err) => {
                            if self.quit.is_cancelled() {
                                break;
                            }
                            error!(error = %err, "accept failed");
                        }
                    }
                }
            }
        }
        drop(listener);
        while handlers.join_next().await.is_some() {}
        on_all_closed();
    }

    fn forget(&self, addr: SocketAddr) {
        let mut connections = self.connections.lock();
        if let Some(idx) = connections.iter().position(|a| *a == addr) {
            connections.swap_remove(idx);
        }
    }
}

#[cfg(test)]
#[path = "acceptor_tests.rs"]
mod tests;
