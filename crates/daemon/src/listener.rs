// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC listener: one request and one response per connection.
//!
//! Runs in a spawned task, accepting operator and peer connections and
//! dispatching them to the orchestrator without blocking each other.

use std::sync::Arc;

use leto_wire::{read_request, write_response, ProtocolError, Request, Response};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::orchestrator::Orchestrator;

/// Accept RPC connections until `shutdown` fires.
pub async fn run(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(remote = %addr, "rpc connection");
                        let orchestrator = Arc::clone(&orchestrator);
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, &orchestrator).await {
                                log_connection_error(err);
                            }
                        });
                    }
                    Err(err) => {
                        if shutdown.is_cancelled() {
                            return;
                        }
                        error!(error = %err, "rpc accept failed");
                    }
                }
            }
        }
    }
}

fn log_connection_error(err: ProtocolError) {
    match err {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => debug!("rpc connection timed out"),
        _ => error!(error = %err, "rpc connection error"),
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    orchestrator: &Arc<Orchestrator>,
) -> Result<(), ProtocolError> {
    let timeout = crate::env::rpc_timeout();
    let request = read_request(&mut stream, timeout).await?;
    info!(request = ?request_name(&request), "received request");

    let response = handle_request(request, orchestrator).await;
    write_response(&mut stream, &response, timeout).await
}

fn request_name(request: &Request) -> &'static str {
    match request {
        Request::StartTracking { .. } => "StartTracking",
        Request::StopTracking => "StopTracking",
        Request::Status => "Status",
        Request::LastExperimentLog => "LastExperimentLog",
        Request::Link { .. } => "Link",
        Request::Unlink { .. } => "Unlink",
    }
}

async fn handle_request(request: Request, orchestrator: &Arc<Orchestrator>) -> Response {
    match request {
        Request::StartTracking { config } => Response::from_result(
            orchestrator.start(&config).await.map_err(|err| err.to_string()),
        ),

        Request::StopTracking => {
            Response::from_result(orchestrator.stop().await.map_err(|err| err.to_string()))
        }

        Request::Status => orchestrator.status().await,

        Request::LastExperimentLog => match orchestrator.last_experiment_log().await {
            Some(log) => Response::LastExperimentLog(Box::new(log)),
            None => Response::Error { message: "no finished experiment on record".to_string() },
        },

        Request::Link { master, slave } => Response::from_result(
            orchestrator.link(&master, &slave).await.map_err(|err| err.to_string()),
        ),

        Request::Unlink { master, slave } => Response::from_result(
            orchestrator.unlink(&master, &slave).await.map_err(|err| err.to_string()),
        ),
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
