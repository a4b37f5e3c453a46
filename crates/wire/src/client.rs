// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot RPC client: one connection, one request, one response.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::{read_response, write_request, ProtocolError, Request, Response};

/// Dial `endpoint` (`host:port`), send `request`, await the response.
pub async fn call(
    endpoint: &str,
    request: &Request,
    timeout: Duration,
) -> Result<Response, ProtocolError> {
    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    write_request(&mut stream, request, timeout).await?;
    read_response(&mut stream, timeout).await
}
