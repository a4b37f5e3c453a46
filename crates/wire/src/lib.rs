// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC protocol between the leto daemon, its peers, and the operator CLI.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. One
//! request and one response per connection.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
mod request;
mod response;
mod wire;

pub use request::Request;
pub use response::{ExperimentLog, ExperimentStatus, Response};
pub use wire::{
    decode, encode, read_message, read_request, read_response, write_message, write_request,
    write_response, ProtocolError,
};
