// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leto-cli link` / `unlink` - manage the master/slave topology.
//!
//! The request goes to the master, which forwards its side to the slave.

use anyhow::Result;
use leto_wire::Request;

use crate::client;

pub async fn run(master: &str, slave: &str, link: bool) -> Result<()> {
    let request = if link {
        Request::Link { master: master.to_string(), slave: slave.to_string() }
    } else {
        Request::Unlink { master: master.to_string(), slave: slave.to_string() }
    };
    client::call_node(master, &request).await?;
    if link {
        println!("Linked {slave} under {master}");
    } else {
        println!("Unlinked {slave} from {master}");
    }
    Ok(())
}
