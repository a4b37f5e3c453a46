// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload planner.
//!
//! Turns the node topology into a frame-striping plan: the master owns
//! slot 0, slaves own slots 1..N in topology order, every producer gets a
//! fresh opaque identity for the lifetime of the experiment.

use leto_core::{LoadBalancing, NodeConfiguration};
use uuid::Uuid;

/// Sentinel identity of a plan with a single producer.
pub const SINGLE_NODE_UUID: &str = "single-node";

/// Build the striping plan for `local_node` and its topology.
///
/// `width`/`height` carry the camera resolution into the descriptor so
/// slaves can size their video output; they are zero when unknown.
pub fn plan_workload(
    local_node: &str,
    node: &NodeConfiguration,
    width: i32,
    height: i32,
) -> LoadBalancing {
    let mut plan = LoadBalancing { width, height, ..Default::default() };
    if node.slaves.is_empty() {
        plan.self_uuid = SINGLE_NODE_UUID.to_string();
        plan.uuids.insert(local_node.to_string(), SINGLE_NODE_UUID.to_string());
        plan.assignments.insert(0, SINGLE_NODE_UUID.to_string());
        return plan;
    }

    let master_uuid = Uuid::new_v4().to_string();
    plan.self_uuid = master_uuid.clone();
    plan.uuids.insert(local_node.to_string(), master_uuid.clone());
    plan.assignments.insert(0, master_uuid);
    for (idx, slave) in node.slaves.iter().enumerate() {
        let uuid = Uuid::new_v4().to_string();
        plan.uuids.insert(slave.clone(), uuid.clone());
        plan.assignments.insert(idx as i32 + 1, uuid);
    }
    plan
}

/// The descriptor a given slave should receive: identical plan, with
/// `self_uuid` stamped to the slave's own identity.
pub fn plan_for_slave(plan: &LoadBalancing, slave: &str) -> Option<LoadBalancing> {
    let uuid = plan.uuids.get(slave)?;
    let mut stamped = plan.clone();
    stamped.self_uuid = uuid.clone();
    Some(stamped)
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
